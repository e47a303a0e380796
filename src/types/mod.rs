//! Request, call and progress types shared by the bridge and transports.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method};
use url::Url;
use uuid::Uuid;

/// Content type used for bodies sent without one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Identity of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Allocates a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request body with its content type.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Body bytes.
    pub bytes: Bytes,
    /// Content type, if the caller supplied one.
    pub content_type: Option<mime::Mime>,
}

/// Canonical request.
///
/// Every request carries its own identity, allocated at construction.
/// Requests are not `Clone`: a retry is a new request.
pub struct NativeRequest {
    id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: Url,
    /// Request headers; a name may carry several values.
    pub headers: HeaderMap,
    /// Optional body.
    pub body: Option<RequestBody>,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for NativeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRequest")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl NativeRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            progress: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request with a body.
    pub fn post(url: Url, body: impl Into<Bytes>, content_type: Option<mime::Mime>) -> Self {
        Self::new(Method::POST, url).with_body(body, content_type)
    }

    /// Returns the request identity.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Appends a header value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: Option<mime::Mime>) -> Self {
        self.body = Some(RequestBody {
            bytes: body.into(),
            content_type,
        });
        self
    }

    /// Attaches a progress observer, registered when the request is sent.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub(crate) fn take_progress(&mut self) -> Option<ProgressCallback> {
        self.progress.take()
    }

    /// Host the request is addressed to.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

/// Cache policy requested for a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Honour the protocol's caching rules.
    #[default]
    UseProtocolCachePolicy,
    /// Always go to the network.
    ReloadIgnoringCacheData,
}

/// A request as handed to a transport: headers already joined per name.
#[derive(Debug, Clone)]
pub struct NativeCall {
    /// Identity used in every event for this call.
    pub id: RequestId,
    /// Upper-case method name.
    pub method: String,
    /// Absolute URL.
    pub url: Url,
    /// One entry per header name, values joined.
    pub headers: Vec<(String, String)>,
    /// Body bytes, if any.
    pub body: Option<Bytes>,
    /// Cache policy.
    pub cache_policy: CachePolicy,
}

impl NativeCall {
    /// Builds a native call from a canonical request.
    pub fn from_request(request: &NativeRequest, cache_policy: CachePolicy) -> Self {
        let mut headers = join_headers(&request.headers);

        if let Some(body) = &request.body {
            let has_content_type = headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
            if !has_content_type {
                let content_type = body
                    .content_type
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
                headers.push((CONTENT_TYPE.as_str().to_string(), content_type));
            }
        }

        Self {
            id: request.id,
            method: request.method.as_str().to_ascii_uppercase(),
            url: request.url.clone(),
            headers,
            body: request.body.as_ref().map(|b| b.bytes.clone()),
            cache_policy,
        }
    }

    /// Returns the joined value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Separator used to join multiple values of one header.
pub fn header_separator(name: &HeaderName) -> &'static str {
    if name == USER_AGENT {
        " "
    } else {
        ","
    }
}

/// Joins each header's values into one, in first-appearance order.
///
/// Values that are not visible ASCII are decoded lossily.
pub fn join_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(header_separator(name));
            (name.as_str().to_string(), joined)
        })
        .collect()
}

/// Response metadata reported by a transport when headers arrive.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Status code.
    pub status: u16,
    /// Reason phrase, if the transport has one.
    pub reason: Option<String>,
    /// Final URL after redirects.
    pub url: Url,
    /// Raw header pairs.
    pub headers: Vec<(String, String)>,
    /// Expected body length, if known.
    pub content_length: Option<u64>,
}

/// A redirect proposed by a transport.
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    /// Status of the redirect response.
    pub status: u16,
    /// Where the redirect points.
    pub location: Url,
}

/// Whether a proposed redirect is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Issue the redirected request.
    Follow,
    /// Keep the redirect response as the final response.
    Suppress,
}

/// Body progress reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes in this chunk.
    pub bytes: u64,
    /// Bytes received so far.
    pub total_bytes: u64,
    /// Expected total, if known.
    pub total_expected: Option<u64>,
}

/// Progress observer.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url() -> Url {
        Url::parse("https://example.com/upload").unwrap()
    }

    #[test]
    fn test_join_headers_uses_per_name_separator() {
        let request = NativeRequest::get(url())
            .with_header(USER_AGENT, HeaderValue::from_static("app/1.0"))
            .with_header(USER_AGENT, HeaderValue::from_static("native/2.0"))
            .with_header(http::header::ACCEPT, HeaderValue::from_static("text/html"))
            .with_header(http::header::ACCEPT, HeaderValue::from_static("application/json"));

        let joined = join_headers(&request.headers);
        assert_eq!(
            joined,
            vec![
                ("user-agent".to_string(), "app/1.0 native/2.0".to_string()),
                ("accept".to_string(), "text/html,application/json".to_string()),
            ]
        );
    }

    #[test]
    fn test_native_call_adds_default_content_type() {
        let request = NativeRequest::post(url(), "payload", None);
        let call = NativeCall::from_request(&request, CachePolicy::default());

        assert_eq!(call.method, "POST");
        assert_eq!(call.header("Content-Type"), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(call.body, Some(Bytes::from_static(b"payload")));
        assert_eq!(call.id, request.id());
    }

    #[test]
    fn test_native_call_keeps_explicit_content_type() {
        let request = NativeRequest::post(url(), "{}", Some(mime::APPLICATION_JSON));
        let call = NativeCall::from_request(&request, CachePolicy::ReloadIgnoringCacheData);

        assert_eq!(call.header("content-type"), Some("application/json"));
        assert_eq!(call.cache_policy, CachePolicy::ReloadIgnoringCacheData);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(NativeRequest::get(url()).id(), NativeRequest::get(url()).id());
    }
}
