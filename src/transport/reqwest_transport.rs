//! Reqwest-based transport.
//!
//! Each call runs on its own tokio task. Server trust is decided inside the
//! TLS handshake by the rustls verifier in [`super::tls`], before the request
//! is written.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use tokio::task::JoinHandle;
use url::Url;

use super::{Transport, TransportEvents};
use crate::config::NativeHttpConfig;
use crate::errors::{reqwest_codes, ConfigError, ErrorKind, NativeError, NativeHttpError, NativeHttpResult};
use crate::types::{CachePolicy, NativeCall, RedirectDecision, RedirectRequest, RequestId, ResponseHead};

struct RunningCall {
    task: JoinHandle<()>,
    events: Arc<dyn TransportEvents>,
}

type CallMap = Arc<Mutex<HashMap<RequestId, RunningCall>>>;

/// Transport backed by a `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    max_redirects: usize,
    calls: CallMap,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("max_redirects", &self.max_redirects)
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

impl ReqwestTransport {
    /// Creates a transport from the bridge configuration.
    ///
    /// Trust anchors and pins are not baked into the client; the bridge
    /// supplies them on every handshake.
    pub fn new(config: &NativeHttpConfig) -> Result<Self, ConfigError> {
        let builder = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none());

        #[cfg(feature = "rustls")]
        let builder = builder.use_preconfigured_tls(super::tls::client_config());

        let client = builder
            .build()
            .map_err(|e| ConfigError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            calls: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Number of calls still running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Transport for ReqwestTransport {
    fn start(&self, call: NativeCall, events: Arc<dyn TransportEvents>) -> NativeHttpResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            NativeHttpError::new(ErrorKind::SendFailure, "The reqwest transport needs a tokio runtime")
                .with_cause(e)
        })?;

        let id = call.id;
        let client = self.client.clone();
        let max_redirects = self.max_redirects;
        let calls = self.calls.clone();
        let task_events = events.clone();

        // Held across the spawn so the task cannot deregister before it is registered.
        let mut running = self.calls.lock();
        let task = runtime.spawn(async move {
            let outcome = execute(&client, call, task_events.clone(), max_redirects).await;

            // A call that was cancelled has already been acknowledged.
            if calls.lock().remove(&id).is_some() {
                task_events.on_complete(id, outcome);
            }
        });
        running.insert(id, RunningCall { task, events });

        tracing::debug!(request_id = %id, "Started reqwest call");
        Ok(())
    }

    fn cancel(&self, id: RequestId) {
        let Some(call) = self.calls.lock().remove(&id) else {
            return;
        };
        call.task.abort();
        tracing::debug!(request_id = %id, "Cancelled reqwest call");
        call.events.on_complete(
            id,
            Err(NativeError::reqwest(reqwest_codes::CANCELLED, "The call was cancelled")),
        );
    }
}

#[cfg(feature = "rustls")]
async fn execute(
    client: &Client,
    call: NativeCall,
    events: Arc<dyn TransportEvents>,
    max_redirects: usize,
) -> Result<(), NativeError> {
    let trust = super::tls::CallTrust::new(call.id, events.clone());
    let outcome = trust
        .clone()
        .scope(run_call(client, call, events.as_ref(), max_redirects))
        .await;

    outcome.map_err(|err| match trust.rejection() {
        Some(message) => NativeError::reqwest(reqwest_codes::TRUST_REJECTED, message),
        None => err,
    })
}

#[cfg(not(feature = "rustls"))]
async fn execute(
    client: &Client,
    call: NativeCall,
    events: Arc<dyn TransportEvents>,
    max_redirects: usize,
) -> Result<(), NativeError> {
    run_call(client, call, events.as_ref(), max_redirects).await
}

async fn run_call(
    client: &Client,
    call: NativeCall,
    events: &dyn TransportEvents,
    max_redirects: usize,
) -> Result<(), NativeError> {
    let id = call.id;
    let mut method = Method::from_bytes(call.method.as_bytes())
        .map_err(|e| NativeError::reqwest(reqwest_codes::REQUEST, e.to_string()))?;
    let mut url = call.url.clone();
    let mut body = call.body.clone();
    let mut hops = 0usize;

    let response = loop {
        let mut request = client.request(method.clone(), url.clone());
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if call.cache_policy == CachePolicy::ReloadIgnoringCacheData {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }
        if let Some(bytes) = &body {
            request = request.body(bytes.clone());
        }

        let response = request.send().await.map_err(|e| NativeError::from(&e))?;

        let Some(redirect) = redirect_target(&response, &url) else {
            break response;
        };
        if events.on_redirect(id, &redirect) == RedirectDecision::Suppress {
            break response;
        }
        if hops >= max_redirects {
            return Err(NativeError::reqwest(
                reqwest_codes::REDIRECT,
                format!("Too many redirects (limit {})", max_redirects),
            ));
        }
        hops += 1;

        let status = response.status();
        if status == StatusCode::SEE_OTHER
            || (method == Method::POST
                && (status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND))
        {
            method = Method::GET;
            body = None;
        }
        tracing::debug!(request_id = %id, location = %redirect.location, "Following redirect");
        url = redirect.location;
    };

    events.on_response(id, response_head(&response));

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            let code = if e.is_timeout() {
                reqwest_codes::TIMEOUT
            } else {
                reqwest_codes::STREAM
            };
            NativeError::reqwest(code, e.to_string())
        })?;
        events.on_data(id, chunk);
    }
    Ok(())
}

fn redirect_target(response: &Response, base: &Url) -> Option<RedirectRequest> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    let location = base.join(location).ok()?;
    Some(RedirectRequest {
        status: response.status().as_u16(),
        location,
    })
}

fn response_head(response: &Response) -> ResponseHead {
    let status = response.status();
    ResponseHead {
        status: status.as_u16(),
        reason: status.canonical_reason().map(String::from),
        url: response.url().clone(),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        content_length: response.content_length(),
    }
}
