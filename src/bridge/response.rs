//! Canonical response and its lazily streamed body.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, ReadBuf};
use url::Url;

use super::BridgeInner;
use crate::errors::{ErrorKind, NativeHttpError, NativeHttpResult};
use crate::stream::{ReadProgress, StreamReader};
use crate::types::{RequestId, ResponseHead};

/// Cancels the request when dropped, unless it already terminated.
pub(crate) struct CancelOnDrop {
    inner: Weak<BridgeInner>,
    id: RequestId,
}

impl CancelOnDrop {
    pub(crate) fn new(inner: &Arc<BridgeInner>, id: RequestId) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            id,
        }
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_request(self.id);
        }
    }
}

impl std::fmt::Debug for CancelOnDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelOnDrop").field("id", &self.id).finish()
    }
}

/// Response delivered as soon as headers arrive.
#[derive(Debug)]
pub struct NativeResponse {
    /// Request this response belongs to.
    pub id: RequestId,
    /// Status code.
    pub status: StatusCode,
    /// Reason phrase reported by the transport, or the canonical one.
    pub reason_phrase: Option<String>,
    /// Final URL after redirects.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body, streamed as the transport delivers it.
    pub body: ResponseBody,
}

impl NativeResponse {
    pub(crate) fn from_head(
        id: RequestId,
        head: ResponseHead,
        mut reader: StreamReader,
        guard: CancelOnDrop,
    ) -> NativeHttpResult<Self> {
        let status = StatusCode::from_u16(head.status).map_err(|e| {
            NativeHttpError::protocol(format!("Invalid status code {}", head.status)).with_cause(e)
        })?;

        let mut headers = HeaderMap::with_capacity(head.headers.len());
        for (name, value) in &head.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(request_id = %id, header = %name, "Skipping invalid response header"),
            }
        }

        reader.set_expected_len(head.content_length);

        Ok(Self {
            id,
            status,
            reason_phrase: head
                .reason
                .or_else(|| status.canonical_reason().map(String::from)),
            url: head.url,
            headers,
            body: ResponseBody {
                reader,
                _cancel: guard,
            },
        })
    }

    /// Returns the body, dropping the response metadata.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> NativeHttpResult<Bytes> {
        self.body.into_bytes().await
    }

    /// Reads the whole body as UTF-8 text.
    pub async fn text(self) -> NativeHttpResult<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            NativeHttpError::new(ErrorKind::ReceiveFailure, "Response body is not valid UTF-8").with_cause(e)
        })
    }
}

/// Response body.
///
/// Reads pull from the request's stream buffer. Dropping the body before it
/// finished cancels the native call.
#[derive(Debug)]
pub struct ResponseBody {
    reader: StreamReader,
    _cancel: CancelOnDrop,
}

impl ResponseBody {
    /// Reads up to `max_len` bytes; `Ok(None)` at end of body.
    pub async fn read(&mut self, max_len: usize) -> NativeHttpResult<Option<Bytes>> {
        self.reader.read(max_len).await
    }

    /// Reads the rest of the body.
    pub async fn into_bytes(mut self) -> NativeHttpResult<Bytes> {
        self.reader.read_to_end().await
    }

    /// Progress after the most recent read.
    pub fn progress(&self) -> ReadProgress {
        self.reader.progress()
    }

    /// Expected body length, if known.
    pub fn expected_len(&self) -> Option<u64> {
        self.reader.expected_len()
    }

    /// Returns true once the transport finished delivering the body.
    pub fn is_terminated(&self) -> bool {
        self.reader.is_terminated()
    }
}

impl Stream for ResponseBody {
    type Item = NativeHttpResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().reader).poll_next(cx)
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}
