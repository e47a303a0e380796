//! Mock implementations for testing.
//!
//! [`MockTransport`] records the calls it is asked to start and lets a test
//! play the native side by driving events for them. [`MockServerTrust`]
//! stands in for a platform trust object.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use url::Url;

use crate::errors::{domains, NativeError, NativeHttpError, NativeHttpResult};
use crate::transport::{AuthChallenge, ServerTrust, Transport, TransportEvents, TrustDisposition};
use crate::types::{NativeCall, RedirectDecision, RedirectRequest, RequestId, ResponseHead};

/// NSURL code a native stack reports for a cancelled task.
pub const NS_URL_CANCELLED: i64 = -999;

/// Mock transport driven by the test.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<NativeCall>>,
    pending: Mutex<VecDeque<NativeCall>>,
    started: Notify,
    delegates: Mutex<HashMap<RequestId, Arc<dyn TransportEvents>>>,
    cancels: Mutex<VecDeque<RequestId>>,
    cancelled: Notify,
    cancel_history: Mutex<Vec<RequestId>>,
    hold_cancel_ack: AtomicBool,
    fail_next: Mutex<Option<NativeHttpError>>,
}

impl MockTransport {
    /// Creates a mock that acknowledges cancellations immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps cancelled calls alive so the test can deliver late events and
    /// acknowledge the cancellation itself.
    pub fn hold_cancel_acknowledgement(&self, hold: bool) -> &Self {
        self.hold_cancel_ack.store(hold, Ordering::SeqCst);
        self
    }

    /// Makes the next `start` fail.
    pub fn fail_next_start(&self, error: NativeHttpError) -> &Self {
        *self.fail_next.lock() = Some(error);
        self
    }

    /// Every call started so far.
    pub fn recorded_calls(&self) -> Vec<NativeCall> {
        self.calls.lock().clone()
    }

    /// Every cancellation requested so far.
    pub fn recorded_cancels(&self) -> Vec<RequestId> {
        self.cancel_history.lock().clone()
    }

    /// Waits for the next started call.
    pub async fn next_call(&self) -> NativeCall {
        loop {
            if let Some(call) = self.pending.lock().pop_front() {
                return call;
            }
            self.started.notified().await;
        }
    }

    /// Waits for the next cancellation request.
    pub async fn next_cancel(&self) -> RequestId {
        loop {
            if let Some(id) = self.cancels.lock().pop_front() {
                return id;
            }
            self.cancelled.notified().await;
        }
    }

    fn delegate(&self, id: RequestId) -> Option<Arc<dyn TransportEvents>> {
        self.delegates.lock().get(&id).cloned()
    }

    /// Raises a server-trust challenge. `None` if the call is gone.
    pub fn challenge(&self, id: RequestId, host: &str, trust: &mut MockServerTrust) -> Option<TrustDisposition> {
        let delegate = self.delegate(id)?;
        Some(delegate.on_trust_challenge(id, AuthChallenge::ServerTrust { host, trust }))
    }

    /// Raises a non-trust challenge. `None` if the call is gone.
    pub fn challenge_other(&self, id: RequestId, method: &str) -> Option<TrustDisposition> {
        let delegate = self.delegate(id)?;
        Some(delegate.on_trust_challenge(id, AuthChallenge::Other { method }))
    }

    /// Proposes a redirect. `None` if the call is gone.
    pub fn redirect(&self, id: RequestId, status: u16, location: Url) -> Option<RedirectDecision> {
        let delegate = self.delegate(id)?;
        Some(delegate.on_redirect(id, &RedirectRequest { status, location }))
    }

    /// Asks whether the response may be cached. `None` if the call is gone.
    pub fn should_cache(&self, id: RequestId) -> Option<bool> {
        let delegate = self.delegate(id)?;
        Some(delegate.should_cache_response(id))
    }

    /// Delivers response headers. Returns false if the call is gone.
    pub fn respond(&self, id: RequestId, head: ResponseHead) -> bool {
        match self.delegate(id) {
            Some(delegate) => {
                delegate.on_response(id, head);
                true
            }
            None => false,
        }
    }

    /// Delivers a `200 OK` with the given headers and length.
    pub fn respond_ok(&self, id: RequestId, url: Url, content_length: Option<u64>) -> bool {
        self.respond(
            id,
            ResponseHead {
                status: 200,
                reason: None,
                url,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                content_length,
            },
        )
    }

    /// Delivers a body chunk. Returns false if the call is gone.
    pub fn data(&self, id: RequestId, chunk: impl Into<Bytes>) -> bool {
        match self.delegate(id) {
            Some(delegate) => {
                delegate.on_data(id, chunk.into());
                true
            }
            None => false,
        }
    }

    /// Completes the call successfully. Returns false if the call is gone.
    pub fn complete(&self, id: RequestId) -> bool {
        self.finish(id, Ok(()))
    }

    /// Completes the call with a native error. Returns false if the call is gone.
    pub fn fail(&self, id: RequestId, error: NativeError) -> bool {
        self.finish(id, Err(error))
    }

    fn finish(&self, id: RequestId, outcome: Result<(), NativeError>) -> bool {
        let delegate = self.delegates.lock().remove(&id);
        match delegate {
            Some(delegate) => {
                delegate.on_complete(id, outcome);
                true
            }
            None => false,
        }
    }
}

impl Transport for MockTransport {
    fn start(&self, call: NativeCall, events: Arc<dyn TransportEvents>) -> NativeHttpResult<()> {
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        self.delegates.lock().insert(call.id, events);
        self.calls.lock().push(call.clone());
        self.pending.lock().push_back(call);
        self.started.notify_one();
        Ok(())
    }

    fn cancel(&self, id: RequestId) {
        self.cancel_history.lock().push(id);
        if !self.hold_cancel_ack.load(Ordering::SeqCst) {
            self.fail(
                id,
                NativeError::domain(domains::NS_URL, NS_URL_CANCELLED, "cancelled"),
            );
        }
        self.cancels.lock().push_back(id);
        self.cancelled.notify_one();
    }
}

/// Mock platform trust object.
#[derive(Debug, Clone, Default)]
pub struct MockServerTrust {
    leaf: Option<Bytes>,
    trusted: bool,
    anchors: Option<Vec<Bytes>>,
    evaluations: usize,
}

impl MockServerTrust {
    /// A chain the platform trusts, ending in `leaf`.
    pub fn trusted(leaf: impl Into<Bytes>) -> Self {
        Self {
            leaf: Some(leaf.into()),
            trusted: true,
            ..Self::default()
        }
    }

    /// A chain the platform rejects, ending in `leaf`.
    pub fn untrusted(leaf: impl Into<Bytes>) -> Self {
        Self {
            leaf: Some(leaf.into()),
            trusted: false,
            ..Self::default()
        }
    }

    /// Anchors applied by the last `set_anchor_certificates`.
    pub fn anchors(&self) -> Option<&[Bytes]> {
        self.anchors.as_deref()
    }

    /// Number of evaluations run.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

impl ServerTrust for MockServerTrust {
    fn set_anchor_certificates(&mut self, anchors: &[Bytes]) {
        self.anchors = Some(anchors.to_vec());
    }

    fn evaluate(&mut self) -> bool {
        self.evaluations += 1;
        self.trusted
    }

    fn leaf_certificate(&self) -> Option<Bytes> {
        self.leaf.clone()
    }
}
