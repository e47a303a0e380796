//! Request bridge.
//!
//! Turns a callback-driven [`Transport`] into `send(request) -> response`.
//! Each send registers an in-flight entry holding the stream buffer writer
//! and the response promise; transport events are routed to it by request
//! identity. The response resolves as soon as headers arrive and its body
//! streams from the buffer.
//!
//! The in-flight map is guarded by one lock. Progress observers and promise
//! resolution run after that lock is released. Stream buffers have their own
//! locks, always taken after the map lock.

mod inflight;
mod progress;
mod response;

pub use inflight::RequestState;
pub use response::{NativeResponse, ResponseBody};

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::{NativeHttpConfig, TransportKind};
use crate::errors::{ConfigError, ErrorClassifier, ErrorKind, NativeError, NativeHttpError, NativeHttpResult};
use crate::observability::{BridgeMetrics, MetricsSnapshot};
use crate::pinning::CertificatePinner;
use crate::stream;
use crate::transport::{AuthChallenge, ReqwestTransport, Transport, TransportEvents, TrustDisposition};
use crate::types::{
    CachePolicy, NativeCall, NativeRequest, Progress, ProgressCallback, RedirectDecision,
    RedirectRequest, RequestId, ResponseHead,
};
use inflight::InFlightRequest;
use progress::ProgressRegistry;
use response::CancelOnDrop;

/// Create a new bridge with the given configuration.
pub fn create_bridge(config: NativeHttpConfig) -> Result<RequestBridge, ConfigError> {
    RequestBridge::new(config)
}

/// Create a new bridge from `NATIVE_HTTP_*` environment variables.
pub fn create_bridge_from_env() -> Result<RequestBridge, ConfigError> {
    let config = NativeHttpConfig::from_env()?;
    create_bridge(config)
}

/// Maps native transport callbacks onto cancellable response futures.
///
/// Cloning is cheap; clones share pins, in-flight requests and counters.
#[derive(Clone)]
pub struct RequestBridge {
    inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    allow_auto_redirect: bool,
    disable_caching: bool,
    transport: Arc<dyn Transport>,
    pinner: Arc<CertificatePinner>,
    classifier: Arc<ErrorClassifier>,
    anchors: RwLock<Option<Vec<Bytes>>>,
    requests: Mutex<HashMap<RequestId, InFlightRequest>>,
    progress: ProgressRegistry,
    metrics: BridgeMetrics,
}

impl RequestBridge {
    /// Creates a bridge over the transport selected by `config.transport`.
    pub fn new(config: NativeHttpConfig) -> Result<Self, ConfigError> {
        let transport: Arc<dyn Transport> = match &config.transport {
            TransportKind::Reqwest => Arc::new(ReqwestTransport::new(&config)?),
            TransportKind::Custom(transport) => transport.clone(),
        };
        Self::with_transport(config, transport)
    }

    /// Creates a bridge over a caller-supplied transport.
    pub fn with_transport(
        config: NativeHttpConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        Self::with_parts(config, transport, Arc::new(ErrorClassifier::new()))
    }

    /// Creates a bridge with a caller-supplied transport and classifier.
    pub fn with_parts(
        config: NativeHttpConfig,
        transport: Arc<dyn Transport>,
        classifier: Arc<ErrorClassifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let pinner = Arc::new(CertificatePinner::new());
        for (host, pins) in &config.pins {
            pinner.add_pins(host, pins.iter().cloned());
        }

        let anchors = config.trusted_certificates.filter(|certs| !certs.is_empty());

        Ok(Self {
            inner: Arc::new(BridgeInner {
                allow_auto_redirect: config.allow_auto_redirect,
                disable_caching: config.disable_caching,
                transport,
                pinner,
                classifier,
                anchors: RwLock::new(anchors),
                requests: Mutex::new(HashMap::new()),
                progress: ProgressRegistry::default(),
                metrics: BridgeMetrics::new(),
            }),
        })
    }

    /// Sends a request and resolves once the response headers arrive.
    ///
    /// Cancelling `cancel` at any point fails both the pending response and
    /// the body with [`ErrorKind::Cancelled`]. Dropping the returned future
    /// before it resolves, or dropping an unfinished body, cancels as well.
    pub async fn send(
        &self,
        mut request: NativeRequest,
        cancel: CancellationToken,
    ) -> NativeHttpResult<NativeResponse> {
        if cancel.is_cancelled() {
            return Err(NativeHttpError::cancelled());
        }

        let id = request.id();
        let call = NativeCall::from_request(&request, self.inner.cache_policy());
        let host = request.host().unwrap_or_default().to_ascii_lowercase();
        let (writer, reader) = stream::channel();
        let (responder, response_rx) = oneshot::channel();
        let finished = CancellationToken::new();

        {
            let mut requests = self.inner.requests.lock();
            if requests.contains_key(&id) {
                return Err(NativeHttpError::new(
                    ErrorKind::Unknown,
                    format!("Request {} is already in flight", id),
                ));
            }
            if let Some(callback) = request.take_progress() {
                self.inner.progress.register(id, Some(callback));
            }
            requests.insert(
                id,
                InFlightRequest::new(host.clone(), writer, responder, finished.clone()),
            );
        }
        self.inner.metrics.record_started();
        tracing::debug!(
            request_id = %id,
            method = %request.method,
            url = %request.url,
            host = %host,
            "Sending request"
        );

        tokio::spawn(watch_cancellation(
            Arc::downgrade(&self.inner),
            id,
            cancel,
            finished,
        ));

        let events: Arc<dyn TransportEvents> = self.inner.clone();
        if let Err(err) = self.inner.transport.start(call, events) {
            self.inner.abandon(id, &err);
            return Err(err);
        }
        self.inner.mark_started(id);

        // From here on, dropping this future or the body cancels the call.
        let guard = CancelOnDrop::new(&self.inner, id);

        let head = match response_rx.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(NativeHttpError::new(
                    ErrorKind::Unknown,
                    "The request ended without resolving its response",
                ))
            }
        };

        NativeResponse::from_head(id, head, reader, guard)
    }

    /// Replaces the pins for a host. An empty list disables pinning for it.
    pub fn add_pins<I, S>(&self, hostname: &str, pins: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.pinner.add_pins(hostname, pins);
    }

    /// Replaces the override trust anchors (DER). `None` or an empty list clears them.
    pub fn set_trusted_certificates(&self, certificates: Option<Vec<Bytes>>) {
        let certificates = certificates.filter(|certs| !certs.is_empty());
        tracing::debug!(
            anchors = certificates.as_ref().map_or(0, Vec::len),
            "Setting trusted certificates"
        );
        *self.inner.anchors.write() = certificates;
    }

    /// Registers a progress observer for an in-flight request; `None`
    /// deregisters.
    ///
    /// The observer is attached on the first body chunk and dropped when the
    /// request terminates. Returns false, keeping nothing, if the request is
    /// not in flight. Use [`NativeRequest::with_progress`] to observe a
    /// request from before it is sent.
    pub fn register_for_progress(&self, id: RequestId, callback: Option<ProgressCallback>) -> bool {
        let requests = self.inner.requests.lock();
        let live = requests
            .get(&id)
            .is_some_and(|entry| !entry.state.is_terminal());
        if live || callback.is_none() {
            self.inner.progress.register(id, callback);
        }
        if !live {
            tracing::debug!(request_id = %id, "Ignoring progress registration for request not in flight");
        }
        live
    }

    /// Cancels an in-flight request.
    pub fn cancel(&self, id: RequestId) {
        self.inner.cancel_request(id);
    }

    /// The shared pin registry.
    pub fn pinner(&self) -> &Arc<CertificatePinner> {
        &self.inner.pinner
    }

    /// The shared error classifier.
    pub fn classifier(&self) -> &Arc<ErrorClassifier> {
        &self.inner.classifier
    }

    /// Cache policy applied to outgoing calls.
    pub fn cache_policy(&self) -> CachePolicy {
        self.inner.cache_policy()
    }

    /// Number of requests not yet removed from the in-flight set.
    pub fn in_flight(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Lifecycle state of an in-flight request.
    pub fn request_state(&self, id: RequestId) -> Option<RequestState> {
        self.inner.requests.lock().get(&id).map(|entry| entry.state)
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    #[cfg(test)]
    pub(crate) fn pending_progress_registrations(&self) -> usize {
        self.inner.progress.len()
    }
}

impl std::fmt::Debug for RequestBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBridge")
            .field("transport", &self.inner.transport)
            .field("allow_auto_redirect", &self.inner.allow_auto_redirect)
            .field("disable_caching", &self.inner.disable_caching)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

async fn watch_cancellation(
    inner: Weak<BridgeInner>,
    id: RequestId,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = finished.cancelled() => {}
        _ = cancel.cancelled() => {
            if let Some(inner) = inner.upgrade() {
                inner.cancel_request(id);
            }
        }
    }
}

impl BridgeInner {
    fn cache_policy(&self) -> CachePolicy {
        if self.disable_caching {
            CachePolicy::ReloadIgnoringCacheData
        } else {
            CachePolicy::UseProtocolCachePolicy
        }
    }

    /// Cancels a live request: fails its body and promise, then asks the
    /// transport to stop. The entry stays until the transport acknowledges.
    pub(crate) fn cancel_request(&self, id: RequestId) {
        let (responder, finished, started) = {
            let mut requests = self.requests.lock();
            let Some(entry) = requests.get_mut(&id) else {
                return;
            };
            if !entry.transition(id, RequestState::Cancelled) {
                return;
            }
            entry.writer.fail(NativeHttpError::cancelled());
            entry.observer = None;
            (entry.responder.take(), entry.finished.clone(), entry.started)
        };

        finished.cancel();
        self.progress.remove(id);
        self.metrics.record_cancelled();
        tracing::debug!(request_id = %id, "Request cancelled");

        if let Some(responder) = responder {
            let _ = responder.send(Err(NativeHttpError::cancelled()));
        }

        if started {
            self.dispatch_cancel(id);
        }
    }

    /// Records that the transport accepted the call, forwarding a cancel
    /// that landed while `start` was running.
    fn mark_started(&self, id: RequestId) {
        let cancelled = match self.requests.lock().get_mut(&id) {
            Some(entry) => {
                entry.started = true;
                entry.state == RequestState::Cancelled
            }
            None => false,
        };
        if cancelled {
            tracing::debug!(request_id = %id, "Forwarding cancellation raised during start");
            self.dispatch_cancel(id);
        }
    }

    /// Asks the transport to stop a call, off the caller's thread.
    fn dispatch_cancel(&self, id: RequestId) {
        let transport = self.transport.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || transport.cancel(id));
            }
            Err(_) => {
                std::thread::spawn(move || transport.cancel(id));
            }
        }
    }

    /// Drops a request whose transport call never started.
    fn abandon(&self, id: RequestId, error: &NativeHttpError) {
        let entry = self.requests.lock().remove(&id);
        if let Some(entry) = entry {
            entry.finished.cancel();
            entry.writer.fail(error.clone());
        }
        self.progress.remove(id);
        self.metrics.record_failed();
        tracing::warn!(request_id = %id, error = %error, "Transport refused to start request");
    }

    fn drop_chunk(&self, id: RequestId, len: u64) {
        self.metrics.record_dropped_chunk();
        tracing::debug!(request_id = %id, bytes = len, "Dropping data for terminated request");
    }

    fn set_state(&self, id: RequestId, state: RequestState) {
        if let Some(entry) = self.requests.lock().get_mut(&id) {
            entry.transition(id, state);
        }
    }
}

impl TransportEvents for BridgeInner {
    fn on_trust_challenge(&self, id: RequestId, challenge: AuthChallenge<'_>) -> TrustDisposition {
        let (host, trust) = match challenge {
            AuthChallenge::ServerTrust { host, trust } => (host, trust),
            AuthChallenge::Other { method } => {
                tracing::debug!(request_id = %id, method = %method, "Deferring non-trust challenge");
                return TrustDisposition::PerformDefaultHandling;
            }
        };

        if let Some(anchors) = self.anchors.read().as_deref() {
            trust.set_anchor_certificates(anchors);
        }

        if !self.pinner.has_pin(host) {
            tracing::debug!(request_id = %id, host = %host, "No pins for host, using default trust handling");
            return TrustDisposition::PerformDefaultHandling;
        }

        self.set_state(id, RequestState::AwaitingTrust);

        let evaluated = trust.evaluate();
        let pinned = evaluated
            && trust
                .leaf_certificate()
                .is_some_and(|leaf| self.pinner.check(host, &leaf));

        if pinned {
            tracing::debug!(request_id = %id, host = %host, "Server certificate matches pin");
            TrustDisposition::Accept
        } else {
            self.metrics.record_pin_rejection();
            tracing::warn!(
                request_id = %id,
                host = %host,
                evaluated,
                "Rejecting server certificate"
            );
            TrustDisposition::Reject
        }
    }

    fn on_redirect(&self, id: RequestId, redirect: &RedirectRequest) -> RedirectDecision {
        let decision = if self.allow_auto_redirect {
            RedirectDecision::Follow
        } else {
            RedirectDecision::Suppress
        };
        tracing::debug!(
            request_id = %id,
            status = redirect.status,
            location = %redirect.location,
            decision = ?decision,
            "Redirect proposed"
        );
        decision
    }

    fn on_response(&self, id: RequestId, head: ResponseHead) {
        let responder = {
            let mut requests = self.requests.lock();
            let Some(entry) = requests.get_mut(&id) else {
                tracing::debug!(request_id = %id, "Response for unknown request");
                return;
            };
            if !entry.transition(id, RequestState::Streaming) {
                tracing::debug!(request_id = %id, "Response after request terminated");
                return;
            }
            entry.expected_len = head.content_length;
            entry.responder.take()
        };

        tracing::debug!(request_id = %id, status = head.status, "Response received");
        match responder {
            Some(responder) => {
                let _ = responder.send(Ok(head));
            }
            None => tracing::warn!(request_id = %id, "Ignoring repeated response"),
        }
    }

    fn on_data(&self, id: RequestId, chunk: Bytes) {
        let len = chunk.len() as u64;
        let pushed = {
            let mut requests = self.requests.lock();
            match requests.get_mut(&id) {
                Some(entry) if !entry.state.is_terminal() => {
                    if entry.writer.push(chunk).is_err() {
                        return self.drop_chunk(id, len);
                    }
                    entry.received += len;
                    if entry.observer.is_none() {
                        entry.observer = self.progress.take(id);
                    }
                    Some(entry.observer.clone().map(|observer| {
                        let progress = Progress {
                            bytes: len,
                            total_bytes: entry.received,
                            total_expected: entry.expected_len,
                        };
                        (observer, progress)
                    }))
                }
                _ => None,
            }
        };

        let Some(report) = pushed else {
            return self.drop_chunk(id, len);
        };

        self.metrics.record_bytes(len);
        if let Some((observer, progress)) = report {
            observer(progress);
        }
    }

    fn should_cache_response(&self, _id: RequestId) -> bool {
        !self.disable_caching
    }

    fn on_complete(&self, id: RequestId, outcome: Result<(), NativeError>) {
        let Some(mut entry) = self.requests.lock().remove(&id) else {
            tracing::debug!(request_id = %id, "Completion for unknown request");
            return;
        };
        entry.finished.cancel();
        self.progress.remove(id);

        if entry.state == RequestState::Cancelled {
            tracing::debug!(request_id = %id, "Transport acknowledged cancellation");
            return;
        }

        let error = match outcome {
            Ok(()) if entry.responder.is_none() => {
                entry.state = RequestState::Completed;
                entry.writer.complete();
                self.metrics.record_completed();
                tracing::debug!(request_id = %id, bytes = entry.received, "Request completed");
                return;
            }
            Ok(()) => NativeHttpError::protocol("The transport completed without a response"),
            Err(native) => self.classifier.classify(&native),
        };

        if error.is_cancelled() {
            entry.state = RequestState::Cancelled;
            self.metrics.record_cancelled();
            tracing::debug!(request_id = %id, "Transport reported cancellation");
        } else {
            entry.state = RequestState::Failed;
            self.metrics.record_failed();
            tracing::warn!(
                request_id = %id,
                host = %entry.host,
                kind = ?error.kind(),
                error = %error,
                "Request failed"
            );
        }

        entry.writer.fail(error.clone());
        if let Some(responder) = entry.responder.take() {
            let _ = responder.send(Err(error));
        }
    }
}
