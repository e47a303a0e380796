//! Per-request bookkeeping.

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::errors::NativeHttpResult;
use crate::stream::StreamWriter;
use crate::types::{ProgressCallback, RequestId, ResponseHead};

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Handed to the transport.
    Submitted,
    /// A server-trust challenge is being evaluated.
    AwaitingTrust,
    /// Headers delivered; body streaming.
    Streaming,
    /// Body completed.
    Completed,
    /// Failed with a classified error.
    Failed,
    /// Cancelled by the caller; waiting for the transport to acknowledge.
    Cancelled,
}

impl RequestState {
    /// Returns true for completed, failed and cancelled requests.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Completed | RequestState::Failed | RequestState::Cancelled
        )
    }
}

pub(crate) type Responder = oneshot::Sender<NativeHttpResult<ResponseHead>>;

/// An outstanding native call.
pub(crate) struct InFlightRequest {
    pub(crate) host: String,
    pub(crate) state: RequestState,
    pub(crate) writer: StreamWriter,
    pub(crate) responder: Option<Responder>,
    /// Fired when the request terminates; stops its cancellation watcher.
    pub(crate) finished: CancellationToken,
    /// Set once `Transport::start` returned; cancels before that are
    /// forwarded by the submitting task.
    pub(crate) started: bool,
    pub(crate) observer: Option<ProgressCallback>,
    pub(crate) expected_len: Option<u64>,
    pub(crate) received: u64,
}

impl InFlightRequest {
    pub(crate) fn new(
        host: String,
        writer: StreamWriter,
        responder: Responder,
        finished: CancellationToken,
    ) -> Self {
        Self {
            host,
            state: RequestState::Submitted,
            writer,
            responder: Some(responder),
            finished,
            started: false,
            observer: None,
            expected_len: None,
            received: 0,
        }
    }

    /// Moves a live request to `state`. Terminal requests never move.
    pub(crate) fn transition(&mut self, id: RequestId, state: RequestState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        tracing::trace!(request_id = %id, from = ?self.state, to = ?state, "Request state change");
        self.state = state;
        true
    }
}
