//! Transport capability.
//!
//! A transport runs native calls and reports their events by request identity.
//! The bridge implements [`TransportEvents`]; bindings for platform HTTP stacks
//! implement [`Transport`]. Events for one call arrive sequentially, on
//! whatever thread the transport uses.

mod reqwest_transport;
#[cfg(feature = "rustls")]
mod tls;

pub use reqwest_transport::ReqwestTransport;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::errors::{NativeError, NativeHttpResult};
use crate::types::{NativeCall, RedirectDecision, RedirectRequest, RequestId, ResponseHead};

/// A native HTTP stack.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Starts a call. Every event for it is reported to `events` under `call.id`.
    ///
    /// Returns an error only if the call could not be started at all; once
    /// started, failures are reported through [`TransportEvents::on_complete`].
    fn start(&self, call: NativeCall, events: Arc<dyn TransportEvents>) -> NativeHttpResult<()>;

    /// Requests cancellation of a call.
    ///
    /// Only requested for calls whose `start` has returned. Must not block on
    /// the call itself. A started call acknowledges the cancellation with
    /// exactly one `on_complete`, normally carrying a cancellation code.
    fn cancel(&self, id: RequestId);
}

/// Receiver of transport events.
pub trait TransportEvents: Send + Sync {
    /// Decides an authentication challenge.
    ///
    /// Server trust is challenged during the TLS handshake, before any
    /// request byte is written; a rejection aborts the connection.
    fn on_trust_challenge(&self, id: RequestId, challenge: AuthChallenge<'_>) -> TrustDisposition;

    /// Decides whether a redirect is followed.
    fn on_redirect(&self, id: RequestId, redirect: &RedirectRequest) -> RedirectDecision;

    /// Response headers arrived.
    fn on_response(&self, id: RequestId, head: ResponseHead);

    /// A body chunk arrived.
    fn on_data(&self, id: RequestId, chunk: Bytes);

    /// Returns true if the response may be stored in the transport's cache.
    fn should_cache_response(&self, id: RequestId) -> bool;

    /// The call finished. Reported exactly once per started call.
    fn on_complete(&self, id: RequestId, outcome: Result<(), NativeError>);
}

impl fmt::Debug for dyn TransportEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportEvents")
    }
}

/// Platform trust object presented with a server-trust challenge.
pub trait ServerTrust: Send {
    /// Replaces the anchor certificates (DER) used by [`ServerTrust::evaluate`].
    fn set_anchor_certificates(&mut self, anchors: &[Bytes]);

    /// Runs platform trust evaluation. True means proceed.
    fn evaluate(&mut self) -> bool;

    /// DER bytes of the leaf certificate, if the chain has one.
    fn leaf_certificate(&self) -> Option<Bytes>;
}

/// Authentication challenge raised during a call.
pub enum AuthChallenge<'a> {
    /// Server trust evaluation for a TLS connection.
    ServerTrust {
        /// Host being connected to.
        host: &'a str,
        /// Platform trust object.
        trust: &'a mut dyn ServerTrust,
    },
    /// Any other challenge, identified by its authentication method.
    Other {
        /// Authentication method name.
        method: &'a str,
    },
}

impl fmt::Debug for AuthChallenge<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthChallenge::ServerTrust { host, .. } => {
                f.debug_struct("ServerTrust").field("host", host).finish_non_exhaustive()
            }
            AuthChallenge::Other { method } => f.debug_struct("Other").field("method", method).finish(),
        }
    }
}

/// Outcome of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDisposition {
    /// Proceed with the evaluated trust.
    Accept,
    /// Let the platform decide.
    PerformDefaultHandling,
    /// Abort the connection.
    Reject,
}
