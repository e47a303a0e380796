//! Handshake-time trust evaluation for the reqwest transport.
//!
//! rustls hands every server chain to [`PinningVerifier`], which raises the
//! server-trust challenge for the call being connected. A rejected chain
//! aborts the handshake, so no request byte reaches an untrusted peer.
//!
//! The call is found through a task-local scoped around each running call.
//! A handshake outside any call is refused. Pooled connections keep the
//! decision made when they were established.

use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;
use rustls::client::{ServerCertVerified, ServerCertVerifier, WebPkiVerifier};
use rustls::{Certificate, ClientConfig, OwnedTrustAnchor, RootCertStore, ServerName};

use super::{AuthChallenge, ServerTrust, TransportEvents, TrustDisposition};
use crate::types::RequestId;

tokio::task_local! {
    static CALL_TRUST: CallTrust;
}

/// Trust context of one running call.
#[derive(Clone)]
pub(crate) struct CallTrust {
    id: RequestId,
    events: Arc<dyn TransportEvents>,
    rejection: Arc<Mutex<Option<String>>>,
}

impl CallTrust {
    pub(crate) fn new(id: RequestId, events: Arc<dyn TransportEvents>) -> Self {
        Self {
            id,
            events,
            rejection: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs `future` with this context visible to the verifier.
    pub(crate) async fn scope<F: Future>(self, future: F) -> F::Output {
        CALL_TRUST.scope(self, future).await
    }

    /// Message of the last rejected handshake, if any.
    pub(crate) fn rejection(&self) -> Option<String> {
        self.rejection.lock().clone()
    }
}

/// rustls client configuration with [`PinningVerifier`] installed.
pub(crate) fn client_config() -> ClientConfig {
    ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(PinningVerifier::new()))
        .with_no_client_auth()
}

fn platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));
    roots
}

fn host_of(server_name: &ServerName) -> String {
    match server_name {
        ServerName::DnsName(name) => name.as_ref().to_ascii_lowercase(),
        ServerName::IpAddress(addr) => addr.to_string(),
        _ => String::new(),
    }
}

/// Certificate verifier that defers to the trust delegate of the call.
pub(crate) struct PinningVerifier {
    platform_roots: Arc<RootCertStore>,
}

impl PinningVerifier {
    pub(crate) fn new() -> Self {
        Self {
            platform_roots: Arc::new(platform_roots()),
        }
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let host = host_of(server_name);
        let Ok(call) = CALL_TRUST.try_with(CallTrust::clone) else {
            tracing::debug!(host = %host, "Refusing handshake outside a call");
            return Err(rustls::Error::General(
                "No call to evaluate server trust for".to_string(),
            ));
        };

        let mut trust = HandshakeTrust {
            leaf: end_entity.clone(),
            intermediates: intermediates.to_vec(),
            server_name: server_name.clone(),
            ocsp_response: ocsp_response.to_vec(),
            now,
            platform_roots: self.platform_roots.clone(),
            anchors: None,
        };
        let disposition = call.events.on_trust_challenge(
            call.id,
            AuthChallenge::ServerTrust {
                host: &host,
                trust: &mut trust,
            },
        );
        let trusted = match disposition {
            TrustDisposition::Accept => true,
            TrustDisposition::PerformDefaultHandling => trust.evaluate(),
            TrustDisposition::Reject => false,
        };

        if trusted {
            return Ok(ServerCertVerified::assertion());
        }
        let message = format!("Server certificate for {} was rejected", host);
        tracing::debug!(request_id = %call.id, host = %host, ?disposition, "Aborting handshake");
        *call.rejection.lock() = Some(message.clone());
        Err(rustls::Error::General(message))
    }
}

/// A server chain presented during a handshake.
///
/// Evaluation runs webpki path and name validation against the override
/// anchors when set, or the bundled platform roots otherwise.
#[derive(Debug)]
pub(crate) struct HandshakeTrust {
    leaf: Certificate,
    intermediates: Vec<Certificate>,
    server_name: ServerName,
    ocsp_response: Vec<u8>,
    now: SystemTime,
    platform_roots: Arc<RootCertStore>,
    anchors: Option<Arc<RootCertStore>>,
}

impl ServerTrust for HandshakeTrust {
    fn set_anchor_certificates(&mut self, anchors: &[Bytes]) {
        let mut store = RootCertStore::empty();
        for der in anchors {
            if let Err(err) = store.add(&Certificate(der.to_vec())) {
                tracing::warn!(error = %err, "Ignoring unparsable trust anchor");
            }
        }
        self.anchors = Some(Arc::new(store));
    }

    fn evaluate(&mut self) -> bool {
        let roots = self
            .anchors
            .clone()
            .unwrap_or_else(|| self.platform_roots.clone());
        let verifier = WebPkiVerifier::new(roots, None);
        match verifier.verify_server_cert(
            &self.leaf,
            &self.intermediates,
            &self.server_name,
            &mut std::iter::empty(),
            &self.ocsp_response,
            self.now,
        ) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(server = ?self.server_name, error = %err, "Server chain not trusted");
                false
            }
        }
    }

    fn leaf_certificate(&self) -> Option<Bytes> {
        Some(Bytes::copy_from_slice(&self.leaf.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &[u8] = include_bytes!("../../tests/fixtures/root.der");
    const OTHER_ROOT: &[u8] = include_bytes!("../../tests/fixtures/other_root.der");
    const LOCALHOST: &[u8] = include_bytes!("../../tests/fixtures/localhost.der");

    fn trust_for(host: &str) -> HandshakeTrust {
        HandshakeTrust {
            leaf: Certificate(LOCALHOST.to_vec()),
            intermediates: Vec::new(),
            server_name: ServerName::try_from(host).unwrap(),
            ocsp_response: Vec::new(),
            now: SystemTime::now(),
            platform_roots: Arc::new(platform_roots()),
            anchors: None,
        }
    }

    #[test]
    fn test_private_root_is_untrusted_by_default() {
        let mut trust = trust_for("localhost");
        assert!(!trust.evaluate());
    }

    #[test]
    fn test_anchors_change_the_outcome() {
        let mut trust = trust_for("localhost");
        trust.set_anchor_certificates(&[Bytes::from_static(ROOT)]);
        assert!(trust.evaluate());

        trust.set_anchor_certificates(&[Bytes::from_static(OTHER_ROOT)]);
        assert!(!trust.evaluate());
    }

    #[test]
    fn test_name_is_validated() {
        let mut trust = trust_for("example.com");
        trust.set_anchor_certificates(&[Bytes::from_static(ROOT)]);
        assert!(!trust.evaluate());
    }

    #[test]
    fn test_unparsable_anchor_is_skipped() {
        let mut trust = trust_for("localhost");
        trust.set_anchor_certificates(&[Bytes::from_static(b"garbage"), Bytes::from_static(ROOT)]);
        assert!(trust.evaluate());
    }

    #[test]
    fn test_leaf_is_the_presented_certificate() {
        let trust = trust_for("localhost");
        assert_eq!(trust.leaf_certificate().unwrap().as_ref(), LOCALHOST);
    }

    #[test]
    fn test_handshake_outside_call_is_refused() {
        let verifier = PinningVerifier::new();
        let result = verifier.verify_server_cert(
            &Certificate(LOCALHOST.to_vec()),
            &[],
            &ServerName::try_from("localhost").unwrap(),
            &mut std::iter::empty(),
            &[],
            SystemTime::now(),
        );
        assert!(result.is_err());
    }
}
