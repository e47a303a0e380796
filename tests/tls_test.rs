//! Handshake trust through the reqwest transport against a local TLS server.

#![cfg(feature = "rustls")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use integrations_native_http::pinning::pin_for;
use integrations_native_http::{create_bridge, ErrorKind, NativeHttpConfig, NativeRequest, RequestBridge};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use url::Url;

const ROOT: &[u8] = include_bytes!("fixtures/root.der");
const OTHER_ROOT: &[u8] = include_bytes!("fixtures/other_root.der");
const LOCALHOST: &[u8] = include_bytes!("fixtures/localhost.der");
const LOCALHOST_KEY: &[u8] = include_bytes!("fixtures/localhost.key.der");

struct TlsServer {
    port: u16,
    received: Arc<AtomicUsize>,
}

impl TlsServer {
    /// Starts a server presenting the `localhost` chain and answering `ok`.
    async fn start() -> Self {
        let config = ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(
                vec![Certificate(LOCALHOST.to_vec()), Certificate(ROOT.to_vec())],
                PrivateKey(LOCALHOST_KEY.to_vec()),
            )
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(AtomicUsize::new(0));

        let counter = received.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let Ok(mut tls) = acceptor.accept(tcp).await else {
                        return;
                    };
                    let mut buf = [0u8; 4096];
                    let mut request = Vec::new();
                    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                        match tls.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => {
                                counter.fetch_add(n, Ordering::SeqCst);
                                request.extend_from_slice(&buf[..n]);
                            }
                        }
                    }
                    let _ = tls
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                        .await;
                    let _ = tls.shutdown().await;
                });
            }
        });

        Self { port, received }
    }

    fn url(&self) -> Url {
        Url::parse(&format!("https://localhost:{}/", self.port)).unwrap()
    }

    fn bytes_received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

async fn fetch(bridge: &RequestBridge, server: &TlsServer) -> Result<String, ErrorKind> {
    let response = bridge
        .send(NativeRequest::get(server.url()), CancellationToken::new())
        .await
        .map_err(|e| e.kind())?;
    response.text().await.map_err(|e| e.kind())
}

#[tokio::test]
async fn test_configured_anchor_is_trusted() {
    let server = TlsServer::start().await;
    let config = NativeHttpConfig::builder()
        .trusted_certificates(vec![Bytes::from_static(ROOT)])
        .build()
        .unwrap();
    let bridge = create_bridge(config).unwrap();

    assert_eq!(fetch(&bridge, &server).await, Ok("ok".to_string()));
}

#[tokio::test]
async fn test_unknown_root_fails_handshake() {
    let server = TlsServer::start().await;
    let bridge = create_bridge(NativeHttpConfig::default()).unwrap();

    assert_eq!(fetch(&bridge, &server).await, Err(ErrorKind::TrustFailure));
    assert_eq!(server.bytes_received(), 0);
    assert_eq!(bridge.metrics().requests_failed, 1);
}

#[tokio::test]
async fn test_pin_mismatch_stops_request_before_it_is_sent() {
    let server = TlsServer::start().await;
    let config = NativeHttpConfig::builder()
        .trusted_certificates(vec![Bytes::from_static(ROOT)])
        .pins("localhost", [pin_for(OTHER_ROOT)])
        .build()
        .unwrap();
    let bridge = create_bridge(config).unwrap();

    assert_eq!(fetch(&bridge, &server).await, Err(ErrorKind::TrustFailure));
    assert_eq!(server.bytes_received(), 0);
    assert_eq!(bridge.metrics().pin_rejections, 1);
}

#[tokio::test]
async fn test_matching_pin_is_accepted() {
    let server = TlsServer::start().await;
    let config = NativeHttpConfig::builder()
        .trusted_certificates(vec![Bytes::from_static(ROOT)])
        .pins("localhost", [pin_for(LOCALHOST)])
        .build()
        .unwrap();
    let bridge = create_bridge(config).unwrap();

    assert_eq!(fetch(&bridge, &server).await, Ok("ok".to_string()));
    assert!(server.bytes_received() > 0);
}

#[tokio::test]
async fn test_anchors_set_at_runtime_apply_to_new_handshakes() {
    let server = TlsServer::start().await;
    let bridge = create_bridge(NativeHttpConfig::default()).unwrap();
    assert_eq!(fetch(&bridge, &server).await, Err(ErrorKind::TrustFailure));

    bridge.set_trusted_certificates(Some(vec![Bytes::from_static(ROOT)]));
    assert_eq!(fetch(&bridge, &server).await, Ok("ok".to_string()));

    // The server closes each connection, so every fetch handshakes again.
    bridge.set_trusted_certificates(Some(vec![Bytes::from_static(OTHER_ROOT)]));
    assert_eq!(fetch(&bridge, &server).await, Err(ErrorKind::TrustFailure));
}
