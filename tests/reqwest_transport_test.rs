//! Integration tests for the reqwest transport against a local mock server.

use std::time::Duration;

use integrations_native_http::{
    create_bridge, ErrorKind, NativeHttpConfig, NativeRequest, RequestBridge,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_bridge(config: NativeHttpConfig) -> RequestBridge {
    create_bridge(config).unwrap()
}

fn url_for(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_response_body_streams_through_bridge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/greeting"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-kind", "greeting")
                .set_body_string("hello from the server"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let bridge = create_test_bridge(NativeHttpConfig::default());
    let response = bridge
        .send(
            NativeRequest::get(url_for(&server, "/greeting")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.reason_phrase.as_deref(), Some("OK"));
    assert_eq!(response.headers.get("x-request-kind").unwrap(), "greeting");
    assert_eq!(response.body.expected_len(), Some(21));
    assert_eq!(response.text().await.unwrap(), "hello from the server");

    assert_eq!(bridge.in_flight(), 0);
    let metrics = bridge.metrics();
    assert_eq!(metrics.requests_completed, 1);
    assert_eq!(metrics.bytes_received, 21);
}

#[tokio::test]
async fn test_error_status_still_resolves() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let bridge = create_test_bridge(NativeHttpConfig::default());
    let response = bridge
        .send(
            NativeRequest::get(url_for(&server, "/missing")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::NOT_FOUND);
    assert_eq!(response.reason_phrase.as_deref(), Some("Not Found"));
    assert_eq!(response.text().await.unwrap(), "not here");
}

#[tokio::test]
async fn test_post_body_gets_default_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("content-type", "text/plain"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = create_test_bridge(NativeHttpConfig::default());
    let response = bridge
        .send(
            NativeRequest::post(url_for(&server, "/submit"), "payload", None),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::CREATED);
}

#[tokio::test]
async fn test_disable_caching_sends_no_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fresh"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let config = NativeHttpConfig::builder()
        .disable_caching(true)
        .build()
        .unwrap();
    let bridge = create_test_bridge(config);
    let response = bridge
        .send(
            NativeRequest::get(url_for(&server, "/fresh")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.text().await.unwrap(), "fresh");
}

async fn mount_redirect(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let server = MockServer::start().await;
    mount_redirect(&server).await;

    let bridge = create_test_bridge(NativeHttpConfig::default());
    let response = bridge
        .send(
            NativeRequest::get(url_for(&server, "/old")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.url, url_for(&server, "/new"));
    assert_eq!(response.text().await.unwrap(), "moved here");
}

#[tokio::test]
async fn test_redirect_is_suppressed() {
    let server = MockServer::start().await;
    mount_redirect(&server).await;

    let config = NativeHttpConfig::builder()
        .allow_auto_redirect(false)
        .build()
        .unwrap();
    let bridge = create_test_bridge(config);
    let response = bridge
        .send(
            NativeRequest::get(url_for(&server, "/old")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, http::StatusCode::FOUND);
    assert_eq!(response.headers.get("location").unwrap(), "/new");
}

#[tokio::test]
async fn test_redirect_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let config = NativeHttpConfig::builder().max_redirects(2).build().unwrap();
    let bridge = create_test_bridge(config);
    let err = bridge
        .send(
            NativeRequest::get(url_for(&server, "/loop")),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert_eq!(bridge.metrics().requests_failed, 1);
}

#[tokio::test]
async fn test_cancel_during_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let bridge = create_test_bridge(NativeHttpConfig::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = bridge
        .send(NativeRequest::get(url_for(&server, "/slow")), cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    // The transport acknowledges on a blocking thread.
    for _ in 0..100 {
        if bridge.in_flight() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bridge.in_flight(), 0);
    assert_eq!(bridge.metrics().requests_cancelled, 1);
}

#[tokio::test]
async fn test_connection_refused() {
    let bridge = create_test_bridge(NativeHttpConfig::default());
    let err = bridge
        .send(
            NativeRequest::get(Url::parse("http://127.0.0.1:1/").unwrap()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectFailure);
    assert!(err.cause().is_some());
}
