//! End-to-end tests for [`HttpTransport`] against a raw TCP HTTP server.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{mock_http_server, HttpBehavior};
use wdrive_core::client::Client;
use wdrive_core::config::ClientConfig;
use wdrive_core::error::ErrorKind;
use wdrive_core::transport::{HttpTransport, Request, Transport};

fn transport_for(addr: std::net::SocketAddr) -> HttpTransport {
    HttpTransport::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn ok_response_body_is_decoded() {
    let (addr, mut seen) = mock_http_server(vec![HttpBehavior::Respond(
        200,
        r#"{"value": {"ready": true}, "sessionId": null}"#.to_string(),
    )])
    .await;

    let body = transport_for(addr)
        .request(&Request::get("/status"))
        .await
        .unwrap();

    assert_eq!(body["value"]["ready"], json!(true));
    assert_eq!(seen.recv().await.unwrap(), "GET /status");
}

#[tokio::test]
async fn json_body_is_sent() {
    let (addr, mut seen) = mock_http_server(vec![HttpBehavior::Respond(
        200,
        r#"{"sessionId": "S1"}"#.to_string(),
    )])
    .await;

    transport_for(addr)
        .request(&Request::post("/session", json!({ "capabilities": {} })))
        .await
        .unwrap();

    let line = seen.recv().await.unwrap();
    assert!(line.starts_with("POST /session "), "{line}");
    let body: serde_json::Value = serde_json::from_str(line.trim_start_matches("POST /session ")).unwrap();
    assert_eq!(body, json!({ "capabilities": {} }));
}

#[tokio::test]
async fn not_found_returns_embedded_error() {
    let (addr, _seen) = mock_http_server(vec![
        HttpBehavior::Respond(
            404,
            r#"{"value": {"error": "no such element", "message": "unable to find"}}"#.to_string(),
        ),
        HttpBehavior::Respond(404, r#"{"value": {"message": "gone"}}"#.to_string()),
    ])
    .await;
    let transport = transport_for(addr);

    let value = transport
        .request(&Request::post("/session/S1/element", json!({})))
        .await
        .unwrap();
    assert_eq!(value, json!("no such element"));

    let value = transport.request(&Request::get("/nowhere")).await.unwrap();
    assert_eq!(value, json!({ "value": { "message": "gone" } }));
}

#[tokio::test]
async fn server_error_status_still_returns_body() {
    let (addr, _seen) = mock_http_server(vec![HttpBehavior::Respond(
        500,
        r#"{"value": {"error": "unknown error"}}"#.to_string(),
    )])
    .await;

    let value = transport_for(addr)
        .request(&Request::post_empty("/wda/homescreen"))
        .await
        .unwrap();
    assert_eq!(value["value"]["error"], json!("unknown error"));
}

#[tokio::test]
async fn non_json_body_is_malformed_response() {
    let (addr, _seen) =
        mock_http_server(vec![HttpBehavior::Respond(200, "<html>oops</html>".to_string())]).await;

    let err = transport_for(addr)
        .request(&Request::get("/status"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert!(err.to_string().contains("/status"));
}

#[tokio::test]
async fn hung_server_hits_request_timeout() {
    let (addr, _seen) = mock_http_server(vec![HttpBehavior::Hang]).await;
    let transport = HttpTransport::new(format!("http://{addr}"), Duration::from_millis(200)).unwrap();

    let err = transport.request(&Request::get("/status")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn client_over_http_creates_session_and_finds_element() {
    let (addr, mut seen) = mock_http_server(vec![
        HttpBehavior::Respond(200, r#"{"value": {}, "sessionId": null}"#.to_string()),
        HttpBehavior::Respond(200, r#"{"sessionId": "HTTP-S"}"#.to_string()),
        HttpBehavior::Respond(200, r#"{"value": {"ELEMENT": "HTTP-E"}}"#.to_string()),
    ])
    .await;
    let config = ClientConfig::default().with_base_url(format!("http://{addr}"));
    let client = Client::new(config).unwrap();

    let handle = client
        .find_element(&wdrive_core::locator::Locator::id("login"))
        .await
        .unwrap();
    assert_eq!(handle.id(), "HTTP-E");

    assert_eq!(seen.recv().await.unwrap(), "GET /status");
    assert!(seen.recv().await.unwrap().starts_with("POST /session "));
    assert!(seen
        .recv()
        .await
        .unwrap()
        .starts_with("POST /session/HTTP-S/element "));
}

#[tokio::test]
async fn connect_creates_session_with_configured_bundle() {
    let (addr, mut seen) = mock_http_server(vec![HttpBehavior::Respond(
        200,
        r#"{"value": {"sessionId": "CONN-S"}}"#.to_string(),
    )])
    .await;
    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_bundle_id("com.example.app");

    let client = Client::connect(config).await.unwrap();

    assert_eq!(client.sessions().session_id().await.as_deref(), Some("CONN-S"));
    let line = seen.recv().await.unwrap();
    assert!(line.starts_with("POST /session "), "{line}");
    let body: serde_json::Value = serde_json::from_str(line.trim_start_matches("POST /session ")).unwrap();
    assert_eq!(
        body,
        json!({ "capabilities": { "alwaysMatch": { "bundleId": "com.example.app" } } })
    );
}
