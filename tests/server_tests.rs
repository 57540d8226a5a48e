//! HTTP surface tests: image endpoint, action API, static assets, event stream.

mod common;

use axum::body::to_bytes;
use axum::http::StatusCode;
use common::*;
use deskwallet::engine::Wallet;
use deskwallet::server::{create_router, image_routes, AppState, ImageEndpoint};
use deskwallet::{ui, BridgeConfig, EventRouter, Network, Shutdown, UiDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

struct Response {
    status: u16,
    headers: String,
    body: Vec<u8>,
}

/// Minimal HTTP/1.1 client: one request per connection.
async fn request(addr: SocketAddr, method: &str, path: &str, body: &str) -> Response {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let head = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("header terminator");
    let headers = String::from_utf8_lossy(&raw[..split]).to_string();
    let status = headers.split_whitespace().nth(1).and_then(|s| s.parse().ok()).expect("status");
    Response { status, headers: headers.to_ascii_lowercase(), body: raw[split + 4..].to_vec() }
}

struct Server {
    addr: SocketAddr,
    engine: Arc<MockEngine>,
    _assets: TempDir,
}

async fn serve(engine: MockEngine) -> Server {
    let assets = TempDir::new().expect("tempdir");
    std::fs::write(assets.path().join("index.html"), "<html>wallet</html>").unwrap();

    let config = BridgeConfig::new("deskwallet-test").with_poll_interval(Duration::from_millis(10));
    let engine = Arc::new(engine);
    let (notifier, queue) = ui::channel();
    let dispatcher = UiDispatcher::default();
    tokio::spawn(dispatcher.clone().run(queue));

    let router = Arc::new(EventRouter::new(engine.clone(), notifier, &config));
    let app = create_router(AppState::new(router, dispatcher, &config), assets.path());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    Server { addr, engine, _assets: assets }
}

#[tokio::test]
async fn bad_address_is_400_with_decode_error() {
    let server = serve(MockEngine::new()).await;
    let resp = request(server.addr, "GET", "/img/not-a-real-address", "").await;

    assert_eq!(resp.status, 400);
    let body = String::from_utf8(resp.body).unwrap();
    assert!(body.starts_with("invalid address: not-a-real-address"), "{body}");
}

#[tokio::test]
async fn valid_address_is_png() {
    let server = serve(MockEngine::new()).await;
    let resp = request(server.addr, "GET", &format!("/img/{}", MAINNET_ADDR), "").await;

    assert_eq!(resp.status, 200);
    assert!(resp.headers.contains("content-type: image/png"));
    assert!(resp.body.starts_with(PNG_SIGNATURE));
}

#[tokio::test]
async fn wrong_network_address_is_400() {
    let server = serve(MockEngine::new()).await;
    let resp = request(server.addr, "GET", &format!("/img/{}", SIGNET_ADDR), "").await;
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn static_assets_are_served() {
    let server = serve(MockEngine::new()).await;
    let resp = request(server.addr, "GET", "/index.html", "").await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"<html>wallet</html>");
}

#[tokio::test]
async fn health_reports_service() {
    let server = serve(MockEngine::new()).await;
    let resp = request(server.addr, "GET", "/health", "").await;
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "deskwallet-test");
    assert_eq!(json["network"], "bitcoin");
}

#[tokio::test]
async fn api_status_codes() {
    let server = serve(MockEngine::new().with_progress(&[1.0])).await;

    let bad = request(server.addr, "POST", "/api", "{nope").await;
    assert_eq!(bad.status, 400);

    let unconnected = request(server.addr, "POST", "/api", r#"{"fn":"send","data":{"address":"x","amount":1}}"#).await;
    assert_eq!(unconnected.status, 422);
    assert_eq!(String::from_utf8(unconnected.body).unwrap(), "no wallet connected");

    let connect = serde_json::json!({"fn": "connect", "data": TEST_PHRASE}).to_string();
    assert_eq!(request(server.addr, "POST", "/api", &connect).await.status, 202);
}

#[tokio::test]
async fn state_follows_connect() {
    let server = serve(MockEngine::new().with_progress(&[1.0])).await;
    let connect = serde_json::json!({"fn": "connect", "data": TEST_PHRASE}).to_string();
    request(server.addr, "POST", "/api", &connect).await;

    for _ in 0..100 {
        let resp = request(server.addr, "GET", "/state", "").await;
        let view: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        if view["progress"] == 100.0 {
            assert_eq!(view["address"], server.engine.last_wallet().receive_address());
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sync never reached the view state");
}

#[tokio::test]
async fn events_replay_current_view() {
    let server = serve(MockEngine::new()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
        .await
        .unwrap();

    let mut seen = String::new();
    let mut buf = [0u8; 1024];
    while !seen.contains("app.progress = 0.00") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.expect("event").unwrap();
        assert!(n > 0, "stream closed early");
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    assert!(seen.to_ascii_lowercase().contains("content-type: text/event-stream"));
    assert!(seen.contains(r#"data: app.balance = 0; app.address = """#));
}

#[tokio::test]
async fn image_endpoint_responds_directly() {
    let images = ImageEndpoint::new(Network::Signet, 128);

    let ok = images.respond(SIGNET_ADDR);
    assert_eq!(ok.status(), StatusCode::OK);
    let png = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
    assert!(png.starts_with(PNG_SIGNATURE));

    let bad = images.respond(MAINNET_ADDR);
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    let text = to_bytes(bad.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains(MAINNET_ADDR));
}

#[tokio::test]
async fn image_routes_stand_alone() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, image_routes(ImageEndpoint::new(Network::Bitcoin, 64))).await });

    assert_eq!(request(addr, "GET", &format!("/img/{}", MAINNET_ADDR), "").await.status, 200);
    assert_eq!(request(addr, "GET", "/img/zzz", "").await.status, 400);
}

#[tokio::test]
async fn graceful_shutdown_ends_open_event_streams() {
    let config = BridgeConfig::new("deskwallet-test");
    let (notifier, queue) = ui::channel();
    let dispatcher = UiDispatcher::default();
    tokio::spawn(dispatcher.clone().run(queue));

    let shutdown = Shutdown::new();
    let router = Arc::new(EventRouter::new(Arc::new(MockEngine::new()), notifier, &config));
    let state = AppState::new(router, dispatcher, &config).with_shutdown(shutdown.clone());
    let app = create_router(state, std::env::temp_dir());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut stop = shutdown.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await
    });

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();
    let mut buf = [0u8; 1024];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.expect("headers").unwrap();
    assert!(n > 0);

    shutdown.trigger().await;
    tokio::time::timeout(Duration::from_secs(3), server)
        .await
        .expect("server stops while a client is subscribed")
        .unwrap()
        .unwrap();
}
