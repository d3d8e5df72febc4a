//! End-to-end coverage of the runner->relay->viewer join handshake (spec
//! §8 scenario 5): a runner connects, writes a frame, and a viewer that
//! joins afterward receives the compression mode, a snapshot reflecting
//! that frame, then the ready marker.
//!
//! Drives the real axum router over real sockets with `tokio-tungstenite`
//! as the client, the same crate this codebase already depends on for its
//! own WebSocket client connections (see `ws::connect`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;

use ptyrelay::codec::CompressionMode;
use ptyrelay::config::Config;
use ptyrelay::relay::{router, AppState};
use ptyrelay::session::SessionRegistry;
use ptyrelay::stats::Stats;

const TOKEN: &str = "test-token";

async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind an ephemeral port");
    let addr = listener.local_addr().expect("listener has a local address");

    let config = Arc::new(Config {
        port: addr.port(),
        token: TOKEN.to_string(),
        compression: CompressionMode::None,
        session_ttl: Duration::from_secs(1800),
        stats_interval: Duration::from_secs(60),
    });
    let state = AppState { registry: SessionRegistry::new(), config, stats: Arc::new(Mutex::new(Stats::default())) };

    let make_service = router(state).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        axum::serve(listener, make_service).await.expect("relay server loop");
    });

    addr
}

#[tokio::test]
async fn runner_frame_is_visible_in_the_viewers_join_snapshot() {
    let addr = spawn_relay().await;

    let (mut runner, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/runner?token={TOKEN}"))
            .await
            .expect("runner upgrades");

    let session_frame: Value = match runner.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text.to_string()).unwrap(),
        other => panic!("expected a session control message, got {other:?}"),
    };
    assert_eq!(session_frame["type"], "session");
    let id = session_frame["id"].as_str().expect("session id is a string").to_string();

    runner.send(Message::Binary(b"hello".to_vec().into())).await.expect("runner writes a frame");
    // The relay folds the frame into its framebuffer inside the connection's
    // read loop; give that task a moment to run before a viewer joins.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut viewer, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?id={id}&token={TOKEN}"))
            .await
            .expect("viewer upgrades");

    let compression_frame: Value = match viewer.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text.to_string()).unwrap(),
        other => panic!("expected a compression control message, got {other:?}"),
    };
    assert_eq!(compression_frame["type"], "compression");
    assert_eq!(compression_frame["mode"], "none");

    let snapshot = match viewer.next().await {
        Some(Ok(Message::Binary(data))) => String::from_utf8(data.to_vec()).expect("snapshot is utf8"),
        other => panic!("expected a snapshot frame, got {other:?}"),
    };
    assert!(snapshot.contains("hello"), "snapshot should contain the runner's output: {snapshot:?}");

    let ready_frame: Value = match viewer.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text.to_string()).unwrap(),
        other => panic!("expected a ready control message, got {other:?}"),
    };
    assert_eq!(ready_frame["type"], "ready");
}

#[tokio::test]
async fn viewer_join_to_unknown_session_closes_with_4004() {
    let addr = spawn_relay().await;

    let (mut viewer, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ws?id=no-such-session&token={TOKEN}"))
            .await
            .expect("viewer upgrades even though the session doesn't exist");

    match viewer.next().await {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(u16::from(frame.code), 4004),
        other => panic!("expected a 4004 close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn runner_upgrade_rejects_wrong_token() {
    let addr = spawn_relay().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/runner?token=wrong")).await;
    assert!(result.is_err(), "upgrade with an invalid token should fail");
}
