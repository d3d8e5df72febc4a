//! `GET /ws?id=…&token=…`: a viewer's side of a session (spec §4.3.1,
//! joiner snapshotting per §4.2's padded framing).

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::sync::mpsc;

use super::auth::tokens_match;
use super::messages::ControlMessage;
use super::AppState;
use crate::codec::compress_for_replay;
use crate::session::{self, OutboundMessage, VIEWER_QUEUE_CAPACITY};

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    id: String,
    token: String,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<ViewerQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !tokens_match(&query.token, &state.config.token) {
        log::warn!("viewer upgrade rejected from {peer}: invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, query.id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, id: String) {
    let Some(session) = state.registry.get(&id) else {
        log::debug!("viewer rejected: session {id} not found");
        let _ = socket.send(session_not_found_close()).await;
        return;
    };

    session::cancel_pending_cleanup(&session).await;

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(VIEWER_QUEUE_CAPACITY);

    let (compression, snapshot, viewer_id) = {
        let mut guard = session.lock().await;
        let compression = guard.compression;
        let snapshot = guard.framebuffer.serialize();
        let viewer_id = guard.add_viewer(tx);
        (compression, snapshot, viewer_id)
    };

    let compression_msg = ControlMessage::Compression { mode: compression };
    let compression_msg = serde_json::to_string(&compression_msg).expect("control message always serializes");
    if sender.send(Message::Text(compression_msg.into())).await.is_err() {
        session.lock().await.remove_viewer(viewer_id);
        return;
    }

    let framed = compress_for_replay(compression, snapshot.as_bytes());
    if sender.send(Message::Binary(framed.into())).await.is_err() {
        session.lock().await.remove_viewer(viewer_id);
        return;
    }

    let ready_msg = serde_json::to_string(&ControlMessage::Ready).expect("control message always serializes");
    if sender.send(Message::Text(ready_msg.into())).await.is_err() {
        session.lock().await.remove_viewer(viewer_id);
        return;
    }

    log::info!("viewer joined session {id}");

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg.into_ws_message()).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                session.lock().await.send_to_runner(OutboundMessage::Text(text.to_string()));
            }
            Message::Binary(bin) => {
                session.lock().await.send_to_runner(OutboundMessage::Binary(bin.into()));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    session.lock().await.remove_viewer(viewer_id);
    session::maybe_start_cleanup(&state.registry, &session, state.config.session_ttl).await;
    log::info!("viewer left session {id}");
}

/// Close frame for the "unknown session" case (spec §4.3.1, close code 4004).
fn session_not_found_close() -> Message {
    Message::Close(Some(CloseFrame { code: 4004, reason: "Session not found".into() }))
}
