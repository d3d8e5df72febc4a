//! `GET /runner?token=…[&id=…]`: the PTY host's side of a session (spec
//! §4.3.1, routing rules in §4.3.2).

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::auth::tokens_match;
use super::messages::{try_parse, ControlMessage};
use super::AppState;
use crate::session::{self, OutboundMessage, Session, VIEWER_QUEUE_CAPACITY};

#[derive(Debug, Deserialize)]
pub struct RunnerQuery {
    token: String,
    id: Option<String>,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<RunnerQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    if !tokens_match(&query.token, &state.config.token) {
        log::warn!("runner upgrade rejected from {peer}: invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let id = query.id.unwrap_or_else(crate::session_id::generate);
    ws.on_upgrade(move |socket| handle_socket(socket, state, id))
}

async fn handle_socket(socket: WebSocket, state: AppState, id: String) {
    let compression = state.config.compression;
    let session = state.registry.create(id.clone(), compression, 80, 24);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(VIEWER_QUEUE_CAPACITY);
    {
        let mut guard = session.lock().await;
        guard.runner = Some(tx);
    }

    let hello = ControlMessage::Session { id: id.clone(), compression };
    let hello = serde_json::to_string(&hello).expect("control message always serializes");
    if sender.send(Message::Text(hello.into())).await.is_err() {
        log::debug!("runner {id} disconnected before session frame was sent");
        return;
    }

    log::info!("session {id} created, runner connected");

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
                let text = text.to_string();
                handle_control_text(&session, &text).await;
                session.lock().await.fanout(&OutboundMessage::Text(text));
            }
            Message::Binary(bin) => {
                let bin: Vec<u8> = bin.into();
                handle_binary(&session, &state, &bin).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    finish(&state, &session, &id).await;
}

async fn handle_control_text(session: &Arc<tokio::sync::Mutex<Session>>, text: &str) {
    match try_parse(text) {
        Some(ControlMessage::Exit { code }) => {
            log::debug!("runner sent exit code={code}");
            session.lock().await.exited = true;
        }
        Some(ControlMessage::Resize { cols, rows }) => {
            session.lock().await.framebuffer.resize(cols, rows);
        }
        _ => {}
    }
}

async fn handle_binary(session: &Arc<tokio::sync::Mutex<Session>>, state: &AppState, bin: &[u8]) {
    let (viewer_count, uncompressed_len) = {
        let mut guard = session.lock().await;
        let compression = guard.compression;
        let viewer_count = guard.viewers.len();
        let uncompressed_len = match compression.decompress(bin) {
            Ok(decoded) => {
                let len = decoded.len();
                guard.framebuffer.write(&decoded);
                len
            }
            Err(err) => {
                log::debug!("dropping unreadable runner frame: {err}");
                0
            }
        };
        guard.fanout(&OutboundMessage::Binary(bin.to_vec()));
        (viewer_count, uncompressed_len)
    };
    state.stats.lock().await.record_frame(bin.len(), uncompressed_len, viewer_count);
}

async fn finish(state: &AppState, session: &Arc<tokio::sync::Mutex<Session>>, id: &str) {
    {
        let mut guard = session.lock().await;
        guard.runner = None;
        guard.exited = true;
    }
    log::info!("session {id} runner disconnected");
    session::maybe_start_cleanup(&state.registry, session, state.config.session_ttl).await;
}
