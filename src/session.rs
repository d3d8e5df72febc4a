//! Session: the unit of multiplexing. Binds one runner, a set of viewers,
//! and one framebuffer instance; tracks exit/idle state and the cleanup
//! timer (spec §3, §4.3.3).
//!
//! Per-session state is mutated under a per-session `tokio::sync::Mutex`
//! (spec §5's "per-session mutex" option); the registry itself is a
//! `DashMap`, matching the lock-free concurrent-map idiom already used
//! elsewhere in this codebase's own session tracking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::codec::CompressionMode;
use crate::framebuffer::Framebuffer;

/// Per-viewer outbound queue capacity. A slow viewer's queue fills up and
/// further sends are dropped rather than blocking the runner (spec §5 fan-out
/// policy, option b).
pub const VIEWER_QUEUE_CAPACITY: usize = 64;

/// A message destined for a connection's writer task.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text(String),
    Binary(Vec<u8>),
    Close { code: u16, reason: String },
}

impl OutboundMessage {
    /// Convert to the axum WebSocket message type a writer task actually sends.
    pub fn into_ws_message(self) -> Message {
        match self {
            OutboundMessage::Text(text) => Message::Text(text.into()),
            OutboundMessage::Binary(bin) => Message::Binary(bin.into()),
            OutboundMessage::Close { code, reason } => {
                Message::Close(Some(CloseFrame { code, reason: reason.into() }))
            }
        }
    }
}

pub type Outbox = mpsc::Sender<OutboundMessage>;

/// Opaque per-connection identity used only to find a viewer again within
/// its session's `viewers` map.
pub type ViewerId = u64;

/// The unit of multiplexing: one runner, zero-or-more viewers, one
/// framebuffer.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub runner: Option<Outbox>,
    pub viewers: HashMap<ViewerId, Outbox>,
    next_viewer_id: ViewerId,
    pub framebuffer: Framebuffer,
    pub compression: CompressionMode,
    pub exited: bool,
    cleanup_handle: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(id: String, compression: CompressionMode, cols: u16, rows: u16) -> Self {
        Session {
            id,
            runner: None,
            viewers: HashMap::new(),
            next_viewer_id: 0,
            framebuffer: Framebuffer::new(cols, rows),
            compression,
            exited: false,
            cleanup_handle: None,
        }
    }

    /// Register a viewer's outbox and return the id to remove it by later.
    pub fn add_viewer(&mut self, outbox: Outbox) -> ViewerId {
        let id = self.next_viewer_id;
        self.next_viewer_id += 1;
        self.viewers.insert(id, outbox);
        id
    }

    pub fn remove_viewer(&mut self, id: ViewerId) {
        self.viewers.remove(&id);
    }

    /// Best-effort fan-out: a full queue means the viewer is slow and the
    /// frame is silently dropped rather than stalling the runner.
    pub fn fanout(&self, msg: &OutboundMessage) {
        for outbox in self.viewers.values() {
            let _ = outbox.try_send(msg.clone());
        }
    }

    /// Forward unchanged to the runner, if connected (spec §4.3.2).
    pub fn send_to_runner(&self, msg: OutboundMessage) {
        if let Some(runner) = &self.runner {
            let _ = runner.try_send(msg);
        }
    }

    fn cancel_cleanup(&mut self) {
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
        }
    }
}

/// Sessions registry: `session-id -> Session`, concurrency-safe.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionRegistry { sessions: DashMap::new() })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Sum of viewer counts across all sessions, for the stats line.
    /// Sessions whose mutex is momentarily held elsewhere are skipped rather
    /// than awaited, since this is best-effort observability, not a
    /// correctness-bearing read.
    pub fn total_viewer_count(&self) -> usize {
        self.sessions
            .iter()
            .filter_map(|entry| entry.value().try_lock().ok().map(|s| s.viewers.len()))
            .sum()
    }

    /// Create and register a new session. Returns the existing session
    /// unchanged if `id` is already present (callers should check first via
    /// `get` when `id` came from a client-supplied query param).
    pub fn create(&self, id: String, compression: CompressionMode, cols: u16, rows: u16) -> Arc<Mutex<Session>> {
        let session = Arc::new(Mutex::new(Session::new(id.clone(), compression, cols, rows)));
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }
}

/// Cancel any pending cleanup timer — a viewer joined before it fired.
pub async fn cancel_pending_cleanup(session: &Arc<Mutex<Session>>) {
    session.lock().await.cancel_cleanup();
}

/// Start (or leave running) the idle cleanup timer when `exited && viewers
/// is empty`. Idempotent: a session that already has a pending timer is
/// left alone.
pub async fn maybe_start_cleanup(registry: &Arc<SessionRegistry>, session: &Arc<Mutex<Session>>, ttl: Duration) {
    let mut guard = session.lock().await;
    if guard.exited && guard.viewers.is_empty() && guard.cleanup_handle.is_none() {
        let id = guard.id.clone();
        let registry = registry.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            registry.remove(&id);
            log::info!("session {id} deleted after {ttl:?} idle cleanup timer");
        });
        guard.cleanup_handle = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressionMode;

    #[tokio::test]
    async fn registry_create_get_remove_round_trip() {
        let registry = SessionRegistry::new();
        registry.create("amber-river-quartz".into(), CompressionMode::None, 80, 24);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("amber-river-quartz").is_some());
        registry.remove("amber-river-quartz");
        assert!(registry.get("amber-river-quartz").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn cleanup_timer_deletes_after_ttl_unless_cancelled() {
        let registry = SessionRegistry::new();
        let session = registry.create("s1".into(), CompressionMode::None, 80, 24);
        session.lock().await.exited = true;

        maybe_start_cleanup(&registry, &session, Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.get("s1").is_none());
    }

    #[tokio::test]
    async fn viewer_join_cancels_pending_cleanup() {
        let registry = SessionRegistry::new();
        let session = registry.create("s2".into(), CompressionMode::None, 80, 24);
        session.lock().await.exited = true;

        maybe_start_cleanup(&registry, &session, Duration::from_millis(20)).await;
        cancel_pending_cleanup(&session).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(registry.get("s2").is_some());
    }

    #[tokio::test]
    async fn fanout_drops_on_full_queue_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut session = Session::new("s3".into(), CompressionMode::None, 80, 24);
        session.add_viewer(tx);
        session.fanout(&OutboundMessage::Text("one".into()));
        session.fanout(&OutboundMessage::Text("two".into()));
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, OutboundMessage::Text(s) if s == "one"));
    }
}
