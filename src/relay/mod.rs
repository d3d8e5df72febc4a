//! The relay server: route wiring and shared app state (spec §4.3).

mod assets;
mod auth;
mod messages;
pub mod runner;
pub mod viewer;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::session::SessionRegistry;
use crate::stats::Stats;

/// Shared process state reachable from every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<Config>,
    pub stats: Arc<Mutex<Stats>>,
}

/// Build the full route table: `/runner`, `/ws`, and the static asset
/// fallback for everything else (spec §4.3.1).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/runner", get(runner::upgrade))
        .route("/ws", get(viewer::upgrade))
        .fallback(assets::serve)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
