//! Binary entry point: load configuration, wire up shared state, bind the
//! HTTP/WebSocket listener, and spawn the periodic stats logger (spec §6,
//! §10.1–§10.3).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use ptyrelay::config::{CliArgs, Config};
use ptyrelay::relay::{router, AppState};
use ptyrelay::session::SessionRegistry;
use ptyrelay::stats::{log_periodic, Stats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load(CliArgs::parse()).context("invalid configuration")?;
    let config = Arc::new(config);

    let registry = SessionRegistry::new();
    let stats = Arc::new(Mutex::new(Stats::default()));

    let state = AppState { registry: registry.clone(), config: config.clone(), stats: stats.clone() };

    spawn_stats_logger(registry, stats, config.stats_interval);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;

    log::info!("ptyrelay listening on {addr}, compression={}", config.compression);

    let make_service = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await.context("server loop exited with an error")?;

    Ok(())
}

fn spawn_stats_logger(registry: Arc<SessionRegistry>, stats: Arc<Mutex<Stats>>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let mut stats = stats.lock().await;
            log_periodic(&registry, &mut stats);
        }
    });
}
