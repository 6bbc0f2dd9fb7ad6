//! tdk-daemon entry point.
//!
//! Sets up tracing, loads config, builds the engine over Postgres, schedules
//! it, wires middleware and serves HTTP until ctrl-c. Route handlers live in
//! `routes.rs`; shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tdk_config::{Component, UnusedKeyPolicy};
use tdk_daemon::{routes, state};
use tdk_runtime::{Engine, EngineParts};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = tdk_config::config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = tdk_config::load_layered_yaml(&path_refs)?;
    let unused = tdk_config::report_unused_keys(
        Component::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for key in &unused.unused_leaf_pointers {
        tracing::warn!(pointer = %key, "config key not consumed by daemon");
    }
    let cfg = loaded.engine()?;
    let secrets = tdk_config::secrets::resolve_secrets(&loaded.config_json, false)?;
    info!(config_hash = %loaded.config_hash, engine_id = %cfg.engine.engine_id, "config loaded");

    let pool = tdk_db::connect_from_env().await?;
    tdk_db::migrate(&pool).await?;

    let bus = state::new_bus();
    let exchange = Arc::new(tdk_runtime::exchange_client(&cfg, &secrets));
    let parts = EngineParts::postgres(
        pool,
        exchange,
        Arc::new(state::BusNotifier::new(bus.clone())),
    );
    let daemon_addr = cfg.daemon.addr.clone();
    let engine = Engine::build(cfg, parts);

    let shared = Arc::new(state::AppState::new(&engine, bus.clone()));
    let running = engine.start();

    state::spawn_heartbeat(bus, Duration::from_secs(1));
    state::spawn_sync_forwarder(Arc::clone(&shared), running.sync_reports.clone());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or_else(|| daemon_addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("tdk-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    running.shutdown().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("TDK_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
