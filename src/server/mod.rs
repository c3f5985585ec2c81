//! HTTP server exposing the resources over REST
//!
//! [`build_router`] mounts, for every resource, the collection routes
//! (list and batch writes) and the item route, plus the nested game and
//! statistics listings and a health check. [`serve`] runs the router with graceful shutdown.

pub mod rest;

use crate::core::service::ResourceService;
use crate::resources::{Arena, Game, Player, Statistic, Team};
use crate::storage::Store;
use anyhow::Result;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub teams: ResourceService<Team, dyn Store>,
    pub arenas: ResourceService<Arena, dyn Store>,
    pub games: ResourceService<Game, dyn Store>,
    pub players: ResourceService<Player, dyn Store>,
    pub statistics: ResourceService<Statistic, dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            teams: ResourceService::new(store.clone()),
            arenas: ResourceService::new(store.clone()),
            games: ResourceService::new(store.clone()),
            players: ResourceService::new(store.clone()),
            statistics: ResourceService::new(store),
        }
    }
}

/// Build the complete router over `store`
pub fn build_router(store: Arc<dyn Store>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .merge(rest::resource_routes::<Team>())
        .merge(rest::resource_routes::<Arena>())
        .merge(rest::resource_routes::<Game>())
        .merge(rest::resource_routes::<Player>())
        .merge(rest::resource_routes::<Statistic>())
        .merge(rest::game_routes::<Team>())
        .merge(rest::game_routes::<Arena>())
        .merge(rest::stats_routes())
        .with_state(AppState::new(store))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve `app` on `addr` until SIGTERM or Ctrl+C
pub async fn serve(app: Router, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "puck-data"
    }))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
