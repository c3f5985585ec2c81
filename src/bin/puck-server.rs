//! Hockey data API server
//!
//! Usage: `puck-server [config.yaml]`. Without an argument the path is taken
//! from `PUCK_CONFIG`; without either, defaults apply (in-memory store on
//! 127.0.0.1:8080).

use anyhow::Result;
use puck::config::AppConfig;
use puck::server::{build_router, serve};
use puck::storage::open_store;
use puck::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PUCK_CONFIG").ok());

    let config = match path.as_deref() {
        Some(path) => AppConfig::from_yaml_file(path)?,
        None => AppConfig::default(),
    };

    init_tracing(&config.logging);
    if let Some(path) = path.as_deref() {
        tracing::info!(path, "configuration loaded");
    }

    let store = open_store(&config.store).await?;
    tracing::info!(backend = config.store.backend.name(), "store ready");

    serve(build_router(store), &config.server.bind_address()).await
}
