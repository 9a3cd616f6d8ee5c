//! `sivana-server` — thin entrypoint that loads config, opens the
//! configured index backend, and serves the HTTP API.

use std::sync::Arc;

use sivana::{open_index, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("SIVANA_CONFIG").ok().map(std::path::PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    let index = open_index(&config)?;

    let bind = std::env::var("SIVANA_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let state = sivana::server::AppState { index, config: Arc::new(config) };
    let app = sivana::server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "sivana-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
