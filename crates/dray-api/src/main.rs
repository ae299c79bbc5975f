//! `dray-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP
//! server plus the Prometheus metrics exporter.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use dray_api::config::Config;
use dray_api::server::{self, AppState};
use dray_core::observability::{init_logging, LogFormat};
use dray_store::Database;

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(choose_log_format(&config));

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;

    let db = if let Some(path) = config.db_path.as_deref() {
        tracing::info!(path, "opening SQLite database");
        Database::open(path).await?
    } else {
        if !config.debug {
            anyhow::bail!("DRAY_DB_PATH is required when DRAY_DEBUG=false");
        }
        tracing::warn!("DRAY_DB_PATH not set; using in-memory database (debug only)");
        Database::open_in_memory().await?
    }
    .with_isolation(config.db_isolation);

    let state = Arc::new(AppState::new(config, db));
    server::serve(state).await?;
    Ok(())
}
