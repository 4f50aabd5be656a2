pub mod access;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod care;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod files;
pub mod messaging;
pub mod models;
pub mod notifications;
pub mod reports;
pub mod residents;
pub mod shifts;
pub mod storage;
pub mod visits;

use std::sync::Arc;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Server(String),
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Load configuration, open the database and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // A missing .env file is normal outside development.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = Config::from_env()?;
    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::from_config(config)?);
    core.bootstrap_admin(Utc::now())?;

    let server = api::start_api_server_on(core, bind_addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, draining requests");
    server.stop().await;
    Ok(())
}
