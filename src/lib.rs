pub mod api;
pub mod appointment;
pub mod auth;
pub mod authorization;
pub mod care_records;
pub mod chat;
pub mod completion_service;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod directory;
pub mod insights;
pub mod models;
pub mod prescriptions;
pub mod reminders;

use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::ServerError;
use crate::config::{AppConfig, ConfigError};
use crate::core_state::{CoreError, CoreState};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("State initialization failed: {0}")]
    Core(#[from] CoreError),

    #[error("Cannot start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}

pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Medinest starting v{}", config::APP_VERSION);

    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Medinest failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    // The blocking HTTP client must exist before the runtime does.
    let completion = CoreState::completion_from_config(&config)?;
    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::new(config, completion)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    let result = runtime.block_on(async {
        let mut server = api::start_api_server(core.clone(), bind_addr).await?;
        tracing::info!(addr = %server.addr, "Listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {e}");
        }
        server.shutdown();
        server.stopped().await;
        Ok::<_, StartupError>(())
    });

    // Runtime goes first so the last `CoreState` reference (and its blocking
    // client) is dropped outside async context.
    drop(runtime);

    match core.flush_audit() {
        Ok(0) => {}
        Ok(n) => tracing::info!(entries = n, "Audit buffer flushed"),
        Err(e) => tracing::warn!("Audit flush failed on shutdown: {e}"),
    }
    result
}
