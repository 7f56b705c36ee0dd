pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
pub mod services;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cache::CacheClient;
use cli::{Cli, Command};
use config::AppConfig;
use db::repos::users::SqliteUserRepository;
use error::AppError;
use services::UserService;

/// Shared application state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub cache: CacheClient,
}

/// Explicit startup sequence: config, logging, schema reconciliation, then
/// serving. Nothing is served unless reconciliation succeeded.
///
/// Errors raised once logging is up are logged before the log writer is
/// flushed and dropped.
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let command = cli.command();
    if command == Command::Version {
        return Ok(());
    }

    let (config, config_source) = AppConfig::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&config.log)?;

    let result = start(command, config, config_source).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Startup failed");
    }
    result
}

async fn start(
    command: Command,
    config: AppConfig,
    config_source: Option<PathBuf>,
) -> Result<(), AppError> {
    tracing::info!(
        environment = %config.environment,
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    match &config_source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded config file"),
        None => tracing::warn!("No config file found, using defaults and environment"),
    }

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    // rusqlite is blocking; keep the runtime threads free while DDL runs.
    let db_config = config.database.clone();
    let cancel = shutdown.clone();
    let pool = tokio::task::spawn_blocking(move || db::init_db(&db_config, &cancel))
        .await
        .map_err(|e| AppError::Internal(format!("database init task failed: {e}")))??;

    if command == Command::Migrate {
        tracing::info!("Schema reconciled, exiting");
        return Ok(());
    }

    let state = AppState {
        users: UserService::new(Arc::new(SqliteUserRepository::new(pool))),
        cache: CacheClient::new(&config.cache),
    };

    http::serve(state, &config.http, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Signal received, shutting down");
        token.cancel();
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
