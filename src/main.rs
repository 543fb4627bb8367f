use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_ledger::api;
use courier_ledger::config::{Config, StorageBackend};
use courier_ledger::error::AppError;
use courier_ledger::state::AppState;
use courier_ledger::storage::memory::MemoryStore;
use courier_ledger::storage::postgres::PgStore;
use courier_ledger::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store = open_store(&config.storage).await?;
    tracing::info!(storage = store.backend(), "storage ready");

    let shared_state = Arc::new(AppState::new(store, config.factors.clone()));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    tracing::info!("http server stopped");
    Ok(())
}

async fn open_store(backend: &StorageBackend) -> Result<Arc<dyn Storage>, AppError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PgStore::connect(database_url, *max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
