use order_service::{
    build_router,
    config::{Config, StorageBackend},
    services::{MemoryStore, MongoStore, Store},
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::mongodb::{options::ClientOptions, Client};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = Config::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    order_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        backend = ?config.storage.backend,
        "Starting order service"
    );

    let store = connect_store(&config).await?;
    let state = AppState::build(config.clone(), store).await?;
    tracing::info!("Stage catalogue ready");

    let activity = state.activity.clone();
    let app = build_router(state).await?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid listen address: {}", e)))?;

    let service_span = tracing::info_span!("service", service = %config.service_name);
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    activity.flush().await;
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn connect_store(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Mongo => {
            tracing::info!("Initializing database connection");
            let options = ClientOptions::parse(config.database.url.expose_secret()).await?;
            let client = Client::with_options(options)?;
            let store = MongoStore::new(&client.database(&config.database.db_name));
            store.init_indexes().await?;
            tracing::info!(database = %config.database.db_name, "Database initialized successfully");
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
