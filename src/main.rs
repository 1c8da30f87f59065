use anyhow::{Context, Result};
use axum::Router;
use blob_front::{
    config::{AppConfig, LocalStoreConfig, StorageConfig},
    routes,
    services::{
        azure::AzureBlobStore,
        backend::BlobBackend,
        local_store::{self, LocalStore},
        storage_service::StorageService,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{fs, net::TcpListener};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting blob-front with config: {:?}", cfg);

    // --- Initialize storage backend ---
    let backend: Arc<dyn BlobBackend> = match &cfg.storage {
        StorageConfig::Local(local) => {
            let pool = connect_sqlite(local).await?;
            // the schema is idempotent, so it is applied on every start
            local_store::migrate(&pool).await?;
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }
            let store = LocalStore::open(
                Arc::new(pool),
                &local.storage_dir,
                &local.container,
                local.page_size,
            )
            .await
            .with_context(|| format!("opening local container `{}`", local.container))?;
            Arc::new(store)
        }
        StorageConfig::Azure(azure) => {
            if migrate {
                anyhow::bail!("--migrate only applies to the local backend");
            }
            Arc::new(AzureBlobStore::new(azure.clone()).context("configuring azure backend")?)
        }
    };

    let storage = StorageService::new(backend);
    tracing::info!("Serving container {}", storage.describe());
    let shutdown = storage.shutdown_token();

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(storage);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Open the SQLite pool, creating the database file and its directories.
async fn connect_sqlite(cfg: &LocalStoreConfig) -> Result<sqlx::SqlitePool> {
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir).await?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?
        .create_if_missing(true);
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to {}", db_url))?;
    Ok(pool)
}

/// Resolves on Ctrl-C, cancelling in-flight listings before the server
/// drains.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
