use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;

use crate::config::{DatabaseConfig, StorageBackend, StorageConfig};
use crate::store::{MemoryPromotionStore, PgPromotionStore, Storage};

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Errors raised while bringing up the promotion store
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database pool error: {0}")]
    Pool(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("DATABASE_URL is required for the postgres backend")]
    MissingDatabase,
}

/// Creates a new database connection pool with the provided configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    log::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Expiry comparisons assume UTC timestamps
                sqlx::query("SET timezone = 'UTC'").execute(conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    log::info!(
        "Database connection pool established (max: {}, min: {})",
        config.max_connections,
        config.min_connections
    );

    Ok(pool)
}

/// Runs all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await?;

    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Performs a health check on the database connection
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Builds the storage handle for the configured backend
///
/// The postgres backend connects and migrates before returning.
pub async fn connect_storage(
    storage: &StorageConfig,
    database: Option<&DatabaseConfig>,
) -> Result<Storage, StartupError> {
    match storage.backend {
        StorageBackend::Postgres => {
            let database = database.ok_or(StartupError::MissingDatabase)?;
            let pool = create_pool(database).await?;
            run_migrations(&pool).await?;
            Ok(Storage::new(
                Arc::new(PgPromotionStore::new(pool)),
                storage.timeout,
            ))
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory promotion store; state is lost on restart");
            Ok(Storage::new(
                Arc::new(MemoryPromotionStore::new()),
                storage.timeout,
            ))
        }
    }
}
