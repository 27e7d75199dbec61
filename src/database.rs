use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::HandoffError;

/// Owns the connection pool backing the Handoff Store
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if needed) the database and optionally migrate it
    pub async fn new(config: &DatabaseConfig) -> Result<Self, HandoffError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        info!(url = %config.url, "Connecting to handoff database");
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.busy_timeout())
            .connect_with(options)
            .await?;

        let manager = Self { pool };
        if config.auto_migrate {
            manager.migrate().await?;
        }
        Ok(manager)
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), HandoffError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get database pool for queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

static DB_MANAGER: std::sync::LazyLock<
    std::sync::Arc<tokio::sync::RwLock<Option<DatabaseManager>>>,
> = std::sync::LazyLock::new(|| std::sync::Arc::new(tokio::sync::RwLock::new(None)));

/// Initialize the process-wide database manager from global configuration
pub async fn init_database() -> Result<()> {
    let config = crate::config::config()?;

    info!("Initializing database at {}", config.database.url);
    let manager = DatabaseManager::new(&config.database).await?;

    let mut db_guard = DB_MANAGER.write().await;
    *db_guard = Some(manager);

    info!("Database manager initialized successfully");
    Ok(())
}

/// Pool of the process-wide manager, if [`init_database`] has run
pub async fn database_pool() -> Option<SqlitePool> {
    let db_guard = DB_MANAGER.read().await;
    db_guard.as_ref().map(|manager| manager.pool().clone())
}

/// Shutdown database connections
pub async fn shutdown_database() {
    crate::observability::transition_metrics().log_stats();

    let db_guard = DB_MANAGER.read().await;
    if let Some(ref manager) = *db_guard {
        manager.shutdown().await;
    }
}
