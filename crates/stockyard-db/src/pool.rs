//! # Database Pool Management
//!
//! One `SqlitePool` per server process, shared by every request.
//!
//! ## Writers and Readers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /api/stocks ─────► conn A ── reads (WAL snapshot, never blocked)  │
//! │                                                                         │
//! │  POST /sales-orders/{id}/complete                                      │
//! │        └──► conn B ── BEGIN IMMEDIATE ── check ── decrement ── COMMIT  │
//! │                              ▲                                          │
//! │  POST /sales-orders/{id}/complete (same batch)                          │
//! │        └──► conn C ── BEGIN IMMEDIATE ── waits (busy_timeout) ──┘      │
//! │                         then checks against B's committed stock        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order flows run as `BEGIN IMMEDIATE` transactions (see
//! `repository::begin_write`), so SQLite hands out the write lock in arrival
//! order and `busy_timeout` bounds how long a second writer queues.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::AuditRepository;
use crate::repository::category::CategoryRepository;
use crate::repository::dashboard::DashboardRepository;
use crate::repository::party::PartyRepository;
use crate::repository::product::ProductRepository;
use crate::repository::purchase_order::PurchaseOrderRepository;
use crate::repository::sales_order::SalesOrderRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::stock::StockRepository;
use crate::repository::user::UserRepository;
use stockyard_core::PartyKind;

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings. The server fills these from the `[database]` section of
/// its config file.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/stockyard/stockyard.db").max_connections(10);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Default 5.
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a writer waits for another writer's transaction to finish
    /// before failing with "database is locked".
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Private in-memory database for tests. Each connection would get its
    /// own empty database, so the pool holds exactly one.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the Stockyard database. Clones share one pool; handlers reach
/// the tables through the repository accessors, always passing the caller's
/// company id.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, applies pending migrations.
    ///
    /// Every connection runs in WAL mode with `synchronous = NORMAL`,
    /// foreign keys on and the configured `busy_timeout`.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening Stockyard database"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Database pool ready"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Schema up to date");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the stock batch repository.
    pub fn stocks(&self) -> StockRepository {
        StockRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> PartyRepository {
        PartyRepository::new(self.pool.clone(), PartyKind::Customer)
    }

    pub fn suppliers(&self) -> PartyRepository {
        PartyRepository::new(self.pool.clone(), PartyKind::Supplier)
    }

    pub fn purchase_orders(&self) -> PurchaseOrderRepository {
        PurchaseOrderRepository::new(self.pool.clone())
    }

    pub fn sales_orders(&self) -> SalesOrderRepository {
        SalesOrderRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Returns the audit log repository (read side).
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone())
    }

    pub fn dashboard(&self) -> DashboardRepository {
        DashboardRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("stockyard.db")
            .max_connections(10)
            .busy_timeout(Duration::from_secs(2))
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.busy_timeout, Duration::from_secs(2));
        assert!(!config.run_migrations);
    }
}
