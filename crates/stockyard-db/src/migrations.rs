//! # Database Migrations
//!
//! Embedded SQL migrations for Stockyard.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Server Startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Check _sqlx_migrations table                                          │
//! │       │                                                                 │
//! │       ├── Table doesn't exist? Create it                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Compare embedded migrations vs applied                                │
//! │       │                                                                 │
//! │       └── 001_initial_schema.sql                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Run pending migrations in order, record in _sqlx_migrations           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql` (e.g., `002_add_vehicle_table.sql`)
//! 3. Write idempotent SQL (use `IF NOT EXISTS` where possible)
//! 4. **NEVER** modify existing migrations - always add new ones

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent. Each migration runs in its own transaction, in filename
/// order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)`.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
