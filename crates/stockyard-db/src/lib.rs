//! # stockyard-db: Database Layer for Stockyard
//!
//! This crate provides database access for Stockyard.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockyard Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales-orders/{id}/complete)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockyard-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ PurchaseOrderRepo  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ SalesOrderRepo     │  │ 001_init   │  │   │
//! │  │   │               │    │ StockRepo, ...     │  │            │  │   │
//! │  │   └───────────────┘    └─────────┬──────────┘  └────────────┘  │   │
//! │  │                                  │ rules                        │   │
//! │  │                                  ▼                              │   │
//! │  │                         stockyard-core (pure)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockyard_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("stockyard.db")).await?;
//! let order = db.sales_orders().complete(&company_id, &user_id, &order_id).await?;
//! ```
//!
//! Every repository method takes the caller's `company_id` and never reads
//! or writes rows of another company.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::{AuditFilter, AuditRepository};
pub use repository::category::CategoryRepository;
pub use repository::dashboard::DashboardRepository;
pub use repository::party::PartyRepository;
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::purchase_order::{
    DeliveryOutcome, PurchaseOrderFilter, PurchaseOrderRepository,
};
pub use repository::sales_order::{ChequeFilter, SalesOrderFilter, SalesOrderRepository};
pub use repository::settings::SettingsRepository;
pub use repository::stock::{StockFilter, StockRepository};
pub use repository::user::UserRepository;
pub use repository::SearchFilter;
