//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        Rule violation (CoreError)          │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────── DbError::Rule                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (in server) ← Serialized for the dashboard                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transactional flows check rules half way through a transaction, so a
//! rule violation and a store failure travel through the same type. Either
//! one drops the transaction, which rolls it back.

use stockyard_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_optional` returns no rows
    /// - ID doesn't exist, or belongs to another company
    /// - UPDATE/DELETE touched zero rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate category name within a company
    /// - Duplicate user email within a company
    /// - Duplicate PO / SO number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a product that still has batches or order lines
    /// - Deleting a batch that a sales order line is bound to
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A business rule rejected the operation.
    #[error(transparent)]
    Rule(#[from] CoreError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns the wrapped rule violation, if any.
    pub fn as_rule(&self) -> Option<&CoreError> {
        match self {
            DbError::Rule(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Rule(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>, ..."
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
