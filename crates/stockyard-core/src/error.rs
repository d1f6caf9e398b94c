//! # Error Types
//!
//! Domain-specific error types for stockyard-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockyard-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockyard-db errors (separate crate)                                  │
//! │  └── DbError          - Database failures + DbError::Rule(CoreError)   │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - What the dashboard sees (JSON + status)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule errors.
///
/// These represent requests that are well-formed but not allowed by the
/// order lifecycle or by the stock on hand.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock batch does not hold enough remaining quantity.
    ///
    /// ## When This Occurs
    /// - Sales order line asks for more than its batch holds
    /// - Completing a sales order after another order drained the batch
    /// - RMC material exceeds the earliest batch (no multi-batch split)
    /// - Reporting missing / removing more than remains
    ///
    /// ## User Workflow
    /// ```text
    /// Complete SO (cement batch B1: 40 bags left, order needs 50)
    ///      │
    ///      ▼
    /// InsufficientStock { stock_id: "B1", available: 40, requested: 50 }
    ///      │
    ///      ▼
    /// Nothing written, dashboard shows: "Only 40 left in batch"
    /// ```
    #[error("Insufficient stock in batch {stock_id}: available {available}, requested {requested}")]
    InsufficientStock {
        stock_id: String,
        available: Quantity,
        requested: Quantity,
    },

    /// An order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Editing or deleting a purchase order that left draft
    /// - Delivering a purchase order that was never approved
    /// - Completing a sales order twice
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidStatus {
        entity: String,
        id: String,
        status: String,
        action: String,
    },

    /// Orders need at least one line.
    #[error("Order must have at least one item")]
    EmptyOrder,

    /// Order has more lines than allowed.
    #[error("Order cannot have more than {max} items")]
    OrderTooLarge { max: usize },

    /// An order total does not fit in `i64` cents.
    #[error("Order total is too large")]
    AmountOverflow,

    /// A partial delivery where every clamped quantity came out zero.
    #[error("Nothing to deliver on purchase order {order_id}")]
    NothingToDeliver { order_id: String },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Only post-dated cheques can be marked as received.
    #[error("Payment {payment_id} is not a post-dated cheque")]
    NotPostDated { payment_id: String },

    /// No batch of the product has stock left.
    #[error("No stock available for product {product_id}")]
    NoStockAvailable { product_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Builds an [`CoreError::InvalidStatus`] from displayable parts.
    pub fn invalid_status(
        entity: impl Into<String>,
        id: impl Into<String>,
        status: impl std::fmt::Display,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidStatus {
            entity: entity.into(),
            id: id.into(),
            status: status.to_string(),
            action: action.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any write is issued.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., the same batch listed twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
