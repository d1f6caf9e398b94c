//! # Validation Module
//!
//! Input validation utilities for Stockyard forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard form schema                                        │
//! │  └── Immediate per-field feedback                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                          │
//! │  ├── Type validation (JSON deserialization)                            │
//! │  └── THIS MODULE: field rules, run before any write                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockyard_core::validation::{validate_name, validate_quantity};
//! use stockyard_core::Quantity;
//!
//! validate_name("name", "Portland Cement").unwrap();
//! validate_quantity("quantity", Quantity::from_units(5)).unwrap();
//! ```

use crate::error::ValidationError;
use crate::quantity::{Quantity, MILLI_PER_UNIT};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_PAYMENT_CENTS, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted name (products, parties, users, categories).
pub const MAX_NAME_LEN: usize = 200;

/// Longest accepted free-text field (address, notes).
pub const MAX_TEXT_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use stockyard_core::validation::validate_name;
///
/// assert!(validate_name("name", "Washed Sand").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an optional free-text field (address, notes, bank).
pub fn validate_optional_text(field: &str, value: Option<&str>) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates an email address.
///
/// Only the shape is checked: one `@` with something on each side and a dot
/// in the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no filter)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query, or `None` when empty.
pub fn validate_search_query(query: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(query) = query.map(str::trim) else {
        return Ok(None);
    };

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    if query.is_empty() {
        Ok(None)
    } else {
        Ok(Some(query.to_string()))
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity that must be strictly positive.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  PO form: add line                                                      │
/// │                                                                         │
/// │  User enters quantity: 0                                               │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity("items[0].quantity", 0) ← THIS FUNCTION             │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "items[0].quantity must be positive"      │
/// │       │                                                                 │
/// │       ├── qty > 1000000? → Error: out of range                         │
/// │       │                                                                 │
/// │       └── OK → line accepted                                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(field: &str, qty: Quantity) -> ValidationResult<()> {
    if !qty.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_ITEM_QUANTITY.milli() / MILLI_PER_UNIT,
        });
    }

    Ok(())
}

/// Validates a price or cost in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free goods, samples)
/// - Must not exceed MAX_PRICE_CENTS
///
/// ## Example
/// ```rust
/// use stockyard_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("cost", 500).is_ok());
/// assert!(validate_price_cents("cost", 0).is_ok());
/// assert!(validate_price_cents("cost", -100).is_err());
/// assert!(validate_price_cents("cost", i64::MAX).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_PAYMENT_CENTS
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if cents > MAX_PAYMENT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_PAYMENT_CENTS,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on an order.
///
/// ## Rules
/// - At least one line
/// - At most MAX_ORDER_ITEMS (100)
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use stockyard_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
