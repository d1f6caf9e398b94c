//! # API Error Type
//!
//! Unified error type for route handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ──► CoreError ──► DbError::Rule ──► ApiError ──► JSON │
//! │                                    DbError::*    ──┘                    │
//! │                                                                         │
//! │  HTTP/1.1 409 Conflict                                                  │
//! │  { "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock in batch ...: available 5, ..." }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Database internals are logged and replaced by a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use stockyard_core::{CoreError, ValidationError};
use stockyard_db::DbError;

/// Error body returned by every failing request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// A lifecycle or stock rule rejected the action (422)
    BusinessRule,

    /// A batch holds less than requested (409)
    InsufficientStock,

    /// Same Idempotency-Key already in flight (409)
    DuplicateSubmission,

    /// Missing or invalid bearer token (401)
    Unauthorized,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub const fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InsufficientStock | ErrorCode::DuplicateSubmission => StatusCode::CONFLICT,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
            }
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::BusinessRule, "Record is still referenced by other records")
            }
            DbError::Rule(rule) => ApiError::from(rule),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts rule violations to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InvalidPaymentAmount { .. }
            | CoreError::AmountOverflow
            | CoreError::Validation(_) => {
                ErrorCode::ValidationError
            }
            CoreError::InvalidStatus { .. }
            | CoreError::EmptyOrder
            | CoreError::OrderTooLarge { .. }
            | CoreError::NothingToDeliver { .. }
            | CoreError::NotPostDated { .. }
            | CoreError::NoStockAvailable { .. } => ErrorCode::BusinessRule,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockyard_core::Quantity;

    #[test]
    fn test_status_per_code() {
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::BusinessRule.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ErrorCode::InsufficientStock.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::DuplicateSubmission.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::DatabaseError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rule_errors_map_through_db_error() {
        let err = ApiError::from(DbError::Rule(CoreError::InsufficientStock {
            stock_id: "b1".to_string(),
            available: Quantity::from_units(5),
            requested: Quantity::from_units(6),
        }));
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        let err = ApiError::from(DbError::Rule(CoreError::EmptyOrder));
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let err = ApiError::from(DbError::from(ValidationError::Required {
            field: "name".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "Validation error: name is required");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = ApiError::from(DbError::QueryFailed("no such column: secret".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_serializes_screaming_code() {
        let json = serde_json::to_value(ApiError::new(ErrorCode::DuplicateSubmission, "x")).unwrap();
        assert_eq!(json["code"], "DUPLICATE_SUBMISSION");
        assert_eq!(json["message"], "x");
    }
}
