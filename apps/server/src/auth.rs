//! Bearer token authentication.
//!
//! Tokens are issued by the identity service and verified here with the
//! shared HS256 secret. Login itself happens elsewhere.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use stockyard_core::UserRole;
use stockyard_db::DbError;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Tenant the user belongs to
    pub company_id: String,

    /// Role at issue time. The stored user row wins on every request.
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies bearer tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    leeway_secs: u64,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            leeway_secs,
        }
    }

    /// Issues a token valid for `lifetime`. Used by tooling and tests.
    pub fn issue(
        &self,
        user_id: &str,
        company_id: &str,
        role: UserRole,
        lifetime: Duration,
    ) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            company_id: company_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = self.leeway_secs;

        let data: TokenData<Claims> = decode(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

        Ok(data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller, resolved against the users table.
///
/// Every handler that touches company data takes this extractor and scopes
/// its queries to `company_id`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub company_id: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            warn!(user_id = %self.user_id, "Admin action refused");
            Err(ApiError::forbidden("This action requires the admin role"))
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Expected a Bearer token"))?;

        let claims = state.jwt.verify(token)?;

        let user = match state.db.users().get(&claims.company_id, &claims.sub).await {
            Ok(user) => user,
            Err(DbError::NotFound { .. }) => {
                return Err(ApiError::unauthorized("Unknown user"));
            }
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(ApiError::unauthorized("User is deactivated"));
        }

        Ok(CurrentUser {
            user_id: user.id,
            company_id: user.company_id,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_issue_and_verify() {
        let keys = JwtKeys::new("test-secret-for-tokens", 0);
        let token = keys
            .issue("user-1", "company-1", UserRole::Admin, Duration::hours(1))
            .unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.company_id, "company-1");
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new("test-secret-for-tokens", 0);
        let token = keys
            .issue("user-1", "company-1", UserRole::User, Duration::hours(-1))
            .unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtKeys::new("test-secret-for-tokens", 0)
            .issue("user-1", "company-1", UserRole::User, Duration::hours(1))
            .unwrap();
        assert!(JwtKeys::new("another-secret-entirely", 0).verify(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_require_admin() {
        let mut user = CurrentUser {
            user_id: "u".to_string(),
            company_id: "c".to_string(),
            role: UserRole::Admin,
        };
        assert!(user.require_admin().is_ok());
        user.role = UserRole::User;
        assert_eq!(user.require_admin().unwrap_err().code, ErrorCode::Forbidden);
    }
}
