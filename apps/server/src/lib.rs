//! # stockyard-server: HTTP API for Stockyard
//!
//! Wires the repositories of `stockyard-db` to JSON routes under `/api`.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CorsLayer ──► TraceLayer ──► submission_guard ──► /api route handler  │
//! │                                                        │                │
//! │                                      CurrentUser (JWT + users row)      │
//! │                                                        │                │
//! │                                     Database repositories (company)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the full application router.
///
/// `cors_origins` empty allows any origin.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .nest("/api", routes::api_router())
        .layer(from_fn_with_state(state.clone(), guard::submission_guard))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
