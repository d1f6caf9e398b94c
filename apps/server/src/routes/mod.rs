//! # Routes
//!
//! One module per group of dashboard screens. All paths live under `/api`.
//!
//! | Module | Paths |
//! |--------|-------|
//! | [`catalog`] | `/categories`, `/products` |
//! | [`stock`] | `/stocks` and batch adjustments |
//! | [`parties`] | `/customers`, `/suppliers` |
//! | [`purchasing`] | `/purchase-orders` and their payments |
//! | [`sales`] | `/sales-orders`, `/rmc-orders`, `/payments`, `/cheques` |
//! | [`admin`] | `/users`, `/settings`, `/audit-logs` |
//! | [`dashboard`] | `/dashboard` |
//!
//! List endpoints take `page` and `page_size` query parameters and answer
//! with a [`Page`](stockyard_core::Page).

use axum::extract::{FromRequest, FromRequestParts, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use stockyard_core::validation::validate_search_query;
use stockyard_core::PageRequest;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub mod admin;
pub mod catalog;
pub mod dashboard;
pub mod parties;
pub mod purchasing;
pub mod sales;
pub mod stock;

/// JSON body extractor answering malformed bodies with an [`ApiError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Query string extractor answering bad parameters with an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Path extractor answering bad segments with an [`ApiError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Normalized page request from the common query parameters.
pub(crate) fn page_request(page: Option<u32>, page_size: Option<u32>) -> PageRequest {
    PageRequest::new(page, page_size)
}

/// Trimmed search term, `None` when blank.
pub(crate) fn search_term(search: Option<&str>) -> ApiResult<Option<String>> {
    Ok(validate_search_query(search)?)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: bool,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let database = state.db.health_check().await;
    Json(Health {
        status: if database { "ok" } else { "degraded" },
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Every `/api` route.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(catalog::router())
        .merge(stock::router())
        .merge(parties::router())
        .merge(purchasing::router())
        .merge(sales::router())
        .merge(admin::router())
        .merge(dashboard::router())
}
