//! Dashboard cards.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use stockyard_core::dashboard::{Dashboard, DateRange, DEFAULT_TOP_N};

use super::AppQuery;
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Largest `top` a client may ask for.
const MAX_TOP_N: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(load_dashboard))
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// Defaults to the first day of the current month.
    pub from: Option<NaiveDate>,
    /// Defaults to today.
    pub to: Option<NaiveDate>,
    pub top: Option<usize>,
}

async fn load_dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DashboardQuery>,
) -> ApiResult<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    let from = query.from.unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let to = query.to.unwrap_or(today);
    let range = DateRange::new(from, to)?;
    let top_n = query.top.unwrap_or(DEFAULT_TOP_N).clamp(1, MAX_TOP_N);

    let dashboard = state.db.dashboard().load(&user.company_id, range, top_n).await?;
    Ok(Json(dashboard))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_empty_dashboard() {
        let app = test_app().await;
        let (status, body) = app.get("/api/dashboard?from=2026-01-01&to=2026-01-31").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sales"]["order_count"], 0);
        assert_eq!(body["stock"]["batch_count"], 0);
        assert!(body["top_customers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let app = test_app().await;
        let (status, body) = app.get("/api/dashboard?from=2026-02-01&to=2026-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
