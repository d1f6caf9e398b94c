//! Stock batches and their adjustments.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use stockyard_core::input::{StockAdjustmentInput, StockInput, StockPriceInput};
use stockyard_core::{Page, ProductStock, ProductStockView};
use stockyard_db::StockFilter;
use tracing::info;

use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stocks", get(list_stocks).post(create_stock))
        .route("/stocks/earliest", get(earliest_stock))
        .route("/stocks/{id}", get(get_stock).delete(delete_stock))
        .route("/stocks/{id}/prices", put(update_prices))
        .route("/stocks/{id}/missing", post(report_missing))
        .route("/stocks/{id}/remove", post(remove_stock))
}

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub search: Option<String>,
    pub product_id: Option<String>,
    #[serde(default)]
    pub available_only: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EarliestQuery {
    pub product_id: String,
}

async fn list_stocks(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<StockQuery>,
) -> ApiResult<Json<Page<ProductStockView>>> {
    let filter = StockFilter {
        search: search_term(query.search.as_deref())?,
        product_id: query.product_id,
        available_only: query.available_only,
    };
    let page = state
        .db
        .stocks()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

/// The batch an RMC order would draw from, or `null`.
async fn earliest_stock(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<EarliestQuery>,
) -> ApiResult<Json<Option<ProductStock>>> {
    let stock = state
        .db
        .stocks()
        .earliest_available(&user.company_id, &query.product_id)
        .await?;
    Ok(Json(stock))
}

async fn get_stock(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<ProductStock>> {
    Ok(Json(state.db.stocks().get(&user.company_id, &id).await?))
}

async fn create_stock(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<StockInput>,
) -> ApiResult<(StatusCode, Json<ProductStock>)> {
    let stock = state.db.stocks().create(&user.company_id, &input).await?;
    info!(stock_id = %stock.id, user_id = %user.user_id, "Manual stock entry");
    Ok((StatusCode::CREATED, Json(stock)))
}

async fn update_prices(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<StockPriceInput>,
) -> ApiResult<Json<ProductStock>> {
    let stock = state
        .db
        .stocks()
        .update_prices(&user.company_id, &id, &input)
        .await?;
    Ok(Json(stock))
}

async fn delete_stock(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    state.db.stocks().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn report_missing(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<StockAdjustmentInput>,
) -> ApiResult<Json<ProductStock>> {
    let stock = state
        .db
        .stocks()
        .report_missing(&user.company_id, &user.user_id, &id, &input)
        .await?;
    Ok(Json(stock))
}

async fn remove_stock(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<StockAdjustmentInput>,
) -> ApiResult<Json<ProductStock>> {
    let stock = state
        .db
        .stocks()
        .remove(&user.company_id, &user.user_id, &id, &input)
        .await?;
    Ok(Json(stock))
}
