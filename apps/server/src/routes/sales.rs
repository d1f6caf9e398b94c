//! Sales orders, RMC orders, customer payments and cheque tracking.
//!
//! A sales order is created `reserved` and moves to `completed` exactly
//! once, when its lines are deducted from their batches.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use stockyard_core::payments::PaymentInput;
use stockyard_core::rmc::{derive_materials, MaterialOverrides, MaterialQuantities, RmcOrderInput};
use stockyard_core::sales::SalesOrderInput;
use stockyard_core::validation::validate_quantity;
use stockyard_core::{
    OutstandingCheque, Page, PaymentStatus, Quantity, SalesOrder, SalesOrderDetail,
    SalesOrderPayment, SalesOrderStatus, SalesOrderSummary,
};
use stockyard_db::{ChequeFilter, SalesOrderFilter};

use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales-orders", get(list_orders).post(create_order))
        .route(
            "/sales-orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/sales-orders/{id}/complete", post(complete_order))
        .route("/sales-orders/{id}/payments", post(add_payment))
        .route(
            "/sales-orders/{id}/payments/{payment_id}",
            delete(delete_payment),
        )
        .route("/rmc-orders", post(create_rmc_order))
        .route("/rmc-orders/preview", post(preview_rmc))
        .route("/payments/{id}/received", post(mark_received))
        .route("/cheques", get(list_cheques))
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesOrderQuery {
    pub search: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<SalesOrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChequeQuery {
    pub due_on_or_before: Option<NaiveDate>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RmcPreviewRequest {
    pub volume_cu_m: Quantity,
    #[serde(default)]
    pub overrides: MaterialOverrides,
}

// =============================================================================
// Sales Orders
// =============================================================================

async fn list_orders(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SalesOrderQuery>,
) -> ApiResult<Json<Page<SalesOrderSummary>>> {
    let filter = SalesOrderFilter {
        search: search_term(query.search.as_deref())?,
        customer_id: query.customer_id,
        status: query.status,
        payment_status: query.payment_status,
    };
    let page = state
        .db
        .sales_orders()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

/// Fully resolved order for the detail view and print/export.
async fn get_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<SalesOrderDetail>> {
    Ok(Json(state.db.sales_orders().detail(&user.company_id, &id).await?))
}

async fn create_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<SalesOrderInput>,
) -> ApiResult<(StatusCode, Json<SalesOrder>)> {
    let order = state
        .db
        .sales_orders()
        .create(&user.company_id, &user.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<SalesOrderInput>,
) -> ApiResult<Json<SalesOrder>> {
    let order = state
        .db
        .sales_orders()
        .update(&user.company_id, &id, &input)
        .await?;
    Ok(Json(order))
}

async fn delete_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    state.db.sales_orders().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<SalesOrder>> {
    let order = state
        .db
        .sales_orders()
        .complete(&user.company_id, &user.user_id, &id)
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Payments
// =============================================================================

async fn add_payment(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<PaymentInput>,
) -> ApiResult<(StatusCode, Json<SalesOrderPayment>)> {
    let payment = state
        .db
        .sales_orders()
        .add_payment(&user.company_id, &id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn delete_payment(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath((id, payment_id)): AppPath<(String, String)>,
) -> ApiResult<Json<SalesOrder>> {
    user.require_admin()?;
    let order = state
        .db
        .sales_orders()
        .delete_payment(&user.company_id, &id, &payment_id)
        .await?;
    Ok(Json(order))
}

async fn mark_received(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(payment_id): AppPath<String>,
) -> ApiResult<Json<SalesOrderPayment>> {
    let payment = state
        .db
        .sales_orders()
        .mark_pdc_received(&user.company_id, &payment_id)
        .await?;
    Ok(Json(payment))
}

async fn list_cheques(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ChequeQuery>,
) -> ApiResult<Json<Page<OutstandingCheque>>> {
    let filter = ChequeFilter {
        due_on_or_before: query.due_on_or_before,
    };
    let page = state
        .db
        .sales_orders()
        .outstanding_cheques(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

// =============================================================================
// RMC
// =============================================================================

async fn create_rmc_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<RmcOrderInput>,
) -> ApiResult<(StatusCode, Json<SalesOrder>)> {
    let order = state
        .db
        .sales_orders()
        .create_rmc(&user.company_id, &user.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Material quantities the form shows while the volume is being typed.
async fn preview_rmc(
    _user: CurrentUser,
    AppJson(request): AppJson<RmcPreviewRequest>,
) -> ApiResult<Json<MaterialQuantities>> {
    validate_quantity("volume_cu_m", request.volume_cu_m)?;
    Ok(Json(derive_materials(request.volume_cu_m, &request.overrides)))
}
