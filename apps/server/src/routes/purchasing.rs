//! Purchase orders: drafting, approval, delivery and supplier payments.
//!
//! ```text
//! POST /purchase-orders                 draft
//! PUT  /purchase-orders/{id}            edit draft
//! POST /purchase-orders/{id}/approve    draft → approved            (admin)
//! POST /purchase-orders/{id}/deliver    approved → (partially_)delivered (admin)
//! ```

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use stockyard_core::payments::PaymentInput;
use stockyard_core::purchasing::{DeliveryRequest, PurchaseOrderInput};
use stockyard_core::{
    Page, PaymentStatus, PurchaseOrder, PurchaseOrderDetail, PurchaseOrderPayment,
    PurchaseOrderStatus, PurchaseOrderSummary,
};
use stockyard_db::{DeliveryOutcome, PurchaseOrderFilter};
use tracing::info;

use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders", get(list_orders).post(create_order))
        .route(
            "/purchase-orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/purchase-orders/{id}/approve", post(approve_order))
        .route("/purchase-orders/{id}/deliver", post(deliver_order))
        .route("/purchase-orders/{id}/payments", post(add_payment))
        .route(
            "/purchase-orders/{id}/payments/{payment_id}",
            delete(delete_payment),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseOrderQuery {
    pub search: Option<String>,
    pub supplier_id: Option<String>,
    pub status: Option<PurchaseOrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn list_orders(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PurchaseOrderQuery>,
) -> ApiResult<Json<Page<PurchaseOrderSummary>>> {
    let filter = PurchaseOrderFilter {
        search: search_term(query.search.as_deref())?,
        supplier_id: query.supplier_id,
        status: query.status,
        payment_status: query.payment_status,
    };
    let page = state
        .db
        .purchase_orders()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

/// Fully resolved order for the detail view and print/export.
async fn get_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<PurchaseOrderDetail>> {
    Ok(Json(state.db.purchase_orders().detail(&user.company_id, &id).await?))
}

async fn create_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<PurchaseOrderInput>,
) -> ApiResult<(StatusCode, Json<PurchaseOrder>)> {
    let order = state
        .db
        .purchase_orders()
        .create(&user.company_id, &user.user_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn update_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<PurchaseOrderInput>,
) -> ApiResult<Json<PurchaseOrder>> {
    let order = state
        .db
        .purchase_orders()
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
    state.db.purchase_orders().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<PurchaseOrder>> {
    user.require_admin()?;
    let order = state
        .db
        .purchase_orders()
        .approve(&user.company_id, &user.user_id, &id)
        .await?;
    Ok(Json(order))
}

/// An empty body delivers everything outstanding.
async fn deliver_order(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    body: Bytes,
) -> ApiResult<Json<DeliveryOutcome>> {
    user.require_admin()?;
    let request: DeliveryRequest = if body.is_empty() {
        DeliveryRequest::full()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid delivery request: {}", e)))?
    };

    let outcome = state
        .db
        .purchase_orders()
        .deliver(&user.company_id, &user.user_id, &id, &request)
        .await?;
    info!(
        order_id = %id,
        status = %outcome.order.status,
        batches = outcome.stocks.len(),
        "Delivery received"
    );
    Ok(Json(outcome))
}

async fn add_payment(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<PaymentInput>,
) -> ApiResult<(StatusCode, Json<PurchaseOrderPayment>)> {
    let payment = state
        .db
        .purchase_orders()
        .add_payment(&user.company_id, &id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn delete_payment(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath((id, payment_id)): AppPath<(String, String)>,
) -> ApiResult<Json<PurchaseOrder>> {
    user.require_admin()?;
    let order = state
        .db
        .purchase_orders()
        .delete_payment(&user.company_id, &id, &payment_id)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    async fn draft(app: &TestApp) -> (String, String) {
        let (_, supplier) = app
            .post("/api/suppliers", json!({ "name": "North Quarry" }))
            .await;
        let (_, product) = app
            .post("/api/products", json!({ "name": "Crushed Gravel", "unit": "cu.m" }))
            .await;
        let product_id = product["id"].as_str().unwrap().to_string();

        let (status, order) = app
            .post(
                "/api/purchase-orders",
                json!({
                    "supplier_id": supplier["id"],
                    "date": "2026-03-02",
                    "items": [
                        { "product_id": product_id, "quantity": 10, "cost_cents": 500 },
                        { "product_id": product_id, "quantity": 4, "cost_cents": 250 }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (order["id"].as_str().unwrap().to_string(), product_id)
    }

    #[tokio::test]
    async fn test_oversized_line_rejected() {
        let app = test_app().await;
        let (_, supplier) = app
            .post("/api/suppliers", json!({ "name": "North Quarry" }))
            .await;
        let (_, product) = app
            .post("/api/products", json!({ "name": "Crushed Gravel", "unit": "cu.m" }))
            .await;

        let (status, body) = app
            .post(
                "/api/purchase-orders",
                json!({
                    "supplier_id": supplier["id"],
                    "date": "2026-03-02",
                    "items": [
                        { "product_id": product["id"], "quantity": 1000, "cost_cents": 10_000_000_000_000_000_i64 }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (_, page) = app.get("/api/purchase-orders").await;
        assert_eq!(page["total"], 0);
    }

    #[tokio::test]
    async fn test_draft_approve_deliver() {
        let app = test_app().await;
        let (order_id, product_id) = draft(&app).await;

        let (_, detail) = app.get(&format!("/api/purchase-orders/{}", order_id)).await;
        assert_eq!(detail["total_amount_cents"], 6000);
        assert_eq!(detail["po_number"], "PO-00001");
        assert_eq!(detail["supplier"]["name"], "North Quarry");
        assert_eq!(detail["items"][0]["product_name"], "Crushed Gravel");

        // Clerks cannot approve
        let uri = format!("/api/purchase-orders/{}/approve", order_id);
        let (status, _) = app.send(Method::POST, &uri, &app.clerk_token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, order) = app.send(Method::POST, &uri, &app.admin_token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "approved");

        let (status, outcome) = app
            .send(
                Method::POST,
                &format!("/api/purchase-orders/{}/deliver", order_id),
                &app.admin_token,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["order"]["status"], "delivered");
        assert_eq!(outcome["stocks"].as_array().unwrap().len(), 2);

        let (_, product) = app.get(&format!("/api/products/{}", product_id)).await;
        assert_eq!(product["current_quantity"], 14.0);

        let (_, audit) = app.get("/api/audit-logs?entity=purchase_orders").await;
        assert_eq!(audit["total"], 2);
    }

    #[tokio::test]
    async fn test_deliver_draft_is_business_rule() {
        let app = test_app().await;
        let (order_id, _) = draft(&app).await;

        let (status, body) = app
            .post(
                &format!("/api/purchase-orders/{}/deliver", order_id),
                json!({ "partial": false }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "BUSINESS_RULE");
    }

    #[tokio::test]
    async fn test_payments() {
        let app = test_app().await;
        let (order_id, _) = draft(&app).await;
        let uri = format!("/api/purchase-orders/{}/payments", order_id);

        let (status, payment) = app
            .post(
                &uri,
                json!({ "date": "2026-03-05", "amount_cents": 2000, "payment_type": "cash" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, page) = app.get("/api/purchase-orders?payment_status=partial").await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["supplier_name"], "North Quarry");

        let (status, body) = app
            .post(
                &uri,
                json!({
                    "date": "2026-03-05",
                    "amount_cents": 2000,
                    "payment_type": "pdc",
                    "due_date": "2026-04-01"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, order) = app
            .send(
                Method::DELETE,
                &format!("{}/{}", uri, payment["id"].as_str().unwrap()),
                &app.admin_token,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["payment_status"], Value::from("unpaid"));
    }
}
