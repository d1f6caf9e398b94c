//! Categories and products.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockyard_core::input::{CategoryInput, ProductInput};
use stockyard_core::{Category, Page, Product};
use stockyard_db::{ProductFilter, SearchFilter};

use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/all", get(all_categories))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/products", get(list_products).post(create_product))
        .route("/products/all", get(all_products))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

// =============================================================================
// Categories
// =============================================================================

async fn list_categories(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<Page<Category>>> {
    let filter = SearchFilter {
        search: search_term(query.search.as_deref())?,
    };
    let page = state
        .db
        .categories()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

/// Unpaginated, for dropdowns.
async fn all_categories(
    user: CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.db.categories().all(&user.company_id).await?))
}

async fn get_category(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.db.categories().get(&user.company_id, &id).await?))
}

async fn create_category(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state.db.categories().create(&user.company_id, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<CategoryInput>,
) -> ApiResult<Json<Category>> {
    let category = state
        .db
        .categories()
        .update(&user.company_id, &id, &input)
        .await?;
    Ok(Json(category))
}

async fn delete_category(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    state.db.categories().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

async fn list_products(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> ApiResult<Json<Page<Product>>> {
    let filter = ProductFilter {
        search: search_term(query.search.as_deref())?,
        category_id: query.category_id,
    };
    let page = state
        .db
        .products()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

async fn all_products(
    user: CurrentUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().all(&user.company_id).await?))
}

async fn get_product(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().get(&user.company_id, &id).await?))
}

async fn create_product(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.db.products().create(&user.company_id, &input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    let product = state
        .db
        .products()
        .update(&user.company_id, &id, &input)
        .await?;
    Ok(Json(product))
}

async fn delete_product(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    state.db.products().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_category_and_product_crud() {
        let app = test_app().await;

        let (status, category) = app.post("/api/categories", json!({ "name": "Cement" })).await;
        assert_eq!(status, StatusCode::CREATED);
        let category_id = category["id"].as_str().unwrap().to_string();

        let (status, product) = app
            .post(
                "/api/products",
                json!({ "name": "Portland Cement", "unit": "bag", "category_id": category_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(product["category_name"], "Cement");

        let (status, page) = app.get("/api/products?search=portland&page_size=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["page_size"], 5);
        assert_eq!(page["items"][0]["name"], "Portland Cement");

        let (status, _) = app.get("/api/products/not-there").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_category_is_validation_error() {
        let app = test_app().await;
        app.post("/api/categories", json!({ "name": "Steel" })).await;

        let (status, body) = app.post("/api/categories", json!({ "name": "Steel" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let app = test_app().await;
        let (_, category) = app.post("/api/categories", json!({ "name": "Finishing" })).await;
        let uri = format!("/api/categories/{}", category["id"].as_str().unwrap());

        let (status, body) = app.send(Method::DELETE, &uri, &app.clerk_token, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = app.send(Method::DELETE, &uri, &app.admin_token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let app = test_app().await;
        let (status, body) = app.post("/api/products", json!({ "unit": "bag" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
