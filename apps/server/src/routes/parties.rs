//! Customers and suppliers.
//!
//! Both screens are identical apart from the table they read, so the
//! handlers are generic over a [`PartyScope`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use stockyard_core::input::PartyInput;
use stockyard_core::{Page, Party};
use stockyard_db::{Database, PartyRepository, SearchFilter};

use super::catalog::SearchQuery;
use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Selects the party table behind a route.
pub trait PartyScope: Send + Sync + 'static {
    fn repo(db: &Database) -> PartyRepository;
}

pub struct Customers;
pub struct Suppliers;

impl PartyScope for Customers {
    fn repo(db: &Database) -> PartyRepository {
        db.customers()
    }
}

impl PartyScope for Suppliers {
    fn repo(db: &Database) -> PartyRepository {
        db.suppliers()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list::<Customers>).post(create::<Customers>))
        .route(
            "/customers/{id}",
            get(fetch::<Customers>)
                .put(update::<Customers>)
                .delete(delete::<Customers>),
        )
        .route("/suppliers", get(list::<Suppliers>).post(create::<Suppliers>))
        .route(
            "/suppliers/{id}",
            get(fetch::<Suppliers>)
                .put(update::<Suppliers>)
                .delete(delete::<Suppliers>),
        )
}

async fn list<S: PartyScope>(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<Page<Party>>> {
    let filter = SearchFilter {
        search: search_term(query.search.as_deref())?,
    };
    let page = S::repo(&state.db)
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

async fn fetch<S: PartyScope>(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<Party>> {
    Ok(Json(S::repo(&state.db).get(&user.company_id, &id).await?))
}

async fn create<S: PartyScope>(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<PartyInput>,
) -> ApiResult<(StatusCode, Json<Party>)> {
    let party = S::repo(&state.db).create(&user.company_id, &input).await?;
    Ok((StatusCode::CREATED, Json(party)))
}

async fn update<S: PartyScope>(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<PartyInput>,
) -> ApiResult<Json<Party>> {
    let party = S::repo(&state.db)
        .update(&user.company_id, &id, &input)
        .await?;
    Ok(Json(party))
}

async fn delete<S: PartyScope>(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    S::repo(&state.db).delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_customers_and_suppliers_are_separate() {
        let app = test_app().await;

        let (status, customer) = app
            .post(
                "/api/customers",
                json!({ "name": "Acme Builders", "contact_number": "0918-555-1001" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, customers) = app.get("/api/customers?search=0918").await;
        assert_eq!(customers["total"], 1);
        let (_, suppliers) = app.get("/api/suppliers").await;
        assert_eq!(suppliers["total"], 0);

        let uri = format!("/api/suppliers/{}", customer["id"].as_str().unwrap());
        let (status, _) = app.get(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
