//! Users, company settings and the audit trail.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockyard_core::input::{SettingsInput, UserInput};
use stockyard_core::{AuditLog, Page, Settings, User};
use stockyard_db::{AuditFilter, SearchFilter};
use tracing::info;

use super::catalog::SearchQuery;
use super::{page_request, search_term, AppJson, AppPath, AppQuery};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/settings", get(get_settings).put(save_settings))
        .route("/audit-logs", get(list_audit_logs))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn me(user: CurrentUser, State(state): State<AppState>) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users().get(&user.company_id, &user.user_id).await?))
}

// =============================================================================
// Users (admin only)
// =============================================================================

async fn list_users(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<Page<User>>> {
    user.require_admin()?;
    let filter = SearchFilter {
        search: search_term(query.search.as_deref())?,
    };
    let page = state
        .db
        .users()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}

async fn get_user(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<Json<User>> {
    user.require_admin()?;
    Ok(Json(state.db.users().get(&user.company_id, &id).await?))
}

async fn create_user(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<UserInput>,
) -> ApiResult<(StatusCode, Json<User>)> {
    user.require_admin()?;
    let created = state.db.users().create(&user.company_id, &input).await?;
    info!(user_id = %created.id, by = %user.user_id, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(input): AppJson<UserInput>,
) -> ApiResult<Json<User>> {
    user.require_admin()?;
    if id == user.user_id && (!input.role.is_admin() || !input.is_active) {
        return Err(ApiError::validation(
            "Admins cannot demote or deactivate themselves",
        ));
    }
    Ok(Json(state.db.users().update(&user.company_id, &id, &input).await?))
}

async fn delete_user(
    user: CurrentUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    if id == user.user_id {
        return Err(ApiError::validation("Admins cannot delete themselves"));
    }
    state.db.users().delete(&user.company_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Settings
// =============================================================================

async fn get_settings(user: CurrentUser, State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.db.settings().get(&user.company_id).await?))
}

async fn save_settings(
    user: CurrentUser,
    State(state): State<AppState>,
    AppJson(input): AppJson<SettingsInput>,
) -> ApiResult<Json<Settings>> {
    user.require_admin()?;
    Ok(Json(state.db.settings().save(&user.company_id, &input).await?))
}

// =============================================================================
// Audit
// =============================================================================

async fn list_audit_logs(
    user: CurrentUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AuditQuery>,
) -> ApiResult<Json<Page<AuditLog>>> {
    let filter = AuditFilter {
        entity: query.entity,
        entity_id: query.entity_id,
        user_id: query.user_id,
    };
    let page = state
        .db
        .audit()
        .list(&user.company_id, &filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(page))
}
