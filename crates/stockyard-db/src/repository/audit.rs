//! # Audit Repository
//!
//! Append-only trail of lifecycle transitions and stock adjustments.
//! Rows are written by [`record`] on the connection of the transaction that
//! performs the change, so an audit row exists iff the change committed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use stockyard_core::{AuditAction, AuditLog, Page, PageRequest};
use tracing::debug;

use super::{fetch_page, new_id};
use crate::error::DbResult;

/// One audit row to write.
pub(crate) struct AuditEntry<'a> {
    pub company_id: &'a str,
    pub user_id: &'a str,
    pub action: AuditAction,
    pub entity: &'a str,
    pub entity_id: &'a str,
    pub details: Option<serde_json::Value>,
}

/// Writes an audit row on the given connection (normally `&mut *tx`).
pub(crate) async fn record(conn: &mut SqliteConnection, entry: AuditEntry<'_>) -> DbResult<()> {
    let id = new_id();
    debug!(id = %id, action = ?entry.action, entity_id = %entry.entity_id, "Recording audit entry");

    sqlx::query(
        "INSERT INTO audit_logs (id, company_id, user_id, action, entity, entity_id, details, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(entry.company_id)
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(entry.entity)
    .bind(entry.entity_id)
    .bind(entry.details.map(|d| d.to_string()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Filters of the audit screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Table name, e.g. `purchase_orders`.
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub user_id: Option<String>,
}

/// Read side of the audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Newest first.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &AuditFilter,
        request: PageRequest,
    ) -> DbResult<Page<AuditLog>> {
        let company = company_id.to_string();
        let filter = filter.clone();
        fetch_page(
            &self.pool,
            "*",
            "FROM audit_logs",
            "created_at DESC, id DESC",
            request,
            |qb| {
                qb.push(" WHERE company_id = ").push_bind(company.clone());
                if let Some(entity) = &filter.entity {
                    qb.push(" AND entity = ").push_bind(entity.clone());
                }
                if let Some(entity_id) = &filter.entity_id {
                    qb.push(" AND entity_id = ").push_bind(entity_id.clone());
                }
                if let Some(user_id) = &filter.user_id {
                    qb.push(" AND user_id = ").push_bind(user_id.clone());
                }
            },
        )
        .await
    }
}
