//! # Repository Module
//!
//! Database repository implementations for Stockyard.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.products().list(company_id, &filter, page)                 │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── list(&self, company_id, filter, page)  → Page<Product>            │
//! │  ├── get(&self, company_id, id)             → Product / NotFound       │
//! │  ├── create(&self, company_id, input)       → Product                  │
//! │  ├── update(&self, company_id, id, input)   → Product / NotFound       │
//! │  └── delete(&self, company_id, id)          → () / NotFound            │
//! │       │                                                                 │
//! │       │  SQL, always scoped by company_id                              │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`category::CategoryRepository`] - Category CRUD
//! - [`product::ProductRepository`] - Products with derived current quantity
//! - [`stock::StockRepository`] - Stock batches and adjustments
//! - [`party::PartyRepository`] - Customers and suppliers
//! - [`purchase_order::PurchaseOrderRepository`] - PO lifecycle and payments
//! - [`sales_order::SalesOrderRepository`] - SO lifecycle, payments, PDCs, RMC
//! - [`user::UserRepository`] - Dashboard users
//! - [`settings::SettingsRepository`] - Per-company document metadata
//! - [`audit::AuditRepository`] - Audit trail
//! - [`dashboard::DashboardRepository`] - Dashboard card queries

pub mod audit;
pub mod category;
pub mod dashboard;
pub mod party;
pub mod product;
pub mod purchase_order;
pub mod sales_order;
pub mod settings;
pub mod stock;
pub mod user;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use stockyard_core::payments::payment_status;
use stockyard_core::{Money, Page, PageRequest, PaymentStatus};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Free-text filter shared by the simple list screens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub search: Option<String>,
}

/// Opens a transaction that takes the SQLite write lock up front
/// (`BEGIN IMMEDIATE`).
///
/// Read-then-write flows must use this. A deferred transaction that read
/// first cannot upgrade to a writer once another connection committed, and
/// fails with `SQLITE_BUSY` instead of waiting. Here a second writer waits
/// on `busy_timeout` and then reads the committed state.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Fresh primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// `%term%` with LIKE wildcards escaped. Pair with `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Appends `AND <column> LIKE ? ESCAPE '\'` when a search term is present.
pub(crate) fn push_search(qb: &mut QueryBuilder<'static, Sqlite>, column: &str, search: Option<&str>) {
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(format!(" AND {} LIKE ", column))
            .push_bind(like_pattern(term))
            .push(" ESCAPE '\\'");
    }
}

/// Runs one count query and one range query over the same filters.
///
/// `from` is everything after the select list up to (not including) the
/// WHERE clause; `filters` must start the WHERE clause.
pub(crate) async fn fetch_page<T, F>(
    pool: &SqlitePool,
    columns: &str,
    from: &str,
    order_by: &str,
    request: PageRequest,
    filters: F,
) -> DbResult<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    F: Fn(&mut QueryBuilder<'static, Sqlite>),
{
    let mut count = QueryBuilder::new(format!("SELECT COUNT(*) {}", from));
    filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::new(format!("SELECT {} {}", columns, from));
    filters(&mut select);
    select.push(format!(" ORDER BY {} LIMIT ", order_by));
    select.push_bind(request.limit());
    select.push(" OFFSET ");
    select.push_bind(request.offset());

    let items = select.build_query_as::<T>().fetch_all(pool).await?;
    Ok(Page::new(items, total, request))
}

/// Fails with NotFound unless `table` holds `id` for `company_id`.
pub(crate) async fn ensure_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    company_id: &str,
    id: &str,
) -> DbResult<()> {
    let found: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE company_id = ? AND id = ?",
        table
    ))
    .bind(company_id)
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    if found == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

/// Next free `PREFIX-00001` style number for a company.
pub(crate) async fn next_number(
    conn: &mut SqliteConnection,
    table: &'static str,
    column: &'static str,
    prefix: &str,
    company_id: &str,
) -> DbResult<String> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE company_id = ?",
        table
    ))
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await?;

    let mut seq = count + 1;
    loop {
        let candidate = format!("{}-{:05}", prefix, seq);
        let taken: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE company_id = ? AND {} = ?",
            table, column
        ))
        .bind(company_id)
        .bind(&candidate)
        .fetch_one(&mut *conn)
        .await?;

        if taken == 0 {
            return Ok(candidate);
        }
        seq += 1;
    }
}

/// Recomputes an order's payment status from the payments left on it.
///
/// Runs after every payment insert or delete, in the same transaction.
pub(crate) async fn refresh_payment_status(
    conn: &mut SqliteConnection,
    orders_table: &'static str,
    payments_table: &'static str,
    order_column: &'static str,
    order_id: &str,
    total: Money,
) -> DbResult<PaymentStatus> {
    let paid: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM {} WHERE {} = ?",
        payments_table, order_column
    ))
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    let status = payment_status(total, Money::from_cents(paid));
    sqlx::query(&format!(
        "UPDATE {} SET payment_status = ?, updated_at = ? WHERE id = ?",
        orders_table
    ))
    .bind(status)
    .bind(Utc::now())
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    debug!(order_id = %order_id, paid_cents = paid, status = %status, "Payment status refreshed");
    Ok(status)
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cem"), "%cem%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
