//! # Stock Repository
//!
//! Stock batches (lots) and the adjustments made to them outside of
//! sales orders.
//!
//! ## Where Batches Come From, Where Stock Goes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  PO delivery ─────┐                        ┌──► SO completion           │
//! │                   ▼                        │    (sales_order.rs)        │
//! │  manual entry ──► product_stocks ──────────┼──► report missing          │
//! │  (create)         remaining_quantity       │    missing += q            │
//! │                                            └──► manual removal          │
//! │                                                                         │
//! │  Every decrement is a single conditional UPDATE:                       │
//! │    ... SET remaining_quantity = remaining_quantity - q                 │
//! │        WHERE id = ? AND remaining_quantity >= q                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use stockyard_core::input::{StockAdjustmentInput, StockInput, StockPriceInput};
use stockyard_core::{
    AuditAction, CoreError, Page, PageRequest, ProductStock, ProductStockView, Quantity,
};
use tracing::{debug, info, warn};

use super::audit::{record, AuditEntry};
use super::{begin_write, ensure_exists, fetch_page, new_id, push_search};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Product stock";

/// Filters of the stocks screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockFilter {
    /// Matches the product name.
    pub search: Option<String>,
    pub product_id: Option<String>,
    /// Only batches with remaining stock.
    #[serde(default)]
    pub available_only: bool,
}

/// Repository for stock batch operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Lists batches, oldest purchase first.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &StockFilter,
        request: PageRequest,
    ) -> DbResult<Page<ProductStockView>> {
        debug!(company_id = %company_id, ?filter, "Listing stock batches");

        let company = company_id.to_string();
        let filter = filter.clone();
        fetch_page(
            &self.pool,
            "s.*, p.name AS product_name, p.unit",
            "FROM product_stocks s JOIN products p ON p.id = s.product_id",
            "s.purchase_date ASC, s.created_at ASC, s.id ASC",
            request,
            |qb| {
                qb.push(" WHERE s.company_id = ").push_bind(company.clone());
                if let Some(product_id) = &filter.product_id {
                    qb.push(" AND s.product_id = ").push_bind(product_id.clone());
                }
                if filter.available_only {
                    qb.push(" AND s.remaining_quantity > 0");
                }
                push_search(qb, "p.name", filter.search.as_deref());
            },
        )
        .await
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<ProductStock> {
        let mut conn = self.pool.acquire().await?;
        fetch_stock(&mut conn, company_id, id).await
    }

    /// Oldest batch of a product that still has stock.
    pub async fn earliest_available(
        &self,
        company_id: &str,
        product_id: &str,
    ) -> DbResult<Option<ProductStock>> {
        let mut conn = self.pool.acquire().await?;
        earliest_available(&mut conn, company_id, product_id).await
    }

    /// Manual stock entry: a batch without a purchase order.
    pub async fn create(&self, company_id: &str, input: &StockInput) -> DbResult<ProductStock> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        ensure_exists(&mut tx, "products", "Product", company_id, &input.product_id).await?;

        let stock = insert_batch(
            &mut tx,
            NewBatch {
                company_id,
                product_id: &input.product_id,
                purchase_order_id: None,
                cost_cents: input.cost_cents,
                selling_price_cents: input.selling_price_or_cost(),
                quantity: input.quantity,
                purchase_date: input
                    .purchase_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
            },
        )
        .await?;
        tx.commit().await?;

        info!(id = %stock.id, product_id = %stock.product_id, quantity = %stock.quantity, "Stock entered manually");
        Ok(stock)
    }

    /// Edits the cost and selling price of a batch.
    pub async fn update_prices(
        &self,
        company_id: &str,
        id: &str,
        input: &StockPriceInput,
    ) -> DbResult<ProductStock> {
        input.validate()?;

        debug!(id = %id, "Updating stock prices");

        let result = sqlx::query(
            "UPDATE product_stocks SET cost_cents = ?, selling_price_cents = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
        )
        .bind(input.cost_cents)
        .bind(input.selling_price_cents)
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }

        self.get(company_id, id).await
    }

    /// Deletes a batch. Fails with a foreign key violation while a sales
    /// order line is bound to it.
    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting stock batch");

        let result = sqlx::query("DELETE FROM product_stocks WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }
        Ok(())
    }

    /// Records missing or damaged stock: `missing += q`, `remaining -= q`.
    ///
    /// Missing quantities are never restored.
    pub async fn report_missing(
        &self,
        company_id: &str,
        user_id: &str,
        id: &str,
        input: &StockAdjustmentInput,
    ) -> DbResult<ProductStock> {
        self.adjust(company_id, user_id, id, input, Adjustment::Missing)
            .await
    }

    /// Takes stock out of a batch without a sale: `remaining -= q`.
    pub async fn remove(
        &self,
        company_id: &str,
        user_id: &str,
        id: &str,
        input: &StockAdjustmentInput,
    ) -> DbResult<ProductStock> {
        self.adjust(company_id, user_id, id, input, Adjustment::Removal)
            .await
    }

    async fn adjust(
        &self,
        company_id: &str,
        user_id: &str,
        id: &str,
        input: &StockAdjustmentInput,
        kind: Adjustment,
    ) -> DbResult<ProductStock> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(kind.sql())
            .bind(input.quantity)
            .bind(Utc::now())
            .bind(company_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Either the batch doesn't exist or it holds too little.
            let stock = fetch_stock(&mut tx, company_id, id).await?;
            warn!(id = %id, available = %stock.remaining_quantity, requested = %input.quantity, "Stock adjustment rejected");
            return Err(CoreError::InsufficientStock {
                stock_id: id.to_string(),
                available: stock.remaining_quantity,
                requested: input.quantity,
            }
            .into());
        }

        record(
            &mut tx,
            AuditEntry {
                company_id,
                user_id,
                action: kind.audit_action(),
                entity: "product_stocks",
                entity_id: id,
                details: Some(json!({
                    "quantity": input.quantity,
                    "reason": input.reason,
                })),
            },
        )
        .await?;

        let stock = fetch_stock(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, ?kind, quantity = %input.quantity, "Stock adjusted");
        Ok(stock)
    }
}

// =============================================================================
// Shared Helpers (used inside order transactions)
// =============================================================================

pub(crate) struct NewBatch<'a> {
    pub company_id: &'a str,
    pub product_id: &'a str,
    pub purchase_order_id: Option<&'a str>,
    pub cost_cents: i64,
    pub selling_price_cents: i64,
    pub quantity: Quantity,
    pub purchase_date: chrono::NaiveDate,
}

/// Inserts a batch with `remaining_quantity = quantity` and nothing missing.
pub(crate) async fn insert_batch(
    conn: &mut SqliteConnection,
    batch: NewBatch<'_>,
) -> DbResult<ProductStock> {
    let now = Utc::now();
    let stock = ProductStock {
        id: new_id(),
        company_id: batch.company_id.to_string(),
        product_id: batch.product_id.to_string(),
        purchase_order_id: batch.purchase_order_id.map(str::to_string),
        cost_cents: batch.cost_cents,
        selling_price_cents: batch.selling_price_cents,
        quantity: batch.quantity,
        remaining_quantity: batch.quantity,
        missing: Quantity::zero(),
        purchase_date: batch.purchase_date,
        created_at: now,
        updated_at: now,
    };

    debug!(id = %stock.id, product_id = %stock.product_id, "Inserting stock batch");

    sqlx::query(
        "INSERT INTO product_stocks (
             id, company_id, product_id, purchase_order_id, cost_cents, selling_price_cents,
             quantity, remaining_quantity, missing, purchase_date, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&stock.id)
    .bind(&stock.company_id)
    .bind(&stock.product_id)
    .bind(&stock.purchase_order_id)
    .bind(stock.cost_cents)
    .bind(stock.selling_price_cents)
    .bind(stock.quantity)
    .bind(stock.remaining_quantity)
    .bind(stock.missing)
    .bind(stock.purchase_date)
    .bind(stock.created_at)
    .bind(stock.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(stock)
}

pub(crate) async fn fetch_stock(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<ProductStock> {
    sqlx::query_as::<_, ProductStock>(
        "SELECT * FROM product_stocks WHERE company_id = ? AND id = ?",
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found(ENTITY, id))
}

/// Loads the batches with the given ids. Unknown ids are simply absent.
pub(crate) async fn fetch_stocks(
    conn: &mut SqliteConnection,
    company_id: &str,
    ids: &[String],
) -> DbResult<Vec<ProductStock>> {
    let mut stocks = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(stock) = sqlx::query_as::<_, ProductStock>(
            "SELECT * FROM product_stocks WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        {
            stocks.push(stock);
        }
    }
    Ok(stocks)
}

pub(crate) async fn earliest_available(
    conn: &mut SqliteConnection,
    company_id: &str,
    product_id: &str,
) -> DbResult<Option<ProductStock>> {
    let stock = sqlx::query_as::<_, ProductStock>(
        "SELECT * FROM product_stocks
         WHERE company_id = ? AND product_id = ? AND remaining_quantity > 0
         ORDER BY purchase_date ASC, created_at ASC, id ASC
         LIMIT 1",
    )
    .bind(company_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(stock)
}

/// Manual ways stock leaves a batch outside a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    /// Missing or damaged: counted in `missing`, never restored.
    Missing,
    Removal,
}

impl Adjustment {
    fn sql(self) -> &'static str {
        match self {
            Adjustment::Missing => {
                "UPDATE product_stocks
                 SET missing = missing + ?1, remaining_quantity = remaining_quantity - ?1, updated_at = ?2
                 WHERE company_id = ?3 AND id = ?4 AND remaining_quantity >= ?1"
            }
            Adjustment::Removal => {
                "UPDATE product_stocks
                 SET remaining_quantity = remaining_quantity - ?1, updated_at = ?2
                 WHERE company_id = ?3 AND id = ?4 AND remaining_quantity >= ?1"
            }
        }
    }

    fn audit_action(self) -> AuditAction {
        match self {
            Adjustment::Missing => AuditAction::StockReportedMissing,
            Adjustment::Removal => AuditAction::StockRemoved,
        }
    }
}

/// Conditional decrement. Returns false when the batch holds less than
/// `quantity`, leaving it untouched.
pub(crate) async fn decrement(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
    quantity: Quantity,
) -> DbResult<bool> {
    let result = sqlx::query(
        "UPDATE product_stocks
         SET remaining_quantity = remaining_quantity - ?1, updated_at = ?2
         WHERE company_id = ?3 AND id = ?4 AND remaining_quantity >= ?1",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(company_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
