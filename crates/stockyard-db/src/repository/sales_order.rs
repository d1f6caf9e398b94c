//! # Sales Order Repository
//!
//! Reserved orders bind each line to a stock batch without touching it.
//! Completion deducts every batch in one transaction using a conditional
//! decrement, so two completions racing for the same batch cannot drive it
//! negative: the loser sees zero affected rows and rolls back.
//!
//! RMC orders are ordinary sales orders whose three lines are derived from a
//! concrete volume, with `rmc_volume` kept on the header.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use stockyard_core::payments::{mark_received, summarize, PaymentInput};
use stockyard_core::rmc::{plan_lines, Material, RmcOrderInput};
use stockyard_core::sales::{
    check_reservation, ensure_reserved, plan_completion, sales_order_total, SalesOrderInput,
    SalesOrderLine,
};
use stockyard_core::{
    AuditAction, CoreError, Customer, Money, OutstandingCheque, Page, PageRequest, PaymentStatus,
    PaymentType, Quantity, SalesOrder, SalesOrderDetail, SalesOrderItem, SalesOrderItemView,
    SalesOrderPayment, SalesOrderStatus, SalesOrderSummary,
};
use tracing::{debug, info, warn};

use super::audit::{record, AuditEntry};
use super::stock::{decrement, earliest_available, fetch_stock, fetch_stocks};
use super::{
    begin_write, ensure_exists, fetch_page, like_pattern, new_id, next_number,
    refresh_payment_status,
};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Sales order";
const TABLE: &str = "sales_orders";

/// Filters of the sales orders screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesOrderFilter {
    /// Matches the SO number, the customer's PO number or the customer name.
    pub search: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<SalesOrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Filters of the outstanding cheques screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChequeFilter {
    pub due_on_or_before: Option<NaiveDate>,
}

/// Header fields shared by regular and RMC orders.
struct NewOrder<'a> {
    company_id: &'a str,
    user_id: &'a str,
    customer_id: &'a str,
    so_number: Option<&'a str>,
    po_number: Option<&'a str>,
    date: NaiveDate,
    rmc_volume: Option<Quantity>,
}

#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SalesOrderRepository { pool }
    }

    pub async fn list(
        &self,
        company_id: &str,
        filter: &SalesOrderFilter,
        request: PageRequest,
    ) -> DbResult<Page<SalesOrderSummary>> {
        debug!(company_id = %company_id, ?filter, "Listing sales orders");

        let company = company_id.to_string();
        let filter = filter.clone();
        fetch_page(
            &self.pool,
            "so.*, c.name AS customer_name",
            "FROM sales_orders so JOIN customers c ON c.id = so.customer_id",
            "so.date DESC, so.created_at DESC",
            request,
            |qb| {
                qb.push(" WHERE so.company_id = ").push_bind(company.clone());
                if let Some(customer_id) = &filter.customer_id {
                    qb.push(" AND so.customer_id = ").push_bind(customer_id.clone());
                }
                if let Some(status) = filter.status {
                    qb.push(" AND so.status = ").push_bind(status);
                }
                if let Some(payment_status) = filter.payment_status {
                    qb.push(" AND so.payment_status = ").push_bind(payment_status);
                }
                if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    qb.push(" AND (so.so_number LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\' OR so.po_number LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\' OR c.name LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\')");
                }
            },
        )
        .await
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<SalesOrder> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, company_id, id).await
    }

    /// Fully resolved order for print and export.
    pub async fn detail(&self, company_id: &str, id: &str) -> DbResult<SalesOrderDetail> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order(&mut conn, company_id, id).await?;

        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(&order.customer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", &order.customer_id))?;

        let items = sqlx::query_as::<_, SalesOrderItemView>(
            "SELECT i.*, p.id AS product_id, p.name AS product_name, p.unit
             FROM sales_order_items i
             JOIN product_stocks s ON s.id = i.product_stock_id
             JOIN products p ON p.id = s.product_id
             WHERE i.sales_order_id = ?
             ORDER BY i.position ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let payments = fetch_payments(&mut conn, id).await?;
        let summary = summarize(
            order.total_amount(),
            payments.iter().map(|p| Money::from_cents(p.amount_cents)),
        );

        Ok(SalesOrderDetail {
            order,
            customer,
            items,
            payments,
            amount_paid_cents: summary.paid_cents,
            balance_cents: summary.balance_cents,
        })
    }

    /// Creates a reserved order. Each batch must hold at least what the
    /// order's lines ask of it; nothing is deducted yet.
    pub async fn create(
        &self,
        company_id: &str,
        user_id: &str,
        input: &SalesOrderInput,
    ) -> DbResult<SalesOrder> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        check_lines(&mut tx, company_id, &input.items).await?;

        let order = insert_order(
            &mut tx,
            NewOrder {
                company_id,
                user_id,
                customer_id: &input.customer_id,
                so_number: input.so_number.as_deref(),
                po_number: input.po_number.as_deref(),
                date: input.date,
                rmc_volume: None,
            },
            &input.items,
        )
        .await?;
        tx.commit().await?;

        info!(id = %order.id, so_number = %order.so_number, total = %order.total_amount(), "Sales order reserved");
        Ok(order)
    }

    /// Replaces header and lines of a reserved order.
    pub async fn update(
        &self,
        company_id: &str,
        id: &str,
        input: &SalesOrderInput,
    ) -> DbResult<SalesOrder> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let existing = fetch_order(&mut tx, company_id, id).await?;
        ensure_reserved(&existing, "edit")?;
        ensure_exists(&mut tx, "customers", "Customer", company_id, &input.customer_id).await?;
        check_lines(&mut tx, company_id, &input.items).await?;

        let so_number = input
            .so_number
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.so_number);
        let total = sales_order_total(&input.items)?;

        debug!(id = %id, so_number = %so_number, "Updating sales order");

        sqlx::query(
            "UPDATE sales_orders
             SET customer_id = ?, so_number = ?, po_number = ?, date = ?, total_amount_cents = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
        )
        .bind(&input.customer_id)
        .bind(&so_number)
        .bind(&input.po_number)
        .bind(input.date)
        .bind(total.cents())
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &so_number))?;

        sqlx::query("DELETE FROM sales_order_items WHERE sales_order_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, &input.items).await?;

        refresh_payment_status(
            &mut tx,
            TABLE,
            "sales_order_payments",
            "sales_order_id",
            id,
            total,
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, "Sales order updated");
        Ok(order)
    }

    /// Deletes a reserved order with its lines and payments.
    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, id).await?;
        ensure_reserved(&order, "delete")?;

        sqlx::query("DELETE FROM sales_orders WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, so_number = %order.so_number, "Sales order deleted");
        Ok(())
    }

    /// reserved → completed, deducting every line from its batch.
    ///
    /// ## Steps
    /// 1. Aggregate demand per batch and check it against the current
    ///    remaining quantities (no writes yet)
    /// 2. Decrement each batch with `WHERE remaining_quantity >= ?`
    /// 3. A decrement that affects no row means another order took the
    ///    stock in between; the transaction is dropped and nothing persists
    pub async fn complete(&self, company_id: &str, user_id: &str, id: &str) -> DbResult<SalesOrder> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, id).await?;
        let items = fetch_items(&mut tx, id).await?;
        let stock_ids: Vec<String> = items.iter().map(|i| i.product_stock_id.clone()).collect();
        let stocks = fetch_stocks(&mut tx, company_id, &stock_ids).await?;

        let deductions = plan_completion(&order, &items, &stocks)?;

        for deduction in &deductions {
            let applied =
                decrement(&mut tx, company_id, &deduction.product_stock_id, deduction.quantity)
                    .await?;
            if !applied {
                let current = fetch_stock(&mut tx, company_id, &deduction.product_stock_id).await?;
                warn!(
                    id = %id,
                    stock_id = %deduction.product_stock_id,
                    available = %current.remaining_quantity,
                    requested = %deduction.quantity,
                    "Stock changed during completion, rolling back"
                );
                return Err(CoreError::InsufficientStock {
                    stock_id: deduction.product_stock_id.clone(),
                    available: current.remaining_quantity,
                    requested: deduction.quantity,
                }
                .into());
            }
        }

        sqlx::query("UPDATE sales_orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(SalesOrderStatus::Completed)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        record(
            &mut tx,
            AuditEntry {
                company_id,
                user_id,
                action: AuditAction::SalesOrderCompleted,
                entity: TABLE,
                entity_id: id,
                details: Some(json!({
                    "so_number": order.so_number,
                    "deducted": deductions
                        .iter()
                        .map(|d| json!({ "stock_id": d.product_stock_id, "quantity": d.quantity }))
                        .collect::<Vec<_>>(),
                })),
            },
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, batches = deductions.len(), "Sales order completed");
        Ok(order)
    }

    /// Records a customer payment and refreshes the order's payment status.
    pub async fn add_payment(
        &self,
        company_id: &str,
        order_id: &str,
        input: &PaymentInput,
    ) -> DbResult<SalesOrderPayment> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, order_id).await?;

        let payment = SalesOrderPayment {
            id: new_id(),
            sales_order_id: order_id.to_string(),
            date: input.date,
            amount_cents: input.amount_cents,
            payment_type: input.payment_type,
            bank: input.bank.clone(),
            due_date: input.due_date,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO sales_order_payments (
                 id, sales_order_id, date, amount_cents, payment_type, bank, due_date, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&payment.id)
        .bind(&payment.sales_order_id)
        .bind(payment.date)
        .bind(payment.amount_cents)
        .bind(payment.payment_type)
        .bind(&payment.bank)
        .bind(payment.due_date)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let status = refresh_payment_status(
            &mut tx,
            TABLE,
            "sales_order_payments",
            "sales_order_id",
            order_id,
            order.total_amount(),
        )
        .await?;
        tx.commit().await?;

        info!(order_id = %order_id, amount = %Money::from_cents(payment.amount_cents), payment_type = %payment.payment_type, status = %status, "Sales order payment added");
        Ok(payment)
    }

    pub async fn delete_payment(
        &self,
        company_id: &str,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<SalesOrder> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, order_id).await?;

        let result =
            sqlx::query("DELETE FROM sales_order_payments WHERE sales_order_id = ? AND id = ?")
                .bind(order_id)
                .bind(payment_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sales order payment", payment_id));
        }

        refresh_payment_status(
            &mut tx,
            TABLE,
            "sales_order_payments",
            "sales_order_id",
            order_id,
            order.total_amount(),
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, payment_id = %payment_id, status = %order.payment_status, "Sales order payment deleted");
        Ok(order)
    }

    /// Turns a PDC into an ordinary cheque once it has cleared.
    pub async fn mark_pdc_received(
        &self,
        company_id: &str,
        payment_id: &str,
    ) -> DbResult<SalesOrderPayment> {
        let mut conn = self.pool.acquire().await?;
        let payment = fetch_payment(&mut conn, company_id, payment_id).await?;
        let payment_type = mark_received(&payment)?;

        sqlx::query("UPDATE sales_order_payments SET payment_type = ? WHERE id = ?")
            .bind(payment_type)
            .bind(payment_id)
            .execute(&mut *conn)
            .await?;

        info!(payment_id = %payment_id, "Post-dated cheque marked received");
        Ok(SalesOrderPayment {
            payment_type,
            ..payment
        })
    }

    /// PDCs not yet received, earliest due first.
    pub async fn outstanding_cheques(
        &self,
        company_id: &str,
        filter: &ChequeFilter,
        request: PageRequest,
    ) -> DbResult<Page<OutstandingCheque>> {
        let company = company_id.to_string();
        let due = filter.due_on_or_before;
        fetch_page(
            &self.pool,
            "p.*, so.so_number, c.name AS customer_name",
            "FROM sales_order_payments p
             JOIN sales_orders so ON so.id = p.sales_order_id
             JOIN customers c ON c.id = so.customer_id",
            "p.due_date ASC, p.created_at ASC",
            request,
            |qb| {
                qb.push(" WHERE so.company_id = ").push_bind(company.clone());
                qb.push(" AND p.payment_type = ").push_bind(PaymentType::Pdc);
                if let Some(due) = due {
                    qb.push(" AND p.due_date <= ").push_bind(due);
                }
            },
        )
        .await
    }

    /// Creates an RMC composite order: one reserved order with a cement,
    /// a gravel and a sand line, each drawn from the earliest batch of the
    /// configured product.
    pub async fn create_rmc(
        &self,
        company_id: &str,
        user_id: &str,
        input: &RmcOrderInput,
    ) -> DbResult<SalesOrder> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let mut batches = HashMap::new();
        for material in Material::ALL {
            let product_id = &input.source(material).product_id;
            ensure_exists(&mut tx, "products", "Product", company_id, product_id).await?;
            if let Some(batch) = earliest_available(&mut tx, company_id, product_id).await? {
                batches.insert(material, batch);
            }
        }

        let lines = plan_lines(input, &batches)?;
        debug!(volume = %input.volume_cu_m, ?lines, "RMC lines planned");

        let order = insert_order(
            &mut tx,
            NewOrder {
                company_id,
                user_id,
                customer_id: &input.customer_id,
                so_number: input.so_number.as_deref(),
                po_number: input.po_number.as_deref(),
                date: input.date,
                rmc_volume: Some(input.volume_cu_m),
            },
            &lines,
        )
        .await?;
        tx.commit().await?;

        info!(id = %order.id, so_number = %order.so_number, volume = %input.volume_cu_m, "RMC order reserved");
        Ok(order)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_order(conn: &mut SqliteConnection, company_id: &str, id: &str) -> DbResult<SalesOrder> {
    sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE company_id = ? AND id = ?")
        .bind(company_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found(ENTITY, id))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<SalesOrderItem>> {
    let items = sqlx::query_as::<_, SalesOrderItem>(
        "SELECT * FROM sales_order_items WHERE sales_order_id = ? ORDER BY position ASC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn fetch_payments(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> DbResult<Vec<SalesOrderPayment>> {
    let payments = sqlx::query_as::<_, SalesOrderPayment>(
        "SELECT * FROM sales_order_payments WHERE sales_order_id = ?
         ORDER BY date ASC, created_at ASC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

/// Payment scoped to the company through its order.
async fn fetch_payment(
    conn: &mut SqliteConnection,
    company_id: &str,
    payment_id: &str,
) -> DbResult<SalesOrderPayment> {
    sqlx::query_as::<_, SalesOrderPayment>(
        "SELECT p.* FROM sales_order_payments p
         JOIN sales_orders so ON so.id = p.sales_order_id
         WHERE so.company_id = ? AND p.id = ?",
    )
    .bind(company_id)
    .bind(payment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Sales order payment", payment_id))
}

/// Every referenced batch must exist in the company and cover the
/// aggregated quantity asked of it.
async fn check_lines(
    conn: &mut SqliteConnection,
    company_id: &str,
    lines: &[SalesOrderLine],
) -> DbResult<()> {
    let ids: Vec<String> = lines.iter().map(|l| l.product_stock_id.clone()).collect();
    let stocks = fetch_stocks(&mut *conn, company_id, &ids).await?;
    check_reservation(lines, &stocks)?;
    Ok(())
}

async fn insert_order(
    conn: &mut SqliteConnection,
    new: NewOrder<'_>,
    lines: &[SalesOrderLine],
) -> DbResult<SalesOrder> {
    ensure_exists(&mut *conn, "customers", "Customer", new.company_id, new.customer_id).await?;

    let so_number = match new.so_number {
        Some(number) => number.trim().to_string(),
        None => next_number(&mut *conn, TABLE, "so_number", "SO", new.company_id).await?,
    };

    let now = Utc::now();
    let order = SalesOrder {
        id: new_id(),
        company_id: new.company_id.to_string(),
        customer_id: new.customer_id.to_string(),
        so_number,
        po_number: new.po_number.map(str::to_string),
        date: new.date,
        status: SalesOrderStatus::Reserved,
        payment_status: PaymentStatus::Unpaid,
        total_amount_cents: sales_order_total(lines)?.cents(),
        rmc_volume: new.rmc_volume,
        created_by: new.user_id.to_string(),
        created_at: now,
        updated_at: now,
    };

    debug!(id = %order.id, so_number = %order.so_number, "Creating sales order");

    sqlx::query(
        "INSERT INTO sales_orders (
             id, company_id, customer_id, so_number, po_number, date, status, payment_status,
             total_amount_cents, rmc_volume, created_by, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id)
    .bind(&order.company_id)
    .bind(&order.customer_id)
    .bind(&order.so_number)
    .bind(&order.po_number)
    .bind(order.date)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.total_amount_cents)
    .bind(order.rmc_volume)
    .bind(&order.created_by)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| duplicate_number(e, &order.so_number))?;

    insert_items(&mut *conn, &order.id, lines).await?;
    Ok(order)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &[SalesOrderLine],
) -> DbResult<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO sales_order_items (
                 id, sales_order_id, product_stock_id, quantity, unit_price_cents,
                 discount_cents, total_cents, position
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(order_id)
        .bind(&line.product_stock_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.discount_cents)
        .bind(line.line_total().cents())
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn duplicate_number(err: sqlx::Error, number: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("so_number", number),
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use stockyard_core::rmc::{MaterialOverrides, MaterialSource};
    use stockyard_core::ProductStock;

    struct Fixture {
        db: crate::Database,
        customer_id: String,
        cement: ProductStock,
        gravel: ProductStock,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let customer = customer(&db, "Acme Builders").await;
        let cement_product = product(&db, "Portland Cement", "bag").await;
        let gravel_product = product(&db, "Crushed Gravel", "cu.m").await;
        let cement = stock(&db, &cement_product.id, 100, 500, 600, date(2026, 1, 5)).await;
        let gravel = stock(&db, &gravel_product.id, 20, 1000, 1500, date(2026, 1, 5)).await;
        Fixture {
            db,
            customer_id: customer.id,
            cement,
            gravel,
        }
    }

    fn line(stock: &ProductStock, units: i64, price: i64, discount: i64) -> SalesOrderLine {
        SalesOrderLine {
            product_stock_id: stock.id.clone(),
            quantity: Quantity::from_units(units),
            unit_price_cents: price,
            discount_cents: discount,
        }
    }

    fn input(f: &Fixture, items: Vec<SalesOrderLine>) -> SalesOrderInput {
        SalesOrderInput {
            customer_id: f.customer_id.clone(),
            so_number: None,
            po_number: Some("ACME-778".to_string()),
            date: date(2026, 3, 2),
            items,
        }
    }

    fn payment(amount_cents: i64, payment_type: PaymentType, due: Option<NaiveDate>) -> PaymentInput {
        PaymentInput {
            date: date(2026, 3, 3),
            amount_cents,
            payment_type,
            bank: Some("First Bank".to_string()),
            due_date: due,
        }
    }

    async fn remaining(db: &crate::Database, stock_id: &str) -> Quantity {
        db.stocks().get(COMPANY, stock_id).await.unwrap().remaining_quantity
    }

    #[tokio::test]
    async fn test_create_reserves_without_deducting() {
        let f = fixture().await;
        let repo = f.db.sales_orders();
        let order = repo
            .create(
                COMPANY,
                USER,
                &input(&f, vec![line(&f.cement, 10, 600, 500), line(&f.gravel, 2, 1500, 0)]),
            )
            .await
            .unwrap();

        assert_eq!(order.status, SalesOrderStatus::Reserved);
        assert_eq!(order.so_number, "SO-00001");
        assert_eq!(order.total_amount_cents, 8500);
        assert!(!order.is_rmc());
        assert_eq!(remaining(&f.db, &f.cement.id).await, Quantity::from_units(100));

        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        assert_eq!(detail.customer.name, "Acme Builders");
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_name, "Portland Cement");
        assert_eq!(detail.items[0].item.total_cents, 5500);
        assert_eq!(detail.items[1].unit, "cu.m");
    }

    #[tokio::test]
    async fn test_create_rejects_more_than_batch_holds() {
        let f = fixture().await;
        let repo = f.db.sales_orders();

        let err = repo
            .create(
                COMPANY,
                USER,
                &input(&f, vec![line(&f.gravel, 15, 1500, 0), line(&f.gravel, 6, 1500, 0)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InsufficientStock { .. })));

        let page = repo
            .list(COMPANY, &SalesOrderFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_complete_deducts_every_batch() {
        let f = fixture().await;
        let repo = f.db.sales_orders();
        let order = repo
            .create(
                COMPANY,
                USER,
                &input(
                    &f,
                    vec![
                        line(&f.cement, 30, 600, 0),
                        line(&f.cement, 20, 600, 0),
                        line(&f.gravel, 5, 1500, 0),
                    ],
                ),
            )
            .await
            .unwrap();

        let completed = repo.complete(COMPANY, USER, &order.id).await.unwrap();
        assert_eq!(completed.status, SalesOrderStatus::Completed);
        assert_eq!(remaining(&f.db, &f.cement.id).await, Quantity::from_units(50));
        assert_eq!(remaining(&f.db, &f.gravel.id).await, Quantity::from_units(15));

        let err = repo.complete(COMPANY, USER, &order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidStatus { .. })));
        assert!(repo.delete(COMPANY, &order.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_completions_on_one_batch() {
        let (db, _dir) = file_db().await;
        let customer = customer(&db, "Acme Builders").await;
        let cement = product(&db, "Portland Cement", "bag").await;

        for round in 0..10 {
            let batch = stock(&db, &cement.id, 10, 500, 600, date(2026, 1, 5)).await;
            let order_input = SalesOrderInput {
                customer_id: customer.id.clone(),
                so_number: None,
                po_number: None,
                date: date(2026, 3, 2),
                items: vec![SalesOrderLine {
                    product_stock_id: batch.id.clone(),
                    quantity: Quantity::from_units(7),
                    unit_price_cents: 600,
                    discount_cents: 0,
                }],
            };
            let first = db.sales_orders().create(COMPANY, USER, &order_input).await.unwrap();
            let second = db.sales_orders().create(COMPANY, USER, &order_input).await.unwrap();

            let tasks = [first.id, second.id].map(|id| {
                let db = db.clone();
                tokio::spawn(async move { db.sales_orders().complete(COMPANY, USER, &id).await })
            });
            let mut completed = 0;
            let mut short = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(order) => {
                        assert_eq!(order.status, SalesOrderStatus::Completed);
                        completed += 1;
                    }
                    Err(DbError::Rule(CoreError::InsufficientStock { stock_id, .. })) => {
                        assert_eq!(stock_id, batch.id);
                        short += 1;
                    }
                    Err(other) => panic!("round {}: unexpected error {:?}", round, other),
                }
            }

            assert_eq!((completed, short), (1, 1), "round {}", round);
            assert_eq!(remaining(&db, &batch.id).await, Quantity::from_units(3));
        }
    }

    #[tokio::test]
    async fn test_complete_is_all_or_nothing() {
        let f = fixture().await;
        let repo = f.db.sales_orders();

        let first = repo
            .create(COMPANY, USER, &input(&f, vec![line(&f.gravel, 15, 1500, 0)]))
            .await
            .unwrap();
        let second = repo
            .create(
                COMPANY,
                USER,
                &input(&f, vec![line(&f.cement, 40, 600, 0), line(&f.gravel, 10, 1500, 0)]),
            )
            .await
            .unwrap();

        repo.complete(COMPANY, USER, &first.id).await.unwrap();

        // Gravel now holds 5; the cement line must not be deducted either
        let err = repo.complete(COMPANY, USER, &second.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::InsufficientStock { ref stock_id, .. }) if *stock_id == f.gravel.id
        ));
        assert_eq!(remaining(&f.db, &f.cement.id).await, Quantity::from_units(100));
        assert_eq!(remaining(&f.db, &f.gravel.id).await, Quantity::from_units(5));
        assert_eq!(
            repo.get(COMPANY, &second.id).await.unwrap().status,
            SalesOrderStatus::Reserved
        );
    }

    #[tokio::test]
    async fn test_update_replaces_lines() {
        let f = fixture().await;
        let repo = f.db.sales_orders();
        let order = repo
            .create(COMPANY, USER, &input(&f, vec![line(&f.cement, 10, 600, 0)]))
            .await
            .unwrap();

        let updated = repo
            .update(
                COMPANY,
                &order.id,
                &input(&f, vec![line(&f.gravel, 2, 1500, 100), line(&f.cement, 1, 600, 0)]),
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount_cents, 3500);
        assert_eq!(updated.so_number, order.so_number);

        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].item.product_stock_id, f.gravel.id);
    }

    #[tokio::test]
    async fn test_payments_and_pdc_tracking() {
        let f = fixture().await;
        let repo = f.db.sales_orders();
        let order = repo
            .create(COMPANY, USER, &input(&f, vec![line(&f.cement, 10, 1000, 0)]))
            .await
            .unwrap();

        let cash = repo
            .add_payment(COMPANY, &order.id, &payment(4000, PaymentType::Cash, None))
            .await
            .unwrap();
        assert_eq!(repo.get(COMPANY, &order.id).await.unwrap().payment_status, PaymentStatus::Partial);

        // A PDC without a due date is rejected
        assert!(repo
            .add_payment(COMPANY, &order.id, &payment(6000, PaymentType::Pdc, None))
            .await
            .is_err());

        let pdc = repo
            .add_payment(
                COMPANY,
                &order.id,
                &payment(6000, PaymentType::Pdc, Some(date(2026, 4, 15))),
            )
            .await
            .unwrap();
        assert_eq!(repo.get(COMPANY, &order.id).await.unwrap().payment_status, PaymentStatus::Paid);

        let due_soon = ChequeFilter {
            due_on_or_before: Some(date(2026, 4, 1)),
        };
        let page = repo.outstanding_cheques(COMPANY, &due_soon, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);

        let page = repo
            .outstanding_cheques(COMPANY, &ChequeFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].customer_name, "Acme Builders");
        assert_eq!(page.items[0].so_number, order.so_number);

        let received = repo.mark_pdc_received(COMPANY, &pdc.id).await.unwrap();
        assert_eq!(received.payment_type, PaymentType::Cheque);
        assert_eq!(received.due_date, Some(date(2026, 4, 15)));
        assert_eq!(received.amount_cents, 6000);

        let err = repo.mark_pdc_received(COMPANY, &pdc.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::NotPostDated { .. })));
        assert!(matches!(
            repo.mark_pdc_received(OTHER_COMPANY, &cash.id).await,
            Err(DbError::NotFound { .. })
        ));

        let page = repo
            .outstanding_cheques(COMPANY, &ChequeFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let after = repo.delete_payment(COMPANY, &order.id, &cash.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Partial);
        let after = repo.delete_payment(COMPANY, &order.id, &pdc.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_list_search_and_status() {
        let f = fixture().await;
        let repo = f.db.sales_orders();
        let order = repo
            .create(COMPANY, USER, &input(&f, vec![line(&f.cement, 1, 600, 0)]))
            .await
            .unwrap();
        repo.create(COMPANY, USER, &input(&f, vec![line(&f.cement, 1, 600, 0)]))
            .await
            .unwrap();
        repo.complete(COMPANY, USER, &order.id).await.unwrap();

        let completed = SalesOrderFilter {
            status: Some(SalesOrderStatus::Completed),
            ..SalesOrderFilter::default()
        };
        let page = repo.list(COMPANY, &completed, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].customer_name, "Acme Builders");

        let by_po = SalesOrderFilter {
            search: Some("acme-778".to_string()),
            ..SalesOrderFilter::default()
        };
        let page = repo.list(COMPANY, &by_po, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    // -------------------------------------------------------------------------
    // RMC
    // -------------------------------------------------------------------------

    struct RmcFixture {
        db: crate::Database,
        customer_id: String,
        cement_id: String,
        gravel_id: String,
        sand_id: String,
    }

    async fn rmc_fixture() -> RmcFixture {
        let db = test_db().await;
        let customer = customer(&db, "Acme Builders").await;
        let cement = product(&db, "Portland Cement", "bag").await;
        let gravel = product(&db, "Crushed Gravel", "cu.m").await;
        let sand = product(&db, "Washed Sand", "cu.m").await;
        RmcFixture {
            db,
            customer_id: customer.id,
            cement_id: cement.id,
            gravel_id: gravel.id,
            sand_id: sand.id,
        }
    }

    fn rmc_input(f: &RmcFixture, volume: i64, overrides: MaterialOverrides) -> RmcOrderInput {
        let source = |product_id: &str| MaterialSource {
            product_id: product_id.to_string(),
            unit_price_cents: None,
        };
        RmcOrderInput {
            customer_id: f.customer_id.clone(),
            so_number: None,
            po_number: None,
            date: date(2026, 3, 4),
            volume_cu_m: Quantity::from_units(volume),
            cement: source(&f.cement_id),
            gravel: source(&f.gravel_id),
            sand: MaterialSource {
                product_id: f.sand_id.clone(),
                unit_price_cents: Some(900),
            },
            overrides,
        }
    }

    #[tokio::test]
    async fn test_rmc_uses_earliest_batches() {
        let f = rmc_fixture().await;
        let newer_cement = stock(&f.db, &f.cement_id, 500, 500, 650, date(2026, 2, 1)).await;
        let older_cement = stock(&f.db, &f.cement_id, 300, 480, 600, date(2026, 1, 10)).await;
        let gravel = stock(&f.db, &f.gravel_id, 10, 1000, 1500, date(2026, 1, 10)).await;
        let sand = stock(&f.db, &f.sand_id, 10, 700, 800, date(2026, 1, 10)).await;

        let repo = f.db.sales_orders();
        let order = repo
            .create_rmc(COMPANY, USER, &rmc_input(&f, 20, MaterialOverrides::default()))
            .await
            .unwrap();
        assert_eq!(order.rmc_volume, Some(Quantity::from_units(20)));
        assert_eq!(order.status, SalesOrderStatus::Reserved);
        // 200×6.00 + 3×15.00 + 2×9.00
        assert_eq!(order.total_amount_cents, 126_300);

        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        let stock_ids: Vec<&str> = detail
            .items
            .iter()
            .map(|i| i.item.product_stock_id.as_str())
            .collect();
        assert_eq!(stock_ids, vec![older_cement.id.as_str(), gravel.id.as_str(), sand.id.as_str()]);
        assert_ne!(stock_ids[0], newer_cement.id);
        assert_eq!(detail.items[0].item.quantity, Quantity::from_units(200));
        assert_eq!(detail.items[1].item.quantity, Quantity::from_units(3));
        assert_eq!(detail.items[2].item.quantity, Quantity::from_units(2));
    }

    #[tokio::test]
    async fn test_rmc_overrides_and_shortfall() {
        let f = rmc_fixture().await;
        stock(&f.db, &f.cement_id, 150, 500, 600, date(2026, 1, 10)).await;
        stock(&f.db, &f.gravel_id, 10, 1000, 1500, date(2026, 1, 10)).await;
        let repo = f.db.sales_orders();

        // No sand batch at all
        let err = repo
            .create_rmc(COMPANY, USER, &rmc_input(&f, 20, MaterialOverrides::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::NoStockAvailable { .. })));

        stock(&f.db, &f.sand_id, 10, 700, 800, date(2026, 1, 10)).await;

        // 200 bags exceed the single 150-bag batch
        let err = repo
            .create_rmc(COMPANY, USER, &rmc_input(&f, 20, MaterialOverrides::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InsufficientStock { .. })));

        let overrides = MaterialOverrides {
            portland_cement_bags: Some(Quantity::from_units(150)),
            ..MaterialOverrides::default()
        };
        let order = repo
            .create_rmc(COMPANY, USER, &rmc_input(&f, 20, overrides))
            .await
            .unwrap();
        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        assert_eq!(detail.items[0].item.quantity, Quantity::from_units(150));

        let page = repo
            .list(COMPANY, &SalesOrderFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }
}
