//! # Purchase Order Repository
//!
//! Applies the purchase order rules of `stockyard_core::purchasing` to the
//! database. Every multi-statement operation runs in one transaction.
//!
//! ## Transactions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create     BEGIN → header → items → COMMIT                            │
//! │  update     BEGIN → gate(draft) → header → DELETE items → items        │
//! │             → payment status → COMMIT                                  │
//! │  approve    BEGIN → gate(draft) → status → audit → COMMIT              │
//! │  deliver    BEGIN → plan_delivery → items → batches → status           │
//! │             → audit → COMMIT                                           │
//! │  payments   BEGIN → insert/delete → payment status → COMMIT            │
//! │                                                                         │
//! │  Any error (rule or SQL) drops the transaction: nothing is written.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use stockyard_core::payments::{summarize, PaymentInput};
use stockyard_core::purchasing::{
    ensure_can_approve, ensure_editable, plan_delivery, DeliveryRequest, PurchaseOrderInput,
    PurchaseOrderLine,
};
use stockyard_core::{
    AuditAction, Money, Page, PageRequest, PaymentStatus, ProductStock, PurchaseOrder,
    PurchaseOrderDetail, PurchaseOrderItem, PurchaseOrderItemView, PurchaseOrderPayment,
    PurchaseOrderStatus, PurchaseOrderSummary, Supplier,
};
use tracing::{debug, info};

use super::audit::{record, AuditEntry};
use super::stock::{insert_batch, NewBatch};
use super::{
    begin_write, ensure_exists, fetch_page, like_pattern, new_id, next_number,
    refresh_payment_status,
};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Purchase order";
const TABLE: &str = "purchase_orders";

/// Filters of the purchase orders screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseOrderFilter {
    /// Matches the PO number or the supplier name.
    pub search: Option<String>,
    pub supplier_id: Option<String>,
    pub status: Option<PurchaseOrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Result of a delivery: the updated order and the batches it created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub order: PurchaseOrder,
    pub stocks: Vec<ProductStock>,
}

#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    /// Lists orders, newest first, with the supplier name resolved.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &PurchaseOrderFilter,
        request: PageRequest,
    ) -> DbResult<Page<PurchaseOrderSummary>> {
        debug!(company_id = %company_id, ?filter, "Listing purchase orders");

        let company = company_id.to_string();
        let filter = filter.clone();
        fetch_page(
            &self.pool,
            "po.*, s.name AS supplier_name",
            "FROM purchase_orders po JOIN suppliers s ON s.id = po.supplier_id",
            "po.date DESC, po.created_at DESC",
            request,
            |qb| {
                qb.push(" WHERE po.company_id = ").push_bind(company.clone());
                if let Some(supplier_id) = &filter.supplier_id {
                    qb.push(" AND po.supplier_id = ").push_bind(supplier_id.clone());
                }
                if let Some(status) = filter.status {
                    qb.push(" AND po.status = ").push_bind(status);
                }
                if let Some(payment_status) = filter.payment_status {
                    qb.push(" AND po.payment_status = ").push_bind(payment_status);
                }
                if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    qb.push(" AND (po.po_number LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\' OR s.name LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\')");
                }
            },
        )
        .await
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<PurchaseOrder> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, company_id, id).await
    }

    /// Fully resolved order: supplier, items with product names, payments
    /// and balance. This is what print and export receive.
    pub async fn detail(&self, company_id: &str, id: &str) -> DbResult<PurchaseOrderDetail> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order(&mut conn, company_id, id).await?;

        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE company_id = ? AND id = ?",
        )
        .bind(company_id)
        .bind(&order.supplier_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Supplier", &order.supplier_id))?;

        let items = sqlx::query_as::<_, PurchaseOrderItemView>(
            "SELECT i.*, p.name AS product_name, p.unit
             FROM purchase_order_items i JOIN products p ON p.id = i.product_id
             WHERE i.purchase_order_id = ?
             ORDER BY i.position ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let payments = sqlx::query_as::<_, PurchaseOrderPayment>(
            "SELECT * FROM purchase_order_payments WHERE purchase_order_id = ?
             ORDER BY date ASC, created_at ASC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let summary = summarize(
            order.total_amount(),
            payments.iter().map(|p| Money::from_cents(p.amount_cents)),
        );

        Ok(PurchaseOrderDetail {
            order,
            supplier,
            items,
            payments,
            amount_paid_cents: summary.paid_cents,
            balance_cents: summary.balance_cents,
        })
    }

    /// Creates a draft. Each item starts with `to_deliver = quantity`.
    pub async fn create(
        &self,
        company_id: &str,
        user_id: &str,
        input: &PurchaseOrderInput,
    ) -> DbResult<PurchaseOrder> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        ensure_exists(&mut tx, "suppliers", "Supplier", company_id, &input.supplier_id).await?;
        check_products(&mut tx, company_id, &input.items).await?;

        let po_number = match input.po_number.as_deref() {
            Some(number) => number.trim().to_string(),
            None => next_number(&mut tx, TABLE, "po_number", "PO", company_id).await?,
        };

        let now = Utc::now();
        let order = PurchaseOrder {
            id: new_id(),
            company_id: company_id.to_string(),
            supplier_id: input.supplier_id.clone(),
            po_number,
            date: input.date,
            status: PurchaseOrderStatus::Draft,
            payment_status: PaymentStatus::Unpaid,
            total_amount_cents: input.total()?.cents(),
            notes: input.notes.clone(),
            created_by: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %order.id, po_number = %order.po_number, "Creating purchase order");

        sqlx::query(
            "INSERT INTO purchase_orders (
                 id, company_id, supplier_id, po_number, date, status, payment_status,
                 total_amount_cents, notes, created_by, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.company_id)
        .bind(&order.supplier_id)
        .bind(&order.po_number)
        .bind(order.date)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.total_amount_cents)
        .bind(&order.notes)
        .bind(&order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &order.po_number))?;

        insert_items(&mut tx, &order.id, &input.items).await?;
        tx.commit().await?;

        info!(id = %order.id, po_number = %order.po_number, total = %order.total_amount(), "Purchase order created");
        Ok(order)
    }

    /// Replaces header and items of a draft.
    pub async fn update(
        &self,
        company_id: &str,
        id: &str,
        input: &PurchaseOrderInput,
    ) -> DbResult<PurchaseOrder> {
        input.validate()?;

        let mut tx = begin_write(&self.pool).await?;
        let existing = fetch_order(&mut tx, company_id, id).await?;
        ensure_editable(&existing, "edit")?;
        ensure_exists(&mut tx, "suppliers", "Supplier", company_id, &input.supplier_id).await?;
        check_products(&mut tx, company_id, &input.items).await?;

        let po_number = input
            .po_number
            .as_deref()
            .map(|n| n.trim().to_string())
            .unwrap_or(existing.po_number);
        let total = input.total()?;

        debug!(id = %id, po_number = %po_number, "Updating purchase order");

        sqlx::query(
            "UPDATE purchase_orders
             SET supplier_id = ?, po_number = ?, date = ?, notes = ?, total_amount_cents = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
        )
        .bind(&input.supplier_id)
        .bind(&po_number)
        .bind(input.date)
        .bind(&input.notes)
        .bind(total.cents())
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &po_number))?;

        sqlx::query("DELETE FROM purchase_order_items WHERE purchase_order_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, &input.items).await?;

        refresh_payment_status(
            &mut tx,
            TABLE,
            "purchase_order_payments",
            "purchase_order_id",
            id,
            total,
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, "Purchase order updated");
        Ok(order)
    }

    /// Deletes a draft with its items and payments.
    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, id).await?;
        ensure_editable(&order, "delete")?;

        sqlx::query("DELETE FROM purchase_orders WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, po_number = %order.po_number, "Purchase order deleted");
        Ok(())
    }

    /// draft → approved.
    pub async fn approve(&self, company_id: &str, user_id: &str, id: &str) -> DbResult<PurchaseOrder> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, id).await?;
        ensure_can_approve(&order)?;

        set_status(&mut tx, id, PurchaseOrderStatus::Approved).await?;
        record(
            &mut tx,
            AuditEntry {
                company_id,
                user_id,
                action: AuditAction::PurchaseOrderApproved,
                entity: TABLE,
                entity_id: id,
                details: Some(json!({ "po_number": order.po_number })),
            },
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, user_id = %user_id, "Purchase order approved");
        Ok(order)
    }

    /// Receives goods: updates item counters, creates one batch per item
    /// that received something, and moves the order to `delivered` or
    /// `partially_delivered`.
    pub async fn deliver(
        &self,
        company_id: &str,
        user_id: &str,
        id: &str,
        request: &DeliveryRequest,
    ) -> DbResult<DeliveryOutcome> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, id).await?;
        let items = fetch_items(&mut tx, id).await?;
        let plan = plan_delivery(&order, &items, request)?;

        let today = Utc::now().date_naive();
        let mut stocks = Vec::new();
        for receipt in plan.receipts() {
            sqlx::query(
                "UPDATE purchase_order_items SET delivered = ?, to_deliver = ?
                 WHERE purchase_order_id = ? AND id = ?",
            )
            .bind(receipt.delivered)
            .bind(receipt.to_deliver)
            .bind(id)
            .bind(&receipt.item_id)
            .execute(&mut *tx)
            .await?;

            let stock = insert_batch(
                &mut tx,
                NewBatch {
                    company_id,
                    product_id: &receipt.product_id,
                    purchase_order_id: Some(id),
                    cost_cents: receipt.cost_cents,
                    selling_price_cents: receipt.selling_price_cents,
                    quantity: receipt.received,
                    purchase_date: today,
                },
            )
            .await?;
            stocks.push(stock);
        }

        set_status(&mut tx, id, plan.status).await?;
        record(
            &mut tx,
            AuditEntry {
                company_id,
                user_id,
                action: plan.audit_action(),
                entity: TABLE,
                entity_id: id,
                details: Some(json!({
                    "partial": request.partial,
                    "received": plan
                        .receipts()
                        .map(|r| json!({ "item_id": r.item_id, "quantity": r.received }))
                        .collect::<Vec<_>>(),
                })),
            },
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, id).await?;
        tx.commit().await?;

        info!(id = %id, status = %order.status, batches = stocks.len(), "Purchase order delivery recorded");
        Ok(DeliveryOutcome { order, stocks })
    }

    /// Records a supplier payment and refreshes the order's payment status.
    pub async fn add_payment(
        &self,
        company_id: &str,
        order_id: &str,
        input: &PaymentInput,
    ) -> DbResult<PurchaseOrderPayment> {
        input.validate_for_purchase()?;

        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, order_id).await?;

        let payment = PurchaseOrderPayment {
            id: new_id(),
            purchase_order_id: order_id.to_string(),
            date: input.date,
            amount_cents: input.amount_cents,
            payment_type: input.payment_type,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO purchase_order_payments (id, purchase_order_id, date, amount_cents, payment_type, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&payment.id)
        .bind(&payment.purchase_order_id)
        .bind(payment.date)
        .bind(payment.amount_cents)
        .bind(payment.payment_type)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let status = refresh_payment_status(
            &mut tx,
            TABLE,
            "purchase_order_payments",
            "purchase_order_id",
            order_id,
            order.total_amount(),
        )
        .await?;
        tx.commit().await?;

        info!(order_id = %order_id, amount = %Money::from_cents(payment.amount_cents), status = %status, "Purchase order payment added");
        Ok(payment)
    }

    /// Deletes a payment and recomputes the status from what remains.
    pub async fn delete_payment(
        &self,
        company_id: &str,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<PurchaseOrder> {
        let mut tx = begin_write(&self.pool).await?;
        let order = fetch_order(&mut tx, company_id, order_id).await?;

        let result = sqlx::query(
            "DELETE FROM purchase_order_payments WHERE purchase_order_id = ? AND id = ?",
        )
        .bind(order_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase order payment", payment_id));
        }

        refresh_payment_status(
            &mut tx,
            TABLE,
            "purchase_order_payments",
            "purchase_order_id",
            order_id,
            order.total_amount(),
        )
        .await?;

        let order = fetch_order(&mut tx, company_id, order_id).await?;
        tx.commit().await?;

        info!(order_id = %order_id, payment_id = %payment_id, status = %order.payment_status, "Purchase order payment deleted");
        Ok(order)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn fetch_order(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<PurchaseOrder> {
    sqlx::query_as::<_, PurchaseOrder>(
        "SELECT * FROM purchase_orders WHERE company_id = ? AND id = ?",
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found(ENTITY, id))
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
    let items = sqlx::query_as::<_, PurchaseOrderItem>(
        "SELECT * FROM purchase_order_items WHERE purchase_order_id = ? ORDER BY position ASC",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &[PurchaseOrderLine],
) -> DbResult<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO purchase_order_items (
                 id, purchase_order_id, product_id, quantity, cost_cents, delivered, to_deliver, position
             ) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(new_id())
        .bind(order_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.cost_cents)
        .bind(line.quantity)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn check_products(
    conn: &mut SqliteConnection,
    company_id: &str,
    lines: &[PurchaseOrderLine],
) -> DbResult<()> {
    for line in lines {
        ensure_exists(&mut *conn, "products", "Product", company_id, &line.product_id).await?;
    }
    Ok(())
}

async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: PurchaseOrderStatus,
) -> DbResult<()> {
    sqlx::query("UPDATE purchase_orders SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn duplicate_number(err: sqlx::Error, number: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("po_number", number),
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::audit::AuditFilter;
    use crate::repository::test_support::*;
    use stockyard_core::purchasing::DeliveryLine;
    use stockyard_core::{CoreError, PaymentType, Quantity};

    struct Fixture {
        db: crate::Database,
        supplier_id: String,
        cement_id: String,
        sand_id: String,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let supplier = supplier(&db, "North Quarry").await;
        let cement = product(&db, "Portland Cement", "bag").await;
        let sand = product(&db, "Washed Sand", "cu.m").await;
        Fixture {
            db,
            supplier_id: supplier.id,
            cement_id: cement.id,
            sand_id: sand.id,
        }
    }

    fn input(f: &Fixture) -> PurchaseOrderInput {
        PurchaseOrderInput {
            supplier_id: f.supplier_id.clone(),
            po_number: None,
            date: date(2026, 3, 1),
            notes: Some("deliver to yard 2".to_string()),
            items: vec![
                PurchaseOrderLine {
                    product_id: f.cement_id.clone(),
                    quantity: Quantity::from_units(10),
                    cost_cents: 500,
                },
                PurchaseOrderLine {
                    product_id: f.sand_id.clone(),
                    quantity: Quantity::from_units(4),
                    cost_cents: 250,
                },
            ],
        }
    }

    fn payment(amount_cents: i64, payment_type: PaymentType) -> PaymentInput {
        PaymentInput {
            date: date(2026, 3, 2),
            amount_cents,
            payment_type,
            bank: None,
            due_date: None,
        }
    }

    async fn approved(f: &Fixture) -> PurchaseOrder {
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(f)).await.unwrap();
        repo.approve(COMPANY, USER, &order.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_draft_with_total_and_number() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();

        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
        assert_eq!(order.total_amount_cents, 6000);
        assert_eq!(order.po_number, "PO-00001");
        assert_eq!(order.created_by, USER);

        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        assert_eq!(detail.supplier.name, "North Quarry");
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_name, "Portland Cement");
        for item in &detail.items {
            assert_eq!(item.item.to_deliver, item.item.quantity);
            assert_eq!(item.item.delivered, Quantity::zero());
        }
        assert_eq!(detail.balance_cents, 6000);

        let second = repo.create(COMPANY, USER, &input(&f)).await.unwrap();
        assert_eq!(second.po_number, "PO-00002");
    }

    #[tokio::test]
    async fn test_update_replaces_items_on_drafts_only() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        let mut change = input(&f);
        change.items.truncate(1);
        change.items[0].quantity = Quantity::from_units(20);
        let updated = repo.update(COMPANY, &order.id, &change).await.unwrap();
        assert_eq!(updated.total_amount_cents, 10_000);
        assert_eq!(updated.po_number, "PO-00001");
        assert_eq!(repo.detail(COMPANY, &order.id).await.unwrap().items.len(), 1);

        repo.approve(COMPANY, USER, &order.id).await.unwrap();
        let err = repo.update(COMPANY, &order.id, &change).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidStatus { .. })));
        let err = repo.delete(COMPANY, &order.id).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_delete_draft() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        repo.delete(COMPANY, &order.id).await.unwrap();
        assert!(matches!(
            repo.get(COMPANY, &order.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cannot_deliver_draft() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        let err = repo
            .deliver(COMPANY, USER, &order.id, &DeliveryRequest::full())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_full_delivery_creates_one_batch_per_item() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = approved(&f).await;

        let outcome = repo
            .deliver(COMPANY, USER, &order.id, &DeliveryRequest::full())
            .await
            .unwrap();
        assert_eq!(outcome.order.status, PurchaseOrderStatus::Delivered);
        assert_eq!(outcome.stocks.len(), 2);

        let cement_batch = outcome
            .stocks
            .iter()
            .find(|s| s.product_id == f.cement_id)
            .unwrap();
        assert_eq!(cement_batch.quantity, Quantity::from_units(10));
        assert_eq!(cement_batch.remaining_quantity, Quantity::from_units(10));
        assert_eq!(cement_batch.cost_cents, 500);
        assert_eq!(cement_batch.selling_price_cents, 500);
        assert_eq!(cement_batch.purchase_order_id.as_deref(), Some(order.id.as_str()));
        assert_eq!(cement_batch.purchase_date, Utc::now().date_naive());

        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        for item in &detail.items {
            assert_eq!(item.item.to_deliver, Quantity::zero());
            assert_eq!(item.item.delivered, item.item.quantity);
        }

        let cement = f.db.products().get(COMPANY, &f.cement_id).await.unwrap();
        assert_eq!(cement.current_quantity, Quantity::from_units(10));

        let logs = f
            .db
            .audit()
            .list(
                COMPANY,
                &AuditFilter {
                    entity_id: Some(order.id.clone()),
                    ..AuditFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        let actions: Vec<AuditAction> = logs.items.iter().map(|l| l.action).collect();
        assert!(actions.contains(&AuditAction::PurchaseOrderApproved));
        assert!(actions.contains(&AuditAction::PurchaseOrderDelivered));

        // Nothing left to deliver
        let err = repo
            .deliver(COMPANY, USER, &order.id, &DeliveryRequest::full())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_partial_then_full_delivery() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = approved(&f).await;
        let detail = repo.detail(COMPANY, &order.id).await.unwrap();
        let cement_item = detail
            .items
            .iter()
            .find(|i| i.item.product_id == f.cement_id)
            .unwrap()
            .item
            .id
            .clone();

        let request = DeliveryRequest::partial(vec![DeliveryLine {
            item_id: cement_item.clone(),
            quantity: Some(Quantity::from_units(6)),
            selling_price_cents: Some(650),
        }]);
        let outcome = repo.deliver(COMPANY, USER, &order.id, &request).await.unwrap();
        assert_eq!(outcome.order.status, PurchaseOrderStatus::PartiallyDelivered);
        assert_eq!(outcome.stocks.len(), 1);
        assert_eq!(outcome.stocks[0].quantity, Quantity::from_units(6));
        assert_eq!(outcome.stocks[0].selling_price_cents, 650);

        // Over-asking is clamped to what is outstanding
        let request = DeliveryRequest::partial(vec![DeliveryLine {
            item_id: cement_item.clone(),
            quantity: Some(Quantity::from_units(99)),
            selling_price_cents: None,
        }]);
        let outcome = repo.deliver(COMPANY, USER, &order.id, &request).await.unwrap();
        assert_eq!(outcome.stocks[0].quantity, Quantity::from_units(4));
        assert_eq!(outcome.order.status, PurchaseOrderStatus::PartiallyDelivered);

        let outcome = repo
            .deliver(COMPANY, USER, &order.id, &DeliveryRequest::full())
            .await
            .unwrap();
        assert_eq!(outcome.order.status, PurchaseOrderStatus::Delivered);
        assert_eq!(outcome.stocks.len(), 1);
        assert_eq!(outcome.stocks[0].product_id, f.sand_id);

        let cement = f.db.products().get(COMPANY, &f.cement_id).await.unwrap();
        assert_eq!(cement.current_quantity, Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_empty_partial_delivery_writes_nothing() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = approved(&f).await;

        let err = repo
            .deliver(COMPANY, USER, &order.id, &DeliveryRequest::partial(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::NothingToDeliver { .. })));

        let reloaded = repo.get(COMPANY, &order.id).await.unwrap();
        assert_eq!(reloaded.status, PurchaseOrderStatus::Approved);
    }

    #[tokio::test]
    async fn test_payment_status_follows_payments() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        let first = repo
            .add_payment(COMPANY, &order.id, &payment(2500, PaymentType::Cash))
            .await
            .unwrap();
        assert_eq!(repo.get(COMPANY, &order.id).await.unwrap().payment_status, PaymentStatus::Partial);

        let second = repo
            .add_payment(COMPANY, &order.id, &payment(3500, PaymentType::BankTransfer))
            .await
            .unwrap();
        assert_eq!(repo.get(COMPANY, &order.id).await.unwrap().payment_status, PaymentStatus::Paid);

        let after = repo.delete_payment(COMPANY, &order.id, &second.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Partial);

        let after = repo.delete_payment(COMPANY, &order.id, &first.id).await.unwrap();
        assert_eq!(after.payment_status, PaymentStatus::Unpaid);

        assert!(matches!(
            repo.delete_payment(COMPANY, &order.id, &first.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_payments_are_rejected() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        let order = repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        let err = repo
            .add_payment(COMPANY, &order.id, &payment(0, PaymentType::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidPaymentAmount { .. })));

        let mut pdc = payment(100, PaymentType::Pdc);
        pdc.due_date = Some(date(2026, 4, 1));
        assert!(repo.add_payment(COMPANY, &order.id, &pdc).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let f = fixture().await;
        let repo = f.db.purchase_orders();
        approved(&f).await;
        repo.create(COMPANY, USER, &input(&f)).await.unwrap();

        let drafts = PurchaseOrderFilter {
            status: Some(PurchaseOrderStatus::Draft),
            ..PurchaseOrderFilter::default()
        };
        let page = repo.list(COMPANY, &drafts, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].supplier_name, "North Quarry");

        let by_supplier = PurchaseOrderFilter {
            search: Some("quarry".to_string()),
            ..PurchaseOrderFilter::default()
        };
        let page = repo.list(COMPANY, &by_supplier, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);

        let other = repo
            .list(OTHER_COMPANY, &PurchaseOrderFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(other.total, 0);
    }
}
