//! # Sales
//!
//! Sales order rules: line totals, stock reservation checks and completion
//! planning.
//!
//! ## Completion Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  complete(SO)                                                           │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  status == reserved? ──no──► InvalidStatus                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  demand per batch (lines on the same batch are summed)                 │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  every batch: remaining ≥ demand? ──no──► InsufficientStock            │
//! │      │                                     (nothing written)            │
//! │      ▼                                                                  │
//! │  Vec<StockDeduction> ──► stockyard-db: one transaction,                 │
//! │                          UPDATE ... WHERE remaining_quantity >= ?       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check here runs on rows read a moment ago. The conditional decrement
//! in the database is what actually holds under concurrent completions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{ProductStock, SalesOrder, SalesOrderItem, SalesOrderStatus};
use crate::validation::{
    validate_item_count, validate_name, validate_optional_text, validate_price_cents,
    validate_quantity,
};

const ENTITY: &str = "Sales order";

// =============================================================================
// Inputs
// =============================================================================

/// One line of a sales order form, bound to a specific batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrderLine {
    pub product_stock_id: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

impl SalesOrderLine {
    pub fn line_total(&self) -> Money {
        line_total(self.quantity, self.unit_price_cents, self.discount_cents)
    }
}

/// Create / edit body for a reserved sales order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrderInput {
    pub customer_id: String,
    /// Generated when omitted.
    pub so_number: Option<String>,
    /// The customer's purchase order reference.
    pub po_number: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub items: Vec<SalesOrderLine>,
}

impl SalesOrderInput {
    pub fn validate(&self) -> CoreResult<()> {
        validate_name("customer_id", &self.customer_id)?;
        if let Some(number) = &self.so_number {
            validate_name("so_number", number)?;
        }
        validate_optional_text("po_number", self.po_number.as_deref())?;
        validate_lines(&self.items)
    }

    pub fn total(&self) -> CoreResult<Money> {
        sales_order_total(&self.items)
    }
}

/// Validates sales order lines.
///
/// ## Rules
/// - 1..=100 lines
/// - 0 < quantity ≤ MAX_ITEM_QUANTITY
/// - unit price and discount within 0..=MAX_PRICE_CENTS
/// - the order total fits in cents
pub fn validate_lines(lines: &[SalesOrderLine]) -> CoreResult<()> {
    validate_item_count(lines.len()).map_err(|e| match e {
        ValidationError::Required { .. } => CoreError::EmptyOrder,
        other => other.into(),
    })?;

    for (i, line) in lines.iter().enumerate() {
        validate_name(&format!("items[{}].product_stock_id", i), &line.product_stock_id)?;
        validate_quantity(&format!("items[{}].quantity", i), line.quantity)?;
        validate_price_cents(&format!("items[{}].unit_price_cents", i), line.unit_price_cents)?;
        validate_price_cents(&format!("items[{}].discount_cents", i), line.discount_cents)?;
    }

    sales_order_total(lines).map(|_| ())
}

// =============================================================================
// Totals
// =============================================================================

/// `quantity × unit_price − discount`, never below zero.
///
/// ## Example
/// ```rust
/// use stockyard_core::sales::line_total;
/// use stockyard_core::Quantity;
///
/// assert_eq!(line_total(Quantity::from_units(10), 600, 500).cents(), 5500);
/// assert_eq!(line_total(Quantity::from_units(1), 600, 900).cents(), 0);
/// ```
pub fn line_total(quantity: Quantity, unit_price_cents: i64, discount_cents: i64) -> Money {
    let gross = Money::from_cents(unit_price_cents).times(quantity);
    (gross - Money::from_cents(discount_cents)).non_negative()
}

pub fn sales_order_total(lines: &[SalesOrderLine]) -> CoreResult<Money> {
    let line_totals = lines
        .iter()
        .map(|line| {
            let gross = Money::from_cents(line.unit_price_cents)
                .checked_times(line.quantity)
                .ok_or(CoreError::AmountOverflow)?;
            Ok((gross - Money::from_cents(line.discount_cents)).non_negative())
        })
        .collect::<CoreResult<Vec<_>>>()?;
    Money::try_sum(line_totals)
}

// =============================================================================
// Stock Sufficiency
// =============================================================================

/// Sums demand per batch. Ordered by batch id so deductions are applied in
/// a stable order.
pub fn demand_by_batch<'a>(
    lines: impl IntoIterator<Item = (&'a str, Quantity)>,
) -> BTreeMap<String, Quantity> {
    let mut demand = BTreeMap::new();
    for (stock_id, qty) in lines {
        *demand.entry(stock_id.to_string()).or_insert_with(Quantity::zero) += qty;
    }
    demand
}

/// Checks every batch can cover its demand, before anything is written.
///
/// Batches missing from `stocks` are reported as validation errors.
pub fn check_sufficiency(
    demand: &BTreeMap<String, Quantity>,
    stocks: &[ProductStock],
) -> CoreResult<()> {
    let by_id: HashMap<&str, &ProductStock> =
        stocks.iter().map(|s| (s.id.as_str(), s)).collect();

    for (stock_id, needed) in demand {
        let stock = by_id.get(stock_id.as_str()).ok_or_else(|| {
            CoreError::from(ValidationError::InvalidFormat {
                field: "product_stock_id".to_string(),
                reason: format!("unknown stock batch {}", stock_id),
            })
        })?;

        if stock.remaining_quantity < *needed {
            return Err(CoreError::InsufficientStock {
                stock_id: stock_id.clone(),
                available: stock.remaining_quantity,
                requested: *needed,
            });
        }
    }

    Ok(())
}

/// Form-time check for a new or edited reservation.
pub fn check_reservation(lines: &[SalesOrderLine], stocks: &[ProductStock]) -> CoreResult<()> {
    let demand = demand_by_batch(
        lines
            .iter()
            .map(|l| (l.product_stock_id.as_str(), l.quantity)),
    );
    check_sufficiency(&demand, stocks)
}

// =============================================================================
// Status Gates & Completion
// =============================================================================

/// Only reserved orders may be edited, deleted or completed.
pub fn ensure_reserved(order: &SalesOrder, action: &str) -> CoreResult<()> {
    if order.status == SalesOrderStatus::Reserved {
        Ok(())
    } else {
        Err(CoreError::invalid_status(ENTITY, &order.id, order.status, action))
    }
}

/// One conditional decrement to apply on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDeduction {
    pub product_stock_id: String,
    pub quantity: Quantity,
}

/// Decides the stock deductions for completing `order`.
///
/// All-or-nothing: any batch short of its aggregated demand fails the whole
/// plan.
pub fn plan_completion(
    order: &SalesOrder,
    items: &[SalesOrderItem],
    stocks: &[ProductStock],
) -> CoreResult<Vec<StockDeduction>> {
    ensure_reserved(order, "complete")?;
    if items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    let demand = demand_by_batch(
        items
            .iter()
            .map(|i| (i.product_stock_id.as_str(), i.quantity)),
    );
    check_sufficiency(&demand, stocks)?;

    Ok(demand
        .into_iter()
        .map(|(product_stock_id, quantity)| StockDeduction {
            product_stock_id,
            quantity,
        })
        .collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentStatus;
    use chrono::Utc;

    fn stock(id: &str, remaining: i64) -> ProductStock {
        ProductStock {
            id: id.to_string(),
            company_id: "c1".to_string(),
            product_id: "cement".to_string(),
            purchase_order_id: None,
            cost_cents: 500,
            selling_price_cents: 600,
            quantity: Quantity::from_units(100),
            remaining_quantity: Quantity::from_units(remaining),
            missing: Quantity::zero(),
            purchase_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(status: SalesOrderStatus) -> SalesOrder {
        SalesOrder {
            id: "so-1".to_string(),
            company_id: "c1".to_string(),
            customer_id: "cust".to_string(),
            so_number: "SO-00001".to_string(),
            po_number: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            total_amount_cents: 0,
            rmc_volume: None,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str, stock_id: &str, qty: i64) -> SalesOrderItem {
        SalesOrderItem {
            id: id.to_string(),
            sales_order_id: "so-1".to_string(),
            product_stock_id: stock_id.to_string(),
            quantity: Quantity::from_units(qty),
            unit_price_cents: 600,
            discount_cents: 0,
            total_cents: 600 * qty,
        }
    }

    fn line(stock_id: &str, qty: i64, price: i64, discount: i64) -> SalesOrderLine {
        SalesOrderLine {
            product_stock_id: stock_id.to_string(),
            quantity: Quantity::from_units(qty),
            unit_price_cents: price,
            discount_cents: discount,
        }
    }

    #[test]
    fn test_line_total_never_negative() {
        assert_eq!(line_total(Quantity::from_units(2), 600, 100), Money::from_cents(1100));
        assert_eq!(line_total(Quantity::from_units(1), 100, 500), Money::zero());
    }

    #[test]
    fn test_order_total_sums_lines() {
        let lines = vec![line("b1", 10, 600, 500), line("b2", 2, 1500, 0)];
        assert_eq!(sales_order_total(&lines).unwrap(), Money::from_cents(8500));
    }

    #[test]
    fn test_order_total_overflow_is_an_error() {
        let lines = vec![line("b1", 1, i64::MAX, 0), line("b2", 1, i64::MAX, 0)];
        assert!(matches!(sales_order_total(&lines), Err(CoreError::AmountOverflow)));
        assert!(validate_lines(&lines).is_err());
    }

    #[test]
    fn test_validate_lines() {
        assert!(matches!(validate_lines(&[]), Err(CoreError::EmptyOrder)));
        assert!(validate_lines(&[line("b1", 1, 600, 0)]).is_ok());
        assert!(validate_lines(&[line("b1", 0, 600, 0)]).is_err());
        assert!(validate_lines(&[line("b1", 1, 600, -1)]).is_err());
    }

    #[test]
    fn test_reservation_aggregates_lines_on_same_batch() {
        let stocks = vec![stock("b1", 10)];
        assert!(check_reservation(&[line("b1", 6, 600, 0)], &stocks).is_ok());

        let err = check_reservation(&[line("b1", 6, 600, 0), line("b1", 5, 600, 0)], &stocks)
            .unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, Quantity::from_units(10));
                assert_eq!(requested, Quantity::from_units(11));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reservation_unknown_batch() {
        let err = check_reservation(&[line("missing", 1, 600, 0)], &[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_completion_plan_is_all_or_nothing() {
        let stocks = vec![stock("b1", 50), stock("b2", 3)];
        let items = vec![item("i1", "b1", 20), item("i2", "b2", 4)];

        let err = plan_completion(&order(SalesOrderStatus::Reserved), &items, &stocks).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { ref stock_id, .. } if stock_id == "b2"));
    }

    #[test]
    fn test_completion_plan_aggregates_per_batch() {
        let stocks = vec![stock("b1", 50)];
        let items = vec![item("i1", "b1", 20), item("i2", "b1", 30)];

        let plan = plan_completion(&order(SalesOrderStatus::Reserved), &items, &stocks).unwrap();
        assert_eq!(
            plan,
            vec![StockDeduction {
                product_stock_id: "b1".to_string(),
                quantity: Quantity::from_units(50),
            }]
        );
    }

    #[test]
    fn test_completion_requires_reserved() {
        let stocks = vec![stock("b1", 50)];
        let items = vec![item("i1", "b1", 1)];
        let err = plan_completion(&order(SalesOrderStatus::Completed), &items, &stocks).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatus { .. }));
    }
}
