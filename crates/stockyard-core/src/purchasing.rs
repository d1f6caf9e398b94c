//! # Purchasing
//!
//! Purchase order rules: totals, status gates and delivery planning.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   draft ──approve──► approved ──deliver (full)──────────► delivered    │
//! │     │                    │                                    ▲         │
//! │  edit/delete             └──deliver (partial)──► partially ───┘         │
//! │  (drafts only)                                   delivered              │
//! │                                                   │     ▲               │
//! │                                                   └─────┘               │
//! │                                                  more partials          │
//! │                                                                         │
//! │  Each delivery:                                                         │
//! │    item.delivered  += n                                                 │
//! │    item.to_deliver -= n                                                 │
//! │    one ProductStock batch per item with n > 0, dated today              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module only decides. `stockyard-db` applies a [`DeliveryPlan`]
//! inside one transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{AuditAction, PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus};
use crate::validation::{
    validate_item_count, validate_name, validate_optional_text, validate_price_cents,
    validate_quantity,
};

const ENTITY: &str = "Purchase order";

// =============================================================================
// Inputs
// =============================================================================

/// One line of a purchase order form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderLine {
    pub product_id: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub cost_cents: i64,
}

impl PurchaseOrderLine {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.cost_cents).times(self.quantity)
    }

    fn checked_line_total(&self) -> CoreResult<Money> {
        Money::from_cents(self.cost_cents)
            .checked_times(self.quantity)
            .ok_or(CoreError::AmountOverflow)
    }
}

/// Create / edit body for a draft purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderInput {
    pub supplier_id: String,
    /// Generated when omitted.
    pub po_number: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub items: Vec<PurchaseOrderLine>,
}

impl PurchaseOrderInput {
    /// Validates header and lines.
    ///
    /// ## Rules
    /// - supplier is required
    /// - 1..=100 lines
    /// - every line: 0 < quantity ≤ MAX_ITEM_QUANTITY, 0 ≤ cost ≤ MAX_PRICE_CENTS
    /// - the order total fits in cents
    pub fn validate(&self) -> CoreResult<()> {
        validate_name("supplier_id", &self.supplier_id)?;
        if let Some(number) = &self.po_number {
            validate_name("po_number", number)?;
        }
        validate_optional_text("notes", self.notes.as_deref())?;
        validate_item_count(self.items.len()).map_err(|e| match e {
            ValidationError::Required { .. } => CoreError::EmptyOrder,
            other => other.into(),
        })?;

        for (i, line) in self.items.iter().enumerate() {
            validate_name(&format!("items[{}].product_id", i), &line.product_id)?;
            validate_quantity(&format!("items[{}].quantity", i), line.quantity)?;
            validate_price_cents(&format!("items[{}].cost_cents", i), line.cost_cents)?;
        }

        self.total().map(|_| ())
    }

    pub fn total(&self) -> CoreResult<Money> {
        purchase_order_total(&self.items)
    }
}

/// Σ quantity × cost over the lines, each rounded to cents.
///
/// ## Example
/// ```rust
/// use stockyard_core::purchasing::{purchase_order_total, PurchaseOrderLine};
/// use stockyard_core::Quantity;
///
/// let lines = vec![
///     PurchaseOrderLine { product_id: "a".into(), quantity: Quantity::from_units(10), cost_cents: 500 },
///     PurchaseOrderLine { product_id: "b".into(), quantity: Quantity::from_units(4), cost_cents: 250 },
/// ];
/// assert_eq!(purchase_order_total(&lines).unwrap().cents(), 6000);
/// ```
pub fn purchase_order_total(lines: &[PurchaseOrderLine]) -> CoreResult<Money> {
    let line_totals = lines
        .iter()
        .map(PurchaseOrderLine::checked_line_total)
        .collect::<CoreResult<Vec<_>>>()?;
    Money::try_sum(line_totals)
}

// =============================================================================
// Status Gates
// =============================================================================

/// Edits and deletes are allowed on drafts only.
pub fn ensure_editable(order: &PurchaseOrder, action: &str) -> CoreResult<()> {
    if order.status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::invalid_status(ENTITY, &order.id, order.status, action))
    }
}

/// draft → approved.
pub fn ensure_can_approve(order: &PurchaseOrder) -> CoreResult<()> {
    if order.status == PurchaseOrderStatus::Draft {
        Ok(())
    } else {
        Err(CoreError::invalid_status(ENTITY, &order.id, order.status, "approve"))
    }
}

pub fn ensure_can_deliver(order: &PurchaseOrder) -> CoreResult<()> {
    if order.status.accepts_delivery() {
        Ok(())
    } else {
        Err(CoreError::invalid_status(ENTITY, &order.id, order.status, "deliver"))
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Per-line part of a delivery request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryLine {
    pub item_id: String,
    /// Amount received now. Ignored on full delivery.
    #[ts(type = "number | null")]
    pub quantity: Option<Quantity>,
    /// Selling price for the new batch. Defaults to the item cost.
    pub selling_price_cents: Option<i64>,
}

/// Body of a deliver action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryRequest {
    /// `false` delivers everything still outstanding.
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub lines: Vec<DeliveryLine>,
}

impl DeliveryRequest {
    pub fn full() -> Self {
        DeliveryRequest::default()
    }

    pub fn partial(lines: Vec<DeliveryLine>) -> Self {
        DeliveryRequest {
            partial: true,
            lines,
        }
    }
}

/// What happens to one purchase order item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDelivery {
    pub item_id: String,
    pub product_id: String,
    pub cost_cents: i64,
    pub selling_price_cents: i64,
    /// Received in this delivery (0 when the line is untouched).
    pub received: Quantity,
    /// New running total delivered.
    pub delivered: Quantity,
    /// New outstanding amount.
    pub to_deliver: Quantity,
}

/// The full effect of one delivery, ready to be applied atomically.
#[derive(Debug, Clone)]
pub struct DeliveryPlan {
    pub items: Vec<ItemDelivery>,
    pub status: PurchaseOrderStatus,
}

impl DeliveryPlan {
    /// Items that produce a new stock batch.
    pub fn receipts(&self) -> impl Iterator<Item = &ItemDelivery> {
        self.items.iter().filter(|i| i.received.is_positive())
    }

    pub fn audit_action(&self) -> AuditAction {
        match self.status {
            PurchaseOrderStatus::Delivered => AuditAction::PurchaseOrderDelivered,
            _ => AuditAction::PurchaseOrderPartiallyDelivered,
        }
    }
}

/// Decides a delivery against the order's current items.
///
/// ## Rules
/// - Order must be approved or partially delivered
/// - Full: every item receives its whole `to_deliver`
/// - Partial: each item receives `min(max(requested, 0), to_deliver)`;
///   items without a line receive nothing
/// - Status is `delivered` when nothing stays outstanding, otherwise
///   `partially_delivered`
/// - A partial delivery that receives nothing at all is rejected
///
/// ## Example
/// ```rust,ignore
/// let plan = plan_delivery(&order, &items, &DeliveryRequest::full())?;
/// assert_eq!(plan.status, PurchaseOrderStatus::Delivered);
/// ```
pub fn plan_delivery(
    order: &PurchaseOrder,
    items: &[PurchaseOrderItem],
    request: &DeliveryRequest,
) -> CoreResult<DeliveryPlan> {
    ensure_can_deliver(order)?;

    let known: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    let mut lines: HashMap<&str, &DeliveryLine> = HashMap::new();
    for line in &request.lines {
        if !known.contains(line.item_id.as_str()) {
            return Err(ValidationError::InvalidFormat {
                field: "item_id".to_string(),
                reason: format!("{} is not on purchase order {}", line.item_id, order.id),
            }
            .into());
        }
        if lines.insert(line.item_id.as_str(), line).is_some() {
            return Err(ValidationError::Duplicate {
                field: "item_id".to_string(),
                value: line.item_id.clone(),
            }
            .into());
        }
        if let Some(price) = line.selling_price_cents {
            validate_price_cents("selling_price_cents", price)?;
        }
    }

    let planned: Vec<ItemDelivery> = items
        .iter()
        .map(|item| {
            let line = lines.get(item.id.as_str());
            let received = if request.partial {
                let requested = line.and_then(|l| l.quantity).unwrap_or_default();
                clamp_delivery(requested, item.to_deliver)
            } else {
                item.to_deliver.max(Quantity::zero())
            };
            ItemDelivery {
                item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                cost_cents: item.cost_cents,
                selling_price_cents: line
                    .and_then(|l| l.selling_price_cents)
                    .unwrap_or(item.cost_cents),
                received,
                delivered: item.delivered + received,
                to_deliver: item.to_deliver - received,
            }
        })
        .collect();

    if request.partial && planned.iter().all(|i| i.received.is_zero()) {
        return Err(CoreError::NothingToDeliver {
            order_id: order.id.clone(),
        });
    }

    let status = if planned.iter().all(|i| !i.to_deliver.is_positive()) {
        PurchaseOrderStatus::Delivered
    } else {
        PurchaseOrderStatus::PartiallyDelivered
    };

    Ok(DeliveryPlan {
        items: planned,
        status,
    })
}

/// `min(max(requested, 0), outstanding)`.
#[inline]
pub fn clamp_delivery(requested: Quantity, outstanding: Quantity) -> Quantity {
    requested.max(Quantity::zero()).min(outstanding.max(Quantity::zero()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentStatus;
    use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS, MAX_PRICE_CENTS};
    use chrono::Utc;

    fn order(status: PurchaseOrderStatus) -> PurchaseOrder {
        PurchaseOrder {
            id: "po-1".to_string(),
            company_id: "c1".to_string(),
            supplier_id: "s1".to_string(),
            po_number: "PO-00001".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            status,
            payment_status: PaymentStatus::Unpaid,
            total_amount_cents: 6000,
            notes: None,
            created_by: "u1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str, qty: i64, delivered: i64, cost_cents: i64) -> PurchaseOrderItem {
        PurchaseOrderItem {
            id: id.to_string(),
            purchase_order_id: "po-1".to_string(),
            product_id: format!("prod-{}", id),
            quantity: Quantity::from_units(qty),
            cost_cents,
            delivered: Quantity::from_units(delivered),
            to_deliver: Quantity::from_units(qty - delivered),
        }
    }

    fn line(item_id: &str, qty: i64) -> DeliveryLine {
        DeliveryLine {
            item_id: item_id.to_string(),
            quantity: Some(Quantity::from_units(qty)),
            selling_price_cents: None,
        }
    }

    fn input(items: Vec<PurchaseOrderLine>) -> PurchaseOrderInput {
        PurchaseOrderInput {
            supplier_id: "s1".to_string(),
            po_number: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            notes: None,
            items,
        }
    }

    #[test]
    fn test_total_of_mixed_lines() {
        let po = input(vec![
            PurchaseOrderLine {
                product_id: "cement".to_string(),
                quantity: Quantity::from_units(10),
                cost_cents: 500,
            },
            PurchaseOrderLine {
                product_id: "sand".to_string(),
                quantity: Quantity::from_units(4),
                cost_cents: 250,
            },
        ]);
        assert!(po.validate().is_ok());
        assert_eq!(po.total().unwrap(), Money::from_cents(6000));
    }

    #[test]
    fn test_oversized_lines_rejected_not_wrapped() {
        let po = input(vec![
            PurchaseOrderLine {
                product_id: "cement".to_string(),
                quantity: Quantity::from_units(1),
                cost_cents: i64::MAX,
            },
            PurchaseOrderLine {
                product_id: "sand".to_string(),
                quantity: Quantity::from_units(1),
                cost_cents: i64::MAX,
            },
        ]);
        assert!(matches!(
            po.validate(),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(matches!(po.total(), Err(CoreError::AmountOverflow)));

        let wide = input(vec![PurchaseOrderLine {
            product_id: "cement".to_string(),
            quantity: Quantity::from_units(1000),
            cost_cents: 10_000_000_000_000_000,
        }]);
        assert!(wide.validate().is_err());
        assert!(matches!(wide.total(), Err(CoreError::AmountOverflow)));
    }

    #[test]
    fn test_largest_valid_order_fits() {
        let lines = (0..MAX_ORDER_ITEMS)
            .map(|i| PurchaseOrderLine {
                product_id: format!("p{}", i),
                quantity: MAX_ITEM_QUANTITY,
                cost_cents: MAX_PRICE_CENTS,
            })
            .collect();
        let po = input(lines);
        assert!(po.validate().is_ok());
        assert!(po.total().unwrap().is_positive());
    }

    #[test]
    fn test_validate_rejects_bad_lines() {
        assert!(matches!(input(vec![]).validate(), Err(CoreError::EmptyOrder)));

        let zero_qty = input(vec![PurchaseOrderLine {
            product_id: "cement".to_string(),
            quantity: Quantity::zero(),
            cost_cents: 500,
        }]);
        assert!(matches!(zero_qty.validate(), Err(CoreError::Validation(_))));

        let negative_cost = input(vec![PurchaseOrderLine {
            product_id: "cement".to_string(),
            quantity: Quantity::from_units(1),
            cost_cents: -1,
        }]);
        assert!(negative_cost.validate().is_err());
    }

    #[test]
    fn test_status_gates() {
        assert!(ensure_editable(&order(PurchaseOrderStatus::Draft), "edit").is_ok());
        assert!(ensure_editable(&order(PurchaseOrderStatus::Approved), "edit").is_err());
        assert!(ensure_can_approve(&order(PurchaseOrderStatus::Draft)).is_ok());
        assert!(ensure_can_approve(&order(PurchaseOrderStatus::Approved)).is_err());
        assert!(ensure_can_deliver(&order(PurchaseOrderStatus::Draft)).is_err());
        assert!(ensure_can_deliver(&order(PurchaseOrderStatus::Delivered)).is_err());
    }

    #[test]
    fn test_full_delivery_receives_everything_outstanding() {
        let items = vec![item("a", 10, 0, 500), item("b", 4, 0, 250)];
        let plan = plan_delivery(
            &order(PurchaseOrderStatus::Approved),
            &items,
            &DeliveryRequest::full(),
        )
        .unwrap();

        assert_eq!(plan.status, PurchaseOrderStatus::Delivered);
        assert_eq!(plan.receipts().count(), 2);
        for (planned, original) in plan.items.iter().zip(&items) {
            assert_eq!(planned.received, original.quantity);
            assert_eq!(planned.delivered, original.delivered + original.to_deliver);
            assert_eq!(planned.to_deliver, Quantity::zero());
            assert_eq!(planned.selling_price_cents, original.cost_cents);
        }
        assert_eq!(plan.audit_action(), AuditAction::PurchaseOrderDelivered);
    }

    #[test]
    fn test_full_delivery_after_partial_only_receives_the_rest() {
        let items = vec![item("a", 10, 6, 500)];
        let plan = plan_delivery(
            &order(PurchaseOrderStatus::PartiallyDelivered),
            &items,
            &DeliveryRequest::full(),
        )
        .unwrap();

        assert_eq!(plan.items[0].received, Quantity::from_units(4));
        assert_eq!(plan.items[0].delivered, Quantity::from_units(10));
        assert_eq!(plan.status, PurchaseOrderStatus::Delivered);
    }

    #[test]
    fn test_partial_delivery_clamps_to_outstanding() {
        let items = vec![item("a", 10, 0, 500), item("b", 4, 0, 250)];
        let request = DeliveryRequest::partial(vec![line("a", 25), line("b", -3)]);
        let plan = plan_delivery(&order(PurchaseOrderStatus::Approved), &items, &request).unwrap();

        assert_eq!(plan.items[0].received, Quantity::from_units(10));
        assert_eq!(plan.items[0].to_deliver, Quantity::zero());
        assert_eq!(plan.items[1].received, Quantity::zero());
        assert_eq!(plan.items[1].to_deliver, Quantity::from_units(4));
        assert_eq!(plan.receipts().count(), 1);
        assert_eq!(plan.status, PurchaseOrderStatus::PartiallyDelivered);
        assert_eq!(plan.audit_action(), AuditAction::PurchaseOrderPartiallyDelivered);
    }

    #[test]
    fn test_partial_delivery_completing_every_item_is_delivered() {
        let items = vec![item("a", 10, 7, 500)];
        let request = DeliveryRequest::partial(vec![line("a", 3)]);
        let plan = plan_delivery(
            &order(PurchaseOrderStatus::PartiallyDelivered),
            &items,
            &request,
        )
        .unwrap();
        assert_eq!(plan.status, PurchaseOrderStatus::Delivered);
    }

    #[test]
    fn test_partial_delivery_of_nothing_is_rejected() {
        let items = vec![item("a", 10, 0, 500)];
        let request = DeliveryRequest::partial(vec![line("a", 0)]);
        let err = plan_delivery(&order(PurchaseOrderStatus::Approved), &items, &request)
            .unwrap_err();
        assert!(matches!(err, CoreError::NothingToDeliver { .. }));
    }

    #[test]
    fn test_delivery_rejects_unknown_and_duplicate_lines() {
        let items = vec![item("a", 10, 0, 500)];
        let unknown = DeliveryRequest::partial(vec![line("zzz", 1)]);
        assert!(plan_delivery(&order(PurchaseOrderStatus::Approved), &items, &unknown).is_err());

        let duplicate = DeliveryRequest::partial(vec![line("a", 1), line("a", 2)]);
        assert!(plan_delivery(&order(PurchaseOrderStatus::Approved), &items, &duplicate).is_err());
    }

    #[test]
    fn test_delivery_uses_requested_selling_price() {
        let items = vec![item("a", 10, 0, 500)];
        let request = DeliveryRequest {
            partial: false,
            lines: vec![DeliveryLine {
                item_id: "a".to_string(),
                quantity: None,
                selling_price_cents: Some(650),
            }],
        };
        let plan = plan_delivery(&order(PurchaseOrderStatus::Approved), &items, &request).unwrap();
        assert_eq!(plan.items[0].selling_price_cents, 650);
    }

    #[test]
    fn test_clamp_delivery() {
        let five = Quantity::from_units(5);
        assert_eq!(clamp_delivery(Quantity::from_units(9), five), five);
        assert_eq!(clamp_delivery(Quantity::from_units(-2), five), Quantity::zero());
        assert_eq!(clamp_delivery(Quantity::from_milli(2500), five), Quantity::from_milli(2500));
    }
}
