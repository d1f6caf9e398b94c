//! # Domain Types
//!
//! Core domain types used throughout Stockyard.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐    ┌────────────────┐    ┌─────────────────────┐     │
//! │  │   Category   │◄───│    Product     │◄───│    ProductStock     │     │
//! │  │  name        │    │  name, unit    │    │  (batch / lot)      │     │
//! │  └──────────────┘    │  current_qty*  │    │  cost, sell price   │     │
//! │                      └───────▲────────┘    │  remaining, missing │     │
//! │                              │             └──────▲───────▲──────┘     │
//! │  ┌──────────────┐    ┌───────┴────────┐           │       │            │
//! │  │   Supplier   │◄───│ PurchaseOrder  │───────────┘       │            │
//! │  └──────────────┘    │  items, pays   │  delivery creates │            │
//! │                      └────────────────┘  batches          │            │
//! │  ┌──────────────┐    ┌────────────────┐                   │            │
//! │  │   Customer   │◄───│   SalesOrder   │───────────────────┘            │
//! │  └──────────────┘    │  items, pays   │  items bind a batch            │
//! │                      └────────────────┘                                │
//! │                                                                         │
//! │  * derived: Σ remaining_quantity over the product's batches             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tenancy
//! Every stored row carries `company_id`. Child rows (order items,
//! payments) inherit it through their parent order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Category & Product
// =============================================================================

/// A product grouping ("Cement", "Aggregates", ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub company_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A material the company buys and sells.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub company_id: String,
    pub name: String,
    /// Unit of measure shown on orders ("bag", "cu.m").
    pub unit: String,
    pub category_id: Option<String>,
    /// Resolved category name (joined read).
    pub category_name: Option<String>,
    /// Σ remaining_quantity over all batches. Display only.
    #[ts(type = "number")]
    pub current_quantity: Quantity,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product Stock (batch / lot)
// =============================================================================

/// One purchased lot of a product.
///
/// `remaining_quantity` is a running counter. It goes down on sales-order
/// completion, missing reports and manual removal; it is never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductStock {
    pub id: String,
    pub company_id: String,
    pub product_id: String,
    /// Source purchase order; `None` for manual stock entry.
    pub purchase_order_id: Option<String>,
    pub cost_cents: i64,
    pub selling_price_cents: i64,
    #[ts(type = "number")]
    pub quantity: Quantity,
    #[ts(type = "number")]
    pub remaining_quantity: Quantity,
    /// Reported missing or damaged. Never restored.
    #[ts(type = "number")]
    pub missing: Quantity,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductStock {
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// True when the batch can still supply stock.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.remaining_quantity.is_positive()
    }
}

/// A batch with its product resolved, as listed on the stocks screen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductStockView {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stock: ProductStock,
    pub product_name: String,
    pub unit: String,
}

// =============================================================================
// Parties
// =============================================================================

/// A customer or supplier. Both share the same shape and live in
/// separate tables.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Party {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

pub type Customer = Party;
pub type Supplier = Party;

/// Which party table a [`Party`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl PartyKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Customer => "Customer",
            PartyKind::Supplier => "Supplier",
        }
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Purchase order lifecycle.
///
/// ```text
/// draft ──approve──► approved ──deliver──► delivered
///                        │                    ▲
///                        └─partial─► partially_delivered
///                                     │  ▲     │
///                                     └──┘     │ (last items)
///                                   (more)     ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    PartiallyDelivered,
    Delivered,
}

impl PurchaseOrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::PartiallyDelivered => "partially_delivered",
            PurchaseOrderStatus::Delivered => "delivered",
        }
    }

    /// Only drafts may have their items edited or be deleted.
    pub const fn is_editable(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }

    /// Approved and partially delivered orders still expect goods.
    pub const fn accepts_delivery(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Approved | PurchaseOrderStatus::PartiallyDelivered
        )
    }
}

impl Default for PurchaseOrderStatus {
    fn default() -> Self {
        PurchaseOrderStatus::Draft
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sales order lifecycle: `reserved → completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    /// Lines are bound to batches but stock is not yet deducted.
    Reserved,
    /// Stock deducted.
    Completed,
}

impl SalesOrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Reserved => "reserved",
            SalesOrderStatus::Completed => "completed",
        }
    }
}

impl Default for SalesOrderStatus {
    fn default() -> Self {
        SalesOrderStatus::Reserved
    }
}

impl fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Unpaid
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Cheque,
    BankTransfer,
    /// Post-dated cheque. Carries a due date until marked received.
    Pdc,
}

impl PaymentType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Cheque => "cheque",
            PaymentType::BankTransfer => "bank_transfer",
            PaymentType::Pdc => "pdc",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard user role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::User
    }
}

// =============================================================================
// Purchase Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub company_id: String,
    pub supplier_id: String,
    pub po_number: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub status: PurchaseOrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount_cents: i64,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// A purchase order as shown in the list, with the supplier resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub order: PurchaseOrder,
    pub supplier_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub cost_cents: i64,
    #[ts(type = "number")]
    pub delivered: Quantity,
    #[ts(type = "number")]
    pub to_deliver: Quantity,
}

impl PurchaseOrderItem {
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// quantity × cost, rounded to cents.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.cost().times(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItemView {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub item: PurchaseOrderItem,
    pub product_name: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderPayment {
    pub id: String,
    pub purchase_order_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub payment_type: PaymentType,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fully resolved purchase order, as fed to print/export.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub supplier: Supplier,
    pub items: Vec<PurchaseOrderItemView>,
    pub payments: Vec<PurchaseOrderPayment>,
    pub amount_paid_cents: i64,
    pub balance_cents: i64,
}

// =============================================================================
// Sales Orders
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: String,
    pub company_id: String,
    pub customer_id: String,
    pub so_number: String,
    /// The customer's own purchase order reference.
    pub po_number: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub status: SalesOrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount_cents: i64,
    /// Concrete volume for RMC composite orders.
    #[ts(type = "number | null")]
    pub rmc_volume: Option<Quantity>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SalesOrder {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn is_rmc(&self) -> bool {
        self.rmc_volume.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub order: SalesOrder,
    pub customer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderItem {
    pub id: String,
    pub sales_order_id: String,
    /// The batch this line draws from.
    pub product_stock_id: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderItemView {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub item: SalesOrderItem,
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderPayment {
    pub id: String,
    pub sales_order_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub payment_type: PaymentType,
    pub bank: Option<String>,
    /// Cheque date for PDCs.
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A post-dated cheque not yet marked as received.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutstandingCheque {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub payment: SalesOrderPayment,
    pub so_number: String,
    pub customer_name: String,
}

/// Fully resolved sales order, as fed to print/export.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesOrderDetail {
    #[serde(flatten)]
    pub order: SalesOrder,
    pub customer: Customer,
    pub items: Vec<SalesOrderItemView>,
    pub payments: Vec<SalesOrderPayment>,
    pub amount_paid_cents: i64,
    pub balance_cents: i64,
}

// =============================================================================
// Users, Settings, Audit
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Company metadata printed on order documents. One row per company.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Settings {
    pub company_id: String,
    pub company_name: Option<String>,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_contact: Option<String>,
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_contact: Option<String>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Settings {
    /// Blank settings for a company that never saved any.
    pub fn empty(company_id: &str) -> Self {
        Settings {
            company_id: company_id.to_string(),
            ..Settings::default()
        }
    }
}

/// What an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PurchaseOrderApproved,
    PurchaseOrderDelivered,
    PurchaseOrderPartiallyDelivered,
    SalesOrderCompleted,
    StockReportedMissing,
    StockRemoved,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditLog {
    pub id: String,
    pub company_id: String,
    pub user_id: String,
    pub action: AuditAction,
    /// Table name of the affected entity.
    pub entity: String,
    pub entity_id: String,
    pub details: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_order_status_rules() {
        assert!(PurchaseOrderStatus::Draft.is_editable());
        assert!(!PurchaseOrderStatus::Approved.is_editable());

        assert!(!PurchaseOrderStatus::Draft.accepts_delivery());
        assert!(PurchaseOrderStatus::Approved.accepts_delivery());
        assert!(PurchaseOrderStatus::PartiallyDelivered.accepts_delivery());
        assert!(!PurchaseOrderStatus::Delivered.accepts_delivery());
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(PurchaseOrderStatus::default(), PurchaseOrderStatus::Draft);
        assert_eq!(SalesOrderStatus::default(), SalesOrderStatus::Reserved);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unpaid);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&PurchaseOrderStatus::PartiallyDelivered).unwrap();
        assert_eq!(json, "\"partially_delivered\"");
        assert_eq!(PurchaseOrderStatus::PartiallyDelivered.to_string(), "partially_delivered");

        let json = serde_json::to_string(&PaymentType::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }

    #[test]
    fn test_purchase_order_item_line_total() {
        let item = PurchaseOrderItem {
            id: "i1".to_string(),
            purchase_order_id: "po".to_string(),
            product_id: "p".to_string(),
            quantity: Quantity::from_units(4),
            cost_cents: 250,
            delivered: Quantity::zero(),
            to_deliver: Quantity::from_units(4),
        };
        assert_eq!(item.line_total(), Money::from_cents(1000));
    }
}
