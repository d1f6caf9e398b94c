//! # Dashboard
//!
//! Reductions behind the dashboard cards. Each card is fed by its own read
//! query; the rows are grouped and summed here.
//!
//! ```text
//!   product_stocks ───► stock_valuation ───► cost / retail value
//!   sales_orders   ───► sales_summary   ───► count, amount in range
//!   products       ───► low_stock       ───► current_quantity < 10
//!   sales_orders   ───► top_customers   ───► Σ amount per customer, top N
//!   order items    ───► best_sellers    ───► Σ quantity per product, top N
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::quantity::Quantity;
use crate::types::{Product, ProductStock, SalesOrder, SalesOrderStatus};

/// Products below this many units are flagged as low stock.
pub const LOW_STOCK_THRESHOLD: Quantity = Quantity::from_units(10);

/// Default length of the top customers / best sellers lists.
pub const DEFAULT_TOP_N: usize = 5;

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive date range for sales cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> CoreResult<Self> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "from".to_string(),
                reason: "must not be after 'to'".to_string(),
            }
            .into());
        }
        Ok(DateRange { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

// =============================================================================
// Stock Valuation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockValuation {
    /// Σ remaining × cost.
    pub cost_value_cents: i64,
    /// Σ remaining × selling price.
    pub retail_value_cents: i64,
    /// Batches with stock left.
    pub batch_count: i64,
}

pub fn stock_valuation(stocks: &[ProductStock]) -> StockValuation {
    let available = stocks.iter().filter(|s| s.is_available());
    let mut valuation = StockValuation::default();
    for stock in available {
        valuation.cost_value_cents += stock.cost().times(stock.remaining_quantity).cents();
        valuation.retail_value_cents +=
            stock.selling_price().times(stock.remaining_quantity).cents();
        valuation.batch_count += 1;
    }
    valuation
}

// =============================================================================
// Sales Summary
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub order_count: i64,
    pub reserved_count: i64,
    pub completed_count: i64,
    /// Reserved and completed orders together.
    pub total_amount_cents: i64,
    pub completed_amount_cents: i64,
}

pub fn sales_summary(orders: &[SalesOrder]) -> SalesSummary {
    orders.iter().fold(SalesSummary::default(), |mut acc, order| {
        acc.order_count += 1;
        acc.total_amount_cents += order.total_amount_cents;
        match order.status {
            SalesOrderStatus::Reserved => acc.reserved_count += 1,
            SalesOrderStatus::Completed => {
                acc.completed_count += 1;
                acc.completed_amount_cents += order.total_amount_cents;
            }
        }
        acc
    })
}

// =============================================================================
// Low Stock
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockProduct {
    pub product_id: String,
    pub name: String,
    pub unit: String,
    #[ts(type = "number")]
    pub current_quantity: Quantity,
}

/// Products under `threshold`, emptiest first.
pub fn low_stock(products: &[Product], threshold: Quantity) -> Vec<LowStockProduct> {
    let mut low: Vec<LowStockProduct> = products
        .iter()
        .filter(|p| p.current_quantity < threshold)
        .map(|p| LowStockProduct {
            product_id: p.id.clone(),
            name: p.name.clone(),
            unit: p.unit.clone(),
            current_quantity: p.current_quantity,
        })
        .collect();
    low.sort_by(|a, b| {
        a.current_quantity
            .cmp(&b.current_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    low
}

// =============================================================================
// Top Customers
// =============================================================================

/// One sales order, as read for the top customers card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerSale {
    pub customer_id: String,
    pub customer_name: String,
    pub total_amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerTotal {
    pub customer_id: String,
    pub customer_name: String,
    pub order_count: i64,
    pub total_amount_cents: i64,
}

pub fn top_customers(rows: &[CustomerSale], n: usize) -> Vec<CustomerTotal> {
    let mut grouped: HashMap<&str, CustomerTotal> = HashMap::new();
    for row in rows {
        let entry = grouped
            .entry(row.customer_id.as_str())
            .or_insert_with(|| CustomerTotal {
                customer_id: row.customer_id.clone(),
                customer_name: row.customer_name.clone(),
                order_count: 0,
                total_amount_cents: 0,
            });
        entry.order_count += 1;
        entry.total_amount_cents += row.total_amount_cents;
    }

    let mut totals: Vec<CustomerTotal> = grouped.into_values().collect();
    totals.sort_by(|a, b| {
        Reverse(a.total_amount_cents)
            .cmp(&Reverse(b.total_amount_cents))
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    totals.truncate(n);
    totals
}

// =============================================================================
// Best Sellers
// =============================================================================

/// One sales order line, resolved to its product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SoldLine {
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
    pub quantity: Quantity,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub unit: String,
    #[ts(type = "number")]
    pub quantity_sold: Quantity,
    pub revenue_cents: i64,
}

pub fn best_sellers(lines: &[SoldLine], n: usize) -> Vec<ProductSales> {
    let mut grouped: HashMap<&str, ProductSales> = HashMap::new();
    for line in lines {
        let entry = grouped
            .entry(line.product_id.as_str())
            .or_insert_with(|| ProductSales {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                unit: line.unit.clone(),
                quantity_sold: Quantity::zero(),
                revenue_cents: 0,
            });
        entry.quantity_sold += line.quantity;
        entry.revenue_cents += line.total_cents;
    }

    let mut sellers: Vec<ProductSales> = grouped.into_values().collect();
    sellers.sort_by(|a, b| {
        Reverse(a.quantity_sold)
            .cmp(&Reverse(b.quantity_sold))
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    sellers.truncate(n);
    sellers
}

// =============================================================================
// Dashboard
// =============================================================================

/// Everything the dashboard renders in one response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dashboard {
    pub range: DateRange,
    pub stock: StockValuation,
    pub sales: SalesSummary,
    pub low_stock: Vec<LowStockProduct>,
    pub top_customers: Vec<CustomerTotal>,
    pub best_sellers: Vec<ProductSales>,
}

// =============================================================================
// Unit Tests
// =============================================================================
