//! # Dashboard Repository
//!
//! Reads the raw rows behind each dashboard card and hands them to the
//! reductions in `stockyard_core::dashboard`. The queries are independent;
//! the cards tolerate being a few milliseconds apart.

use sqlx::SqlitePool;
use stockyard_core::dashboard::{
    best_sellers, low_stock, sales_summary, stock_valuation, top_customers, CustomerSale,
    Dashboard, DateRange, SoldLine, LOW_STOCK_THRESHOLD,
};
use stockyard_core::{Product, ProductStock, SalesOrder};
use tracing::debug;

use super::product::{PRODUCT_COLUMNS, PRODUCT_FROM};
use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    /// Loads every card for orders dated within `range`. Stock cards are
    /// always current.
    pub async fn load(&self, company_id: &str, range: DateRange, top_n: usize) -> DbResult<Dashboard> {
        debug!(company_id = %company_id, from = %range.from, to = %range.to, "Loading dashboard");

        let stocks = sqlx::query_as::<_, ProductStock>(
            "SELECT * FROM product_stocks WHERE company_id = ? AND remaining_quantity > 0",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let orders = sqlx::query_as::<_, SalesOrder>(
            "SELECT * FROM sales_orders WHERE company_id = ? AND date >= ? AND date <= ?",
        )
        .bind(company_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} {} WHERE p.company_id = ?",
            PRODUCT_COLUMNS, PRODUCT_FROM
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let customer_sales = sqlx::query_as::<_, CustomerSale>(
            "SELECT so.customer_id, c.name AS customer_name, so.total_amount_cents
             FROM sales_orders so JOIN customers c ON c.id = so.customer_id
             WHERE so.company_id = ? AND so.date >= ? AND so.date <= ?",
        )
        .bind(company_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        let sold_lines = sqlx::query_as::<_, SoldLine>(
            "SELECT p.id AS product_id, p.name AS product_name, p.unit, i.quantity, i.total_cents
             FROM sales_order_items i
             JOIN sales_orders so ON so.id = i.sales_order_id
             JOIN product_stocks s ON s.id = i.product_stock_id
             JOIN products p ON p.id = s.product_id
             WHERE so.company_id = ? AND so.date >= ? AND so.date <= ?",
        )
        .bind(company_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(Dashboard {
            range,
            stock: stock_valuation(&stocks),
            sales: sales_summary(&orders),
            low_stock: low_stock(&products, LOW_STOCK_THRESHOLD),
            top_customers: top_customers(&customer_sales, top_n),
            best_sellers: best_sellers(&sold_lines, top_n),
        })
    }
}
