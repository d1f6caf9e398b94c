//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Current Quantity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                     product_stocks                            │
//! │  ┌──────────────────┐         ┌─────────────────────────────────┐       │
//! │  │ Portland Cement  │◄────────│ batch A  remaining 120 bags     │       │
//! │  │                  │◄────────│ batch B  remaining  80 bags     │       │
//! │  │ current_quantity │         │ batch C  remaining   0 bags     │       │
//! │  │   = 200 bags     │         └─────────────────────────────────┘       │
//! │  └──────────────────┘                                                   │
//! │                                                                         │
//! │  Never stored. Every read sums remaining_quantity over the batches.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use stockyard_core::input::ProductInput;
use stockyard_core::{Page, PageRequest, Product};
use tracing::debug;

use super::{ensure_exists, fetch_page, new_id, push_search};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Product";

pub(crate) const PRODUCT_COLUMNS: &str = "p.*, c.name AS category_name, \
     COALESCE((SELECT SUM(s.remaining_quantity) FROM product_stocks s WHERE s.product_id = p.id), 0) \
     AS current_quantity";

pub(crate) const PRODUCT_FROM: &str =
    "FROM products p LEFT JOIN categories c ON c.id = p.category_id";

/// Filters of the products screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<String>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists products with category name and current quantity resolved.
    ///
    /// `search` matches the product name, case-insensitively.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &ProductFilter,
        request: PageRequest,
    ) -> DbResult<Page<Product>> {
        debug!(company_id = %company_id, ?filter, "Listing products");

        let company = company_id.to_string();
        let filter = filter.clone();
        fetch_page(
            &self.pool,
            PRODUCT_COLUMNS,
            PRODUCT_FROM,
            "p.name ASC",
            request,
            |qb| {
                qb.push(" WHERE p.company_id = ").push_bind(company.clone());
                if let Some(category_id) = &filter.category_id {
                    qb.push(" AND p.category_id = ").push_bind(category_id.clone());
                }
                push_search(qb, "p.name", filter.search.as_deref());
            },
        )
        .await
    }

    /// Every product of the company, ordered by name.
    pub async fn all(&self, company_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} {} WHERE p.company_id = ? ORDER BY p.name ASC",
            PRODUCT_COLUMNS, PRODUCT_FROM
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} {} WHERE p.company_id = ? AND p.id = ?",
            PRODUCT_COLUMNS, PRODUCT_FROM
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn create(&self, company_id: &str, input: &ProductInput) -> DbResult<Product> {
        input.validate()?;
        self.check_category(company_id, input.category_id.as_deref())
            .await?;

        let id = new_id();
        let now = Utc::now();

        debug!(id = %id, name = %input.name, "Creating product");

        sqlx::query(
            "INSERT INTO products (id, company_id, name, unit, category_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(company_id)
        .bind(input.name.trim())
        .bind(input.unit.trim())
        .bind(input.category_id.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(company_id, &id).await
    }

    pub async fn update(
        &self,
        company_id: &str,
        id: &str,
        input: &ProductInput,
    ) -> DbResult<Product> {
        input.validate()?;
        self.check_category(company_id, input.category_id.as_deref())
            .await?;

        debug!(id = %id, name = %input.name, "Updating product");

        let result = sqlx::query(
            "UPDATE products SET name = ?, unit = ?, category_id = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
        )
        .bind(input.name.trim())
        .bind(input.unit.trim())
        .bind(input.category_id.as_deref())
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

    /// Deletes a product. Fails with a foreign key violation while batches
    /// or order lines still reference it.
    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }
        Ok(())
    }

    async fn check_category(&self, company_id: &str, category_id: Option<&str>) -> DbResult<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let mut conn = self.pool.acquire().await?;
        ensure_exists(&mut conn, "categories", "Category", company_id, category_id).await
    }
}
