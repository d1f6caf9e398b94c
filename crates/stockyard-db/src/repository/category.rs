//! # Category Repository
//!
//! Product groupings. Names are unique per company; deleting a category
//! leaves its products uncategorised.

use chrono::Utc;
use sqlx::SqlitePool;
use stockyard_core::input::CategoryInput;
use stockyard_core::{Category, Page, PageRequest};
use tracing::debug;

use super::{fetch_page, new_id, push_search, SearchFilter};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "Category";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    pub async fn list(
        &self,
        company_id: &str,
        filter: &SearchFilter,
        request: PageRequest,
    ) -> DbResult<Page<Category>> {
        debug!(company_id = %company_id, search = ?filter.search, "Listing categories");

        let company = company_id.to_string();
        let search = filter.search.clone();
        fetch_page(
            &self.pool,
            "*",
            "FROM categories",
            "name ASC",
            request,
            |qb| {
                qb.push(" WHERE company_id = ").push_bind(company.clone());
                push_search(qb, "name", search.as_deref());
            },
        )
        .await
    }

    /// Every category of the company, for dropdowns.
    pub async fn all(&self, company_id: &str) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE company_id = ? ORDER BY name ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn create(&self, company_id: &str, input: &CategoryInput) -> DbResult<Category> {
        input.validate()?;

        let now = Utc::now();
        let category = Category {
            id: new_id(),
            company_id: company_id.to_string(),
            name: input.name.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %category.id, name = %category.name, "Creating category");

        sqlx::query(
            "INSERT INTO categories (id, company_id, name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&category.id)
        .bind(&category.company_id)
        .bind(&category.name)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &category.name))?;

        Ok(category)
    }

    pub async fn update(
        &self,
        company_id: &str,
        id: &str,
        input: &CategoryInput,
    ) -> DbResult<Category> {
        input.validate()?;
        let name = input.name.trim().to_string();

        debug!(id = %id, name = %name, "Updating category");

        let result = sqlx::query(
            "UPDATE categories SET name = ?, updated_at = ? WHERE company_id = ? AND id = ?",
        )
        .bind(&name)
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }

        self.get(company_id, id).await
    }

    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting category");

        let result = sqlx::query("DELETE FROM categories WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }
        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("name", name),
        other => other,
    }
}
