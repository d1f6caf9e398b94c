//! # Party Repository
//!
//! Customers and suppliers share one shape and one repository; the
//! [`PartyKind`] picks the table.

use chrono::Utc;
use sqlx::SqlitePool;
use stockyard_core::input::PartyInput;
use stockyard_core::{Page, PageRequest, Party, PartyKind};
use tracing::debug;

use super::{fetch_page, like_pattern, new_id, SearchFilter};
use crate::error::{DbError, DbResult};

/// Repository for customers or suppliers.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
    kind: PartyKind,
}

impl PartyRepository {
    pub fn new(pool: SqlitePool, kind: PartyKind) -> Self {
        PartyRepository { pool, kind }
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    fn table(&self) -> &'static str {
        table_for(self.kind)
    }

    /// Lists parties by name. `search` matches name or contact number.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &SearchFilter,
        request: PageRequest,
    ) -> DbResult<Page<Party>> {
        debug!(kind = self.kind.as_str(), company_id = %company_id, "Listing parties");

        let company = company_id.to_string();
        let search = filter.search.clone();
        fetch_page(
            &self.pool,
            "*",
            &format!("FROM {}", self.table()),
            "name ASC",
            request,
            |qb| {
                qb.push(" WHERE company_id = ").push_bind(company.clone());
                if let Some(term) = search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                    qb.push(" AND (name LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\' OR contact_number LIKE ")
                        .push_bind(like_pattern(term))
                        .push(" ESCAPE '\\')");
                }
            },
        )
        .await
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<Party> {
        sqlx::query_as::<_, Party>(&format!(
            "SELECT * FROM {} WHERE company_id = ? AND id = ?",
            self.table()
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found(self.kind.as_str(), id))
    }

    pub async fn create(&self, company_id: &str, input: &PartyInput) -> DbResult<Party> {
        input.validate()?;

        let now = Utc::now();
        let party = Party {
            id: new_id(),
            company_id: company_id.to_string(),
            name: input.name.trim().to_string(),
            contact_number: input.contact_number.clone(),
            address: input.address.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(kind = self.kind.as_str(), id = %party.id, name = %party.name, "Creating party");

        sqlx::query(&format!(
            "INSERT INTO {} (id, company_id, name, contact_number, address, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table()
        ))
        .bind(&party.id)
        .bind(&party.company_id)
        .bind(&party.name)
        .bind(&party.contact_number)
        .bind(&party.address)
        .bind(party.created_at)
        .bind(party.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(party)
    }

    pub async fn update(&self, company_id: &str, id: &str, input: &PartyInput) -> DbResult<Party> {
        input.validate()?;

        debug!(kind = self.kind.as_str(), id = %id, "Updating party");

        let result = sqlx::query(&format!(
            "UPDATE {} SET name = ?, contact_number = ?, address = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
            self.table()
        ))
        .bind(input.name.trim())
        .bind(&input.contact_number)
        .bind(&input.address)
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.as_str(), id));
        }

        self.get(company_id, id).await
    }

    /// Deletes a party. Fails with a foreign key violation while orders
    /// reference it.
    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        debug!(kind = self.kind.as_str(), id = %id, "Deleting party");

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE company_id = ? AND id = ?",
            self.table()
        ))
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(self.kind.as_str(), id));
        }
        Ok(())
    }
}

pub(crate) const fn table_for(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => "customers",
        PartyKind::Supplier => "suppliers",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;

    fn input(name: &str, contact: Option<&str>) -> PartyInput {
        PartyInput {
            name: name.to_string(),
            contact_number: contact.map(str::to_string),
            address: Some("Quarry Road".to_string()),
        }
    }

    #[tokio::test]
    async fn test_customers_and_suppliers_are_separate() {
        let db = test_db().await;
        let customer = db
            .customers()
            .create(COMPANY, &input("Acme Builders", None))
            .await
            .unwrap();

        assert!(db.customers().get(COMPANY, &customer.id).await.is_ok());
        let err = db.suppliers().get(COMPANY, &customer.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Supplier"));
    }

    #[tokio::test]
    async fn test_search_by_name_or_contact() {
        let db = test_db().await;
        let repo = db.suppliers();
        repo.create(COMPANY, &input("North Quarry", Some("0917-555-0101")))
            .await
            .unwrap();
        repo.create(COMPANY, &input("Cement Depot", Some("0917-555-0202")))
            .await
            .unwrap();

        let by_name = SearchFilter {
            search: Some("quarry".to_string()),
        };
        let page = repo.list(COMPANY, &by_name, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "North Quarry");

        let by_contact = SearchFilter {
            search: Some("0202".to_string()),
        };
        let page = repo.list(COMPANY, &by_contact, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Cement Depot");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = test_db().await;
        let repo = db.customers();
        let created = repo.create(COMPANY, &input("Acme", None)).await.unwrap();

        let updated = repo
            .update(COMPANY, &created.id, &input("Acme Builders", Some("555")))
            .await
            .unwrap();
        assert_eq!(updated.name, "Acme Builders");
        assert_eq!(updated.contact_number.as_deref(), Some("555"));

        repo.delete(COMPANY, &created.id).await.unwrap();
        assert!(repo.delete(COMPANY, &created.id).await.is_err());
    }
}
