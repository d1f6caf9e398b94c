//! # User Repository
//!
//! Dashboard users of a company. Emails are unique per company and stored
//! lowercased. Authentication happens elsewhere; this table only carries the
//! role and the active flag the server checks.

use chrono::Utc;
use sqlx::SqlitePool;
use stockyard_core::input::UserInput;
use stockyard_core::{Page, PageRequest, User};
use tracing::debug;

use super::{fetch_page, like_pattern, new_id, SearchFilter};
use crate::error::{DbError, DbResult};

const ENTITY: &str = "User";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// `search` matches name or email.
    pub async fn list(
        &self,
        company_id: &str,
        filter: &SearchFilter,
        request: PageRequest,
    ) -> DbResult<Page<User>> {
        let company = company_id.to_string();
        let search = filter.search.clone();
        fetch_page(&self.pool, "*", "FROM users", "name ASC", request, |qb| {
            qb.push(" WHERE company_id = ").push_bind(company.clone());
            if let Some(term) = search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                qb.push(" AND (name LIKE ")
                    .push_bind(like_pattern(term))
                    .push(" ESCAPE '\\' OR email LIKE ")
                    .push_bind(like_pattern(term))
                    .push(" ESCAPE '\\')");
            }
        })
        .await
    }

    pub async fn get(&self, company_id: &str, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE company_id = ? AND id = ?")
            .bind(company_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(ENTITY, id))
    }

    pub async fn create(&self, company_id: &str, input: &UserInput) -> DbResult<User> {
        input.validate()?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            company_id: company_id.to_string(),
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            role: input.role,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, email = %user.email, "Creating user");

        sqlx::query(
            "INSERT INTO users (id, company_id, name, email, role, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.company_id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_email(e, &user.email))?;

        Ok(user)
    }

    pub async fn update(&self, company_id: &str, id: &str, input: &UserInput) -> DbResult<User> {
        input.validate()?;
        let email = normalize_email(&input.email);

        debug!(id = %id, email = %email, "Updating user");

        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, role = ?, is_active = ?, updated_at = ?
             WHERE company_id = ? AND id = ?",
        )
        .bind(input.name.trim())
        .bind(&email)
        .bind(input.role)
        .bind(input.is_active)
        .bind(Utc::now())
        .bind(company_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_email(e, &email))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(ENTITY, id));
        }

        self.get(company_id, id).await
    }

    pub async fn delete(&self, company_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE company_id = ? AND id = ?")
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

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn duplicate_email(err: sqlx::Error, email: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("email", email),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;
    use stockyard_core::UserRole;

    fn input(name: &str, email: &str, role: UserRole) -> UserInput {
        UserInput {
            name: name.to_string(),
            email: email.to_string(),
            role,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_email() {
        let db = test_db().await;
        let user = db
            .users()
            .create(COMPANY, &input("Dana", " Dana@Example.com ", UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(user.email, "dana@example.com");
        assert!(user.role.is_admin());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let db = test_db().await;
        db.users()
            .create(COMPANY, &input("Dana", "dana@example.com", UserRole::User))
            .await
            .unwrap();
        let err = db
            .users()
            .create(COMPANY, &input("Other", "DANA@example.com", UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = test_db().await;
        let user = db
            .users()
            .create(COMPANY, &input("Dana", "dana@example.com", UserRole::User))
            .await
            .unwrap();

        let mut change = input("Dana", "dana@example.com", UserRole::User);
        change.is_active = false;
        let updated = db.users().update(COMPANY, &user.id, &change).await.unwrap();
        assert!(!updated.is_active);
    }
}
