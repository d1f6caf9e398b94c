//! # Settings Repository
//!
//! One row of document metadata per company. Reading a company that never
//! saved settings yields blank settings rather than NotFound.

use chrono::Utc;
use sqlx::SqlitePool;
use stockyard_core::input::SettingsInput;
use stockyard_core::Settings;
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, company_id: &str) -> DbResult<Settings> {
        let settings =
            sqlx::query_as::<_, Settings>("SELECT * FROM settings WHERE company_id = ?")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(settings.unwrap_or_else(|| Settings::empty(company_id)))
    }

    /// Replaces the company's settings.
    pub async fn save(&self, company_id: &str, input: &SettingsInput) -> DbResult<Settings> {
        input.validate()?;

        debug!(company_id = %company_id, "Saving settings");

        sqlx::query(
            "INSERT INTO settings (
                 company_id, company_name,
                 shipping_name, shipping_address, shipping_contact,
                 billing_name, billing_address, billing_contact,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (company_id) DO UPDATE SET
                 company_name = excluded.company_name,
                 shipping_name = excluded.shipping_name,
                 shipping_address = excluded.shipping_address,
                 shipping_contact = excluded.shipping_contact,
                 billing_name = excluded.billing_name,
                 billing_address = excluded.billing_address,
                 billing_contact = excluded.billing_contact,
                 updated_at = excluded.updated_at",
        )
        .bind(company_id)
        .bind(&input.company_name)
        .bind(&input.shipping_name)
        .bind(&input.shipping_address)
        .bind(&input.shipping_contact)
        .bind(&input.billing_name)
        .bind(&input.billing_address)
        .bind(&input.billing_contact)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(company_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::*;

    #[tokio::test]
    async fn test_blank_then_saved() {
        let db = test_db().await;
        let blank = db.settings().get(COMPANY).await.unwrap();
        assert_eq!(blank.company_id, COMPANY);
        assert!(blank.company_name.is_none());
        assert!(blank.updated_at.is_none());

        let input = SettingsInput {
            company_name: Some("Stockyard Builders Supply".to_string()),
            billing_address: Some("12 Quarry Road".to_string()),
            ..SettingsInput::default()
        };
        let saved = db.settings().save(COMPANY, &input).await.unwrap();
        assert_eq!(saved.company_name.as_deref(), Some("Stockyard Builders Supply"));
        assert!(saved.updated_at.is_some());

        let second = SettingsInput {
            company_name: Some("Renamed".to_string()),
            ..SettingsInput::default()
        };
        let saved = db.settings().save(COMPANY, &second).await.unwrap();
        assert_eq!(saved.company_name.as_deref(), Some("Renamed"));
        assert!(saved.billing_address.is_none());

        // Other companies are untouched
        assert!(db.settings().get(OTHER_COMPANY).await.unwrap().company_name.is_none());
    }
}
