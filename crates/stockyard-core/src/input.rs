//! # Form Inputs
//!
//! Request bodies for the simple CRUD screens. Each input validates itself
//! before the repository issues a write. Order-shaped inputs live next to
//! their rules in [`purchasing`](crate::purchasing), [`sales`](crate::sales),
//! [`payments`](crate::payments) and [`rmc`](crate::rmc).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::quantity::Quantity;
use crate::types::UserRole;
use crate::validation::{
    validate_email, validate_name, validate_optional_text, validate_price_cents,
    validate_quantity, ValidationResult,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryInput {
    pub name: String,
}

impl CategoryInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    pub unit: String,
    pub category_id: Option<String>,
}

impl ProductInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_name("unit", &self.unit)
    }
}

/// Manual stock entry: a batch that did not come from a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockInput {
    pub product_id: String,
    pub cost_cents: i64,
    /// Defaults to the cost when omitted.
    pub selling_price_cents: Option<i64>,
    #[ts(type = "number")]
    pub quantity: Quantity,
    /// Defaults to today when omitted.
    #[ts(as = "Option<String>")]
    pub purchase_date: Option<NaiveDate>,
}

impl StockInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("product_id", &self.product_id)?;
        validate_price_cents("cost_cents", self.cost_cents)?;
        if let Some(price) = self.selling_price_cents {
            validate_price_cents("selling_price_cents", price)?;
        }
        validate_quantity("quantity", self.quantity)
    }

    pub fn selling_price_or_cost(&self) -> i64 {
        self.selling_price_cents.unwrap_or(self.cost_cents)
    }
}

/// Editable pricing of an existing batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockPriceInput {
    pub cost_cents: i64,
    pub selling_price_cents: i64,
}

impl StockPriceInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_price_cents("cost_cents", self.cost_cents)?;
        validate_price_cents("selling_price_cents", self.selling_price_cents)
    }
}

/// Missing report or manual removal against one batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAdjustmentInput {
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub reason: Option<String>,
}

impl StockAdjustmentInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_quantity("quantity", self.quantity)?;
        validate_optional_text("reason", self.reason.as_deref())
    }
}

/// Customer or supplier form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartyInput {
    pub name: String,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

impl PartyInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_optional_text("contact_number", self.contact_number.as_deref())?;
        validate_optional_text("address", self.address.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserInput {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name("name", &self.name)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettingsInput {
    pub company_name: Option<String>,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_contact: Option<String>,
    pub billing_name: Option<String>,
    pub billing_address: Option<String>,
    pub billing_contact: Option<String>,
}

impl SettingsInput {
    pub fn validate(&self) -> ValidationResult<()> {
        let fields = [
            ("company_name", &self.company_name),
            ("shipping_name", &self.shipping_name),
            ("shipping_address", &self.shipping_address),
            ("shipping_contact", &self.shipping_contact),
            ("billing_name", &self.billing_name),
            ("billing_address", &self.billing_address),
            ("billing_contact", &self.billing_contact),
        ];
        for (field, value) in fields {
            validate_optional_text(field, value.as_deref())?;
        }
        Ok(())
    }
}
