//! # Payments
//!
//! Payment status aggregation and post-dated cheque handling, shared by
//! purchase and sales orders.
//!
//! ## Status Rule
//! ```text
//!   paid ≤ 0        → unpaid
//!   paid ≥ total    → paid
//!   otherwise       → partial
//! ```
//! The same rule runs after an add and after a delete, always over the sum
//! of the payments that remain on the order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentStatus, PaymentType, SalesOrderPayment};
use crate::validation::{validate_optional_text, validate_payment_amount};

// =============================================================================
// Input
// =============================================================================

/// Body of an add-payment form.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub payment_type: PaymentType,
    /// Drawee bank for cheques and transfers. Sales payments only.
    pub bank: Option<String>,
    /// Cheque date. Required for PDCs.
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

impl PaymentInput {
    /// Validates a sales order payment.
    ///
    /// ## Rules
    /// - 0 < amount ≤ MAX_PAYMENT_CENTS
    /// - PDC requires a due date
    pub fn validate(&self) -> CoreResult<()> {
        validate_payment_amount(self.amount_cents).map_err(|e| {
            CoreError::InvalidPaymentAmount {
                reason: e.to_string(),
            }
        })?;
        validate_optional_text("bank", self.bank.as_deref())?;

        if self.payment_type == PaymentType::Pdc && self.due_date.is_none() {
            return Err(ValidationError::Required {
                field: "due_date".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Validates a purchase order payment. Supplier payments have no cheque
    /// tracking, so PDC is not accepted there.
    pub fn validate_for_purchase(&self) -> CoreResult<()> {
        if self.payment_type == PaymentType::Pdc {
            return Err(ValidationError::NotAllowed {
                field: "payment_type".to_string(),
                allowed: vec![
                    PaymentType::Cash.to_string(),
                    PaymentType::Cheque.to_string(),
                    PaymentType::BankTransfer.to_string(),
                ],
            }
            .into());
        }
        self.validate()
    }
}

// =============================================================================
// Status
// =============================================================================

/// Payment status for an order of `total` with `paid` received so far.
///
/// ## Example
/// ```rust
/// use stockyard_core::payments::payment_status;
/// use stockyard_core::{Money, PaymentStatus};
///
/// let total = Money::from_cents(10_000);
/// assert_eq!(payment_status(total, Money::zero()), PaymentStatus::Unpaid);
/// assert_eq!(payment_status(total, Money::from_cents(4_000)), PaymentStatus::Partial);
/// assert_eq!(payment_status(total, Money::from_cents(10_000)), PaymentStatus::Paid);
/// ```
pub fn payment_status(total: Money, paid: Money) -> PaymentStatus {
    if !paid.is_positive() {
        PaymentStatus::Unpaid
    } else if paid >= total {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Partial
    }
}

/// Totals shown next to an order's payment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSummary {
    pub total_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub status: PaymentStatus,
}

/// Summarizes the payments recorded against an order.
pub fn summarize(total: Money, amounts: impl IntoIterator<Item = Money>) -> PaymentSummary {
    let paid: Money = amounts.into_iter().sum();
    PaymentSummary {
        total_cents: total.cents(),
        paid_cents: paid.cents(),
        balance_cents: (total - paid).cents(),
        status: payment_status(total, paid),
    }
}

// =============================================================================
// Post-Dated Cheques
// =============================================================================

/// Marking a PDC as received turns it into an ordinary cheque. Nothing else
/// about the payment changes.
pub fn mark_received(payment: &SalesOrderPayment) -> CoreResult<PaymentType> {
    if payment.payment_type == PaymentType::Pdc {
        Ok(PaymentType::Cheque)
    } else {
        Err(CoreError::NotPostDated {
            payment_id: payment.id.clone(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
