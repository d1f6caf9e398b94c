//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Cost 2.50 × 4 bags + cost 5.00 × 10 bags must be exactly 60.00.       │
//! │  With floats, a long purchase order drifts by fractions of a cent.     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    250 cents × 4 = 1000 cents, 500 cents × 10 = 5000 cents              │
//! │    Total: 6000 cents, exactly                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockyard_core::money::Money;
//! use stockyard_core::quantity::Quantity;
//!
//! let cost = Money::from_cents(250); // 2.50 per bag
//! let line = cost.times(Quantity::from_units(4));
//! assert_eq!(line.cents(), 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::quantity::{Quantity, MILLI_PER_UNIT};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: balances and refunds may go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as cents**: the dashboard converts to a display string
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use stockyard_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts, only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Multiplies a unit price by a fixed-point quantity.
    ///
    /// Quantities carry three decimals, so the product is rounded back to
    /// whole cents (half away from zero). Saturates at the `i64` bounds; use
    /// [`Money::checked_times`] where an overflow must be reported.
    ///
    /// ## Example
    /// ```rust
    /// use stockyard_core::money::Money;
    /// use stockyard_core::quantity::Quantity;
    ///
    /// // 1.5 cu.m of gravel at 33.33 per cu.m = 49.995 → 50.00
    /// let line = Money::from_cents(3333).times(Quantity::from_milli(1500));
    /// assert_eq!(line.cents(), 5000);
    /// ```
    pub fn times(&self, qty: Quantity) -> Money {
        let rounded = self.times_wide(qty);
        let clamped = rounded.clamp(i64::MIN as i128, i64::MAX as i128);
        Money(clamped as i64)
    }

    /// Like [`Money::times`], but `None` when the product leaves `i64`.
    pub fn checked_times(&self, qty: Quantity) -> Option<Money> {
        i64::try_from(self.times_wide(qty)).ok().map(Money)
    }

    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds up amounts, failing with [`CoreError::AmountOverflow`] instead
    /// of wrapping.
    ///
    /// ## Example
    /// ```rust
    /// use stockyard_core::money::Money;
    ///
    /// let total = Money::try_sum([Money::from_cents(5000), Money::from_cents(1000)]);
    /// assert_eq!(total.unwrap().cents(), 6000);
    /// assert!(Money::try_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]).is_err());
    /// ```
    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> CoreResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
            .ok_or(CoreError::AmountOverflow)
    }

    fn times_wide(&self, qty: Quantity) -> i128 {
        let raw = self.0 as i128 * qty.milli() as i128;
        let unit = MILLI_PER_UNIT as i128;
        let half = unit / 2;
        if raw >= 0 {
            (raw + half) / unit
        } else {
            (raw - half) / unit
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================
//
// The operators saturate rather than wrap. Totals of user input go through
// `checked_times` / `try_sum` so an overflow is reported, not clamped.

/// Debug-oriented rendering; the dashboard formats for its own locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
