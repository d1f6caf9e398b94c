//! # Quantity Module
//!
//! Fixed-point stock quantities.
//!
//! Materials are sold in mixed units: cement by the bag, gravel and sand by
//! the cubic metre. An RMC order of 10 cu.m needs 1.5 cu.m of gravel, so
//! whole-number quantities are not enough. Like [`Money`](crate::Money),
//! quantities are integers underneath: thousandths of a unit.
//!
//! ```text
//!   1.5 cu.m   ──►  Quantity(1500)
//!   200 bags   ──►  Quantity(200000)
//!   0.001      ──►  Quantity(1)      (smallest step)
//! ```
//!
//! On the wire a quantity is a plain JSON number (`1.5`), rounded to the
//! nearest thousandth when read.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Thousandths per whole unit.
pub const MILLI_PER_UNIT: i64 = 1000;

/// A stock quantity with three decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * MILLI_PER_UNIT)
    }

    /// Returns the raw value in thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Scales by `numerator / denominator`, rounding half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use stockyard_core::quantity::Quantity;
    ///
    /// // 1.5 cu.m of gravel per 10 cu.m of concrete
    /// let gravel = Quantity::from_units(20).scale(15, 100);
    /// assert_eq!(gravel, Quantity::from_units(3));
    /// ```
    pub fn scale(&self, numerator: i64, denominator: i64) -> Quantity {
        debug_assert!(denominator > 0);
        let raw = self.0 as i128 * numerator as i128;
        let den = denominator as i128;
        let rounded = if raw >= 0 {
            (raw + den / 2) / den
        } else {
            (raw - den / 2) / den
        };
        Quantity(rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Converts to a float (display and JSON only).
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MILLI_PER_UNIT as f64
    }

    /// Converts from a float, rounding to the nearest thousandth.
    pub fn from_f64(value: f64) -> Self {
        Quantity((value * MILLI_PER_UNIT as f64).round() as i64)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / MILLI_PER_UNIT;
        let frac = abs % MILLI_PER_UNIT;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("quantity must be a finite number"));
        }
        Ok(Quantity::from_f64(value))
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(self.0.saturating_neg())
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), |acc, q| acc + q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_saturates() {
        let max = Quantity::from_milli(i64::MAX);
        assert_eq!((max + Quantity::from_milli(1)).milli(), i64::MAX);
        assert_eq!((Quantity::from_milli(i64::MIN) - Quantity::from_milli(1)).milli(), i64::MIN);
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Quantity::from_milli(1500).to_string(), "1.5");
        assert_eq!(Quantity::from_units(200).to_string(), "200");
        assert_eq!(Quantity::from_milli(1).to_string(), "0.001");
        assert_eq!(Quantity::from_milli(-2250).to_string(), "-2.25");
    }

    #[test]
    fn test_scale_rounds_half_away_from_zero() {
        // 0.005 × 0.1 = 0.0005 → 0.001
        assert_eq!(Quantity::from_milli(5).scale(1, 10), Quantity::from_milli(1));
        assert_eq!(Quantity::from_milli(-5).scale(1, 10), Quantity::from_milli(-1));
        assert_eq!(Quantity::from_units(10).scale(10, 1), Quantity::from_units(100));
        assert_eq!(Quantity::from_milli(i64::MAX).scale(10, 1).milli(), i64::MAX);
    }

    #[test]
    fn test_json_is_a_plain_number() {
        let json = serde_json::to_string(&Quantity::from_milli(1500)).unwrap();
        assert_eq!(json, "1.5");

        let parsed: Quantity = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, Quantity::from_units(3));

        let parsed: Quantity = serde_json::from_str("0.0004").unwrap();
        assert_eq!(parsed, Quantity::zero());
    }

    #[test]
    fn test_ordering_and_sum() {
        let total: Quantity = vec![Quantity::from_units(1), Quantity::from_milli(500)]
            .into_iter()
            .sum();
        assert_eq!(total, Quantity::from_milli(1500));
        assert!(Quantity::from_units(1) > Quantity::from_milli(999));
    }
}
