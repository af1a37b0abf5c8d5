//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings and formatting without exponent notation.
//! All power-of-ten scaling goes through integer mantissa/scale manipulation so no
//! value ever passes through a binary float.

use crate::error::CoreError;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest scale rust_decimal can represent.
pub const MAX_SCALE: u32 = 28;

/// Lossless decimal numeric type for financial calculations.
///
/// Serializes to a JSON string in fixed-point notation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Exact `10^exponent`.
    ///
    /// # Errors
    /// Fails when the result does not fit in 96 bits of mantissa or needs more than
    /// 28 fractional digits.
    pub fn pow10(exponent: i32) -> Result<Self, CoreError> {
        Self::scaled(1, exponent)
    }

    /// Exact `mantissa * 10^exponent`.
    pub fn scaled(mantissa: i128, exponent: i32) -> Result<Self, CoreError> {
        let overflow = || CoreError::invalid("decimal", format!("{}e{}", mantissa, exponent));
        if exponent >= 0 {
            let factor = 10i128
                .checked_pow(exponent.unsigned_abs())
                .ok_or_else(overflow)?;
            let value = mantissa.checked_mul(factor).ok_or_else(overflow)?;
            RustDecimal::try_from_i128_with_scale(value, 0)
                .map(Decimal)
                .map_err(|_| overflow())
        } else {
            let scale = exponent.unsigned_abs();
            if scale > MAX_SCALE {
                return Err(overflow());
            }
            RustDecimal::try_from_i128_with_scale(mantissa, scale)
                .map(Decimal)
                .map_err(|_| overflow())
        }
    }

    pub fn checked_add(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    /// Checked multiplication; `None` on overflow.
    pub fn checked_mul(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// Checked division; `None` on overflow or division by zero.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// Returns the value as an integer when it has no fractional part.
    pub fn to_i128_exact(&self) -> Option<i128> {
        if self.0.fract().is_zero() {
            rust_decimal::prelude::ToPrimitive::to_i128(&self.0.trunc())
        } else {
            None
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        let test_cases = vec![
            "123.456",
            "0.0001",
            "1000000",
            "-123.456",
            "0",
            "999999999.999999999",
        ];

        for s in test_cases {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let formatted = decimal.to_canonical_string();
            let reparsed = Decimal::from_str_canonical(&formatted).expect("reparse failed");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        for s in ["0.00000001", "0.000000000000001", "1000000000000000000000000"] {
            let formatted = Decimal::from_str_canonical(s).unwrap().to_canonical_string();
            assert!(!formatted.contains('e') && !formatted.contains('E'));
            assert_eq!(formatted, s);
        }
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = Decimal::from_str_canonical("10.5").unwrap();
        let b = Decimal::from_str_canonical("2.5").unwrap();

        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_decimal_json_serialization_is_string() {
        let decimal = Decimal::from_str_canonical("123.456").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert!(json.is_string());
        assert_eq!(json.to_string(), "\"123.456\"");

        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, decimal);
    }

    #[test]
    fn test_pow10() {
        assert_eq!(Decimal::pow10(0).unwrap().to_canonical_string(), "1");
        assert_eq!(Decimal::pow10(3).unwrap().to_canonical_string(), "1000");
        assert_eq!(Decimal::pow10(-5).unwrap().to_canonical_string(), "0.00001");
        assert!(Decimal::pow10(29).is_err());
        assert!(Decimal::pow10(-29).is_err());
    }

    #[test]
    fn test_scaled() {
        assert_eq!(
            Decimal::scaled(-1_000_000, -5).unwrap().to_canonical_string(),
            "-10"
        );
        assert_eq!(
            Decimal::scaled(-1_000_000_000, 15)
                .unwrap()
                .to_canonical_string(),
            "-1000000000000000000000000"
        );
    }

    #[test]
    fn test_to_i128_exact() {
        assert_eq!(Decimal::from_str_canonical("42").unwrap().to_i128_exact(), Some(42));
        assert_eq!(Decimal::from_str_canonical("42.5").unwrap().to_i128_exact(), None);
    }

    #[test]
    fn test_decimal_ordering() {
        let a = Decimal::from_str_canonical("10").unwrap();
        let b = Decimal::from_str_canonical("20").unwrap();
        assert!(a < b);
        assert!(b > a);
        assert_eq!(a, a);
    }
}
