//! Precision-safe decimal types for ledger amounts.
//!
//! The remote program stores every price and amount as a `u64` with six
//! implied decimals. These wrappers convert that representation into
//! `rust_decimal::Decimal` exactly and keep prices from being mixed with
//! amounts in calculations.

use crate::error::{CoreError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Number of implied decimals in on-chain fixed-point values.
pub const FIXED_POINT_DECIMALS: u32 = 6;

fn from_fixed(raw: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(raw), FIXED_POINT_DECIMALS)
}

fn to_fixed(value: Decimal) -> Result<u64> {
    value
        .checked_mul(Decimal::from(10u64.pow(FIXED_POINT_DECIMALS)))
        .and_then(|scaled| scaled.trunc().to_u64())
        .ok_or_else(|| CoreError::OutOfRange(value.to_string()))
}

/// Price with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Price from a raw six-decimal on-chain value.
    #[inline]
    pub fn from_fixed(raw: u64) -> Self {
        Self(from_fixed(raw))
    }

    /// Back to the raw on-chain representation, truncating extra precision.
    pub fn to_fixed(&self) -> Result<u64> {
        to_fixed(self.0)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Calculate basis points difference from another price.
    ///
    /// Returns `None` unless `other` is strictly positive, or on overflow.
    #[inline]
    pub fn bps_from(&self, other: Price) -> Option<Decimal> {
        if !other.is_positive() {
            return None;
        }
        (self.0 - other.0)
            .checked_div(other.0)?
            .checked_mul(Decimal::from(10000))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Sub for Price {
    type Output = Decimal;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Token amount (collateral, principal, exposure) with exact decimal precision.
///
/// Unlike prices, amounts may be negative when they represent P&L.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Amount from a raw six-decimal on-chain value.
    #[inline]
    pub fn from_fixed(raw: u64) -> Self {
        Self(from_fixed(raw))
    }

    pub fn to_fixed(&self) -> Result<u64> {
        to_fixed(self.0)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Clamp negative values to zero.
    #[inline]
    pub fn floor_zero(self) -> Self {
        if self.0.is_sign_negative() {
            Self::ZERO
        } else {
            self
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Amount {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

// Saturating, so running P&L totals stay in range.
impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_fixed_six_decimals() {
        assert_eq!(Price::from_fixed(1_500_000).inner(), dec!(1.5));
        assert_eq!(Amount::from_fixed(1).inner(), dec!(0.000001));
        assert_eq!(Amount::from_fixed(u64::MAX).to_fixed().unwrap(), u64::MAX);
    }

    #[test]
    fn test_to_fixed_truncates() {
        let price = Price::new(dec!(2.0000019));
        assert_eq!(price.to_fixed().unwrap(), 2_000_001);
    }

    #[test]
    fn test_to_fixed_rejects_negative() {
        assert!(Amount::new(dec!(-1)).to_fixed().is_err());
    }

    #[test]
    fn test_price_bps() {
        let p1 = Price::new(dec!(100));
        let p2 = Price::new(dec!(101));

        let bps = p2.bps_from(p1).unwrap();
        assert_eq!(bps, dec!(100));
        assert!(p2.bps_from(Price::ZERO).is_none());
        assert!(p2.bps_from(Price::new(dec!(-1))).is_none());
    }

    #[test]
    fn test_amount_sum_saturates() {
        let max = Amount::new(Decimal::MAX);
        assert_eq!(max + Amount::new(dec!(1)), max);
        assert_eq!(-max - Amount::new(dec!(1)), -max);
    }

    #[test]
    fn test_amount_floor_zero() {
        assert_eq!(Amount::new(dec!(-5)).floor_zero(), Amount::ZERO);
        assert_eq!(Amount::new(dec!(5)).floor_zero(), Amount::new(dec!(5)));
    }

    #[test]
    fn test_amount_serde_transparent() {
        let json = serde_json::to_string(&Amount::new(dec!(12.5))).unwrap();
        assert_eq!(json, "\"12.5\"");
    }
}
