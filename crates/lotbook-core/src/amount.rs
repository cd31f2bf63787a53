//! Amount type representing a decimal number with a commodity.
//!
//! An [`Amount`] pairs an exact decimal number with a commodity symbol. Two
//! amounts are *equal* when both parts match exactly, and *close* when the
//! commodity matches and the numbers differ by strictly less than a
//! tolerance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::Symbol;

/// An amount is a quantity paired with a commodity.
///
/// # Examples
///
/// ```
/// use lotbook_core::Amount;
/// use rust_decimal_macros::dec;
///
/// let amount = Amount::new(dec!(100.00), "USD");
/// assert_eq!(amount.number, dec!(100.00));
/// assert_eq!(amount.currency, "USD");
///
/// let other = Amount::new(dec!(100.004), "USD");
/// assert!(amount.is_close(&other, dec!(0.005)));
/// assert_ne!(amount, other);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The decimal quantity
    pub number: Decimal,
    /// The commodity symbol (e.g., "USD", "EUR", "HOOL")
    pub currency: Symbol,
}

impl Amount {
    /// Create a new amount.
    #[must_use]
    pub fn new(number: Decimal, currency: impl Into<Symbol>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }

    /// Create a zero amount with the given commodity.
    #[must_use]
    pub fn zero(currency: impl Into<Symbol>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Check if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.number.is_zero()
    }

    /// Check if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.number.is_sign_positive() && !self.number.is_zero()
    }

    /// Check if the amount is strictly negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.number.is_sign_negative() && !self.number.is_zero()
    }

    /// Get the absolute value of this amount.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(self.number.abs(), self.currency.clone())
    }

    /// Number of decimal places written for this amount.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.number.scale()
    }

    /// Check whether this amount is close to another.
    ///
    /// Returns `false` if the commodities differ; otherwise
    /// `|self - other| < tolerance`.
    #[must_use]
    pub fn is_close(&self, other: &Self, tolerance: Decimal) -> bool {
        self.currency == other.currency && (self.number - other.number).abs() < tolerance
    }

    /// Scale this amount by a per-unit rate, yielding an amount in `currency`.
    ///
    /// Used to turn units into their cost or price weight.
    #[must_use]
    pub fn convert(&self, rate: Decimal, currency: impl Into<Symbol>) -> Self {
        Self::new(self.number * rate, currency)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

/// An amount as written on a price annotation, where the number or the
/// commodity may still be missing.
///
/// Booking fills in whatever is missing: the commodity from the posting's
/// cost, the number from the transaction residual.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncompleteAmount {
    /// The number, if written
    #[serde(default)]
    pub number: Option<Decimal>,
    /// The commodity, if written
    #[serde(default)]
    pub currency: Option<Symbol>,
}

impl IncompleteAmount {
    /// A commodity without a number.
    #[must_use]
    pub fn currency_only(currency: impl Into<Symbol>) -> Self {
        Self {
            number: None,
            currency: Some(currency.into()),
        }
    }

    /// The complete amount, if nothing is missing.
    #[must_use]
    pub fn as_amount(&self) -> Option<Amount> {
        Some(Amount::new(self.number?, self.currency.clone()?))
    }
}

impl From<Amount> for IncompleteAmount {
    fn from(amount: Amount) -> Self {
        Self {
            number: Some(amount.number),
            currency: Some(amount.currency),
        }
    }
}

impl fmt::Display for IncompleteAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.number, &self.currency) {
            (Some(n), Some(c)) => write!(f, "{n} {c}"),
            (Some(n), None) => write!(f, "{n}"),
            (None, Some(c)) => write!(f, "{c}"),
            (None, None) => Ok(()),
        }
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, other: &Amount) -> Amount {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot add amounts with different currencies"
        );
        Amount::new(self.number + other.number, self.currency.clone())
    }
}

impl Sub for &Amount {
    type Output = Amount;

    fn sub(self, other: &Amount) -> Amount {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot subtract amounts with different currencies"
        );
        Amount::new(self.number - other.number, self.currency.clone())
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount::new(-self.number, self.currency.clone())
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        &self + &other
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        &self - &other
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}

impl AddAssign<&Self> for Amount {
    fn add_assign(&mut self, other: &Self) {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot add amounts with different currencies"
        );
        self.number += other.number;
    }
}

impl SubAssign<&Self> for Amount {
    fn sub_assign(&mut self, other: &Self) {
        debug_assert_eq!(
            self.currency, other.currency,
            "Cannot subtract amounts with different currencies"
        );
        self.number -= other.number;
    }
}
