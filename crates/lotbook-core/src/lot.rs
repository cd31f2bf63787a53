//! Lot type representing units held at an optional cost.
//!
//! A [`Lot`] is one entry of an account's [`Inventory`](crate::Inventory):
//! a signed quantity of a commodity, keyed by that commodity and its cost.
//! Lots without a cost are plain balances (cash); lots with a cost are
//! tracked holdings whose reductions must be matched by the booking engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, Cost, CostSpec};

/// Units of a commodity held at an optional cost.
///
/// # Examples
///
/// ```
/// use lotbook_core::{Amount, Cost, Lot};
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let cash = Lot::simple(Amount::new(dec!(1000.00), "USD"));
/// assert!(!cash.is_at_cost());
///
/// let cost = Cost::new(dec!(150.00), "USD", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
/// let stock = Lot::at_cost(Amount::new(dec!(10), "HOOL"), cost);
/// assert_eq!(stock.book_value().unwrap().number, dec!(1500.00));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lot {
    /// The signed quantity held
    pub units: Amount,
    /// The cost basis (if tracked)
    pub cost: Option<Cost>,
}

impl Lot {
    /// Create a lot without cost tracking.
    #[must_use]
    pub const fn simple(units: Amount) -> Self {
        Self { units, cost: None }
    }

    /// Create a lot held at cost.
    #[must_use]
    pub const fn at_cost(units: Amount, cost: Cost) -> Self {
        Self {
            units,
            cost: Some(cost),
        }
    }

    /// Check if the quantity is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.units.is_zero()
    }

    /// Check if this lot carries a cost basis.
    #[must_use]
    pub const fn is_at_cost(&self) -> bool {
        self.cost.is_some()
    }

    /// The commodity of the held units.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.units.currency
    }

    /// The cost commodity, if held at cost.
    #[must_use]
    pub fn cost_currency(&self) -> Option<&str> {
        self.cost.as_ref().map(|c| c.currency.as_str())
    }

    /// Total cost of the held units, if held at cost.
    #[must_use]
    pub fn book_value(&self) -> Option<Amount> {
        self.cost.as_ref().map(|c| c.total_cost(self.units.number))
    }

    /// Whether `units` would move this lot towards zero.
    ///
    /// Zero on either side never opposes.
    #[must_use]
    pub fn is_opposed_by(&self, units: &Amount) -> bool {
        self.units.currency == units.currency
            && ((self.units.is_positive() && units.is_negative())
                || (self.units.is_negative() && units.is_positive()))
    }

    /// Check whether this lot is selected by a cost spec.
    ///
    /// Lots without a cost are never selected.
    #[must_use]
    pub fn matches(&self, spec: &CostSpec) -> bool {
        self.cost.as_ref().is_some_and(|cost| spec.matches(cost))
    }

    /// Check if this lot has the same key (commodity and cost) as another.
    #[must_use]
    pub fn same_key(&self, currency: &str, cost: Option<&Cost>) -> bool {
        self.units.currency == currency && self.cost.as_ref() == cost
    }

    /// Add a signed number of units to this lot.
    pub fn adjust(&mut self, delta: Decimal) {
        self.units.number += delta;
    }
}

impl fmt::Display for Lot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.units)?;
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        Ok(())
    }
}
