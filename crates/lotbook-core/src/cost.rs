//! Cost and cost specification types.
//!
//! A [`Cost`] is the acquisition price of one unit of a held lot, together
//! with the acquisition date and an optional label. Resolved postings and
//! inventory lots always carry concrete costs.
//!
//! A [`CostSpec`] is what a posting writes between braces before booking. Any
//! field may be missing: on an augmentation the spec is completed into a
//! [`Cost`], on a reduction it acts as a filter selecting held lots.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, Symbol};

/// The acquisition cost of one unit of a lot.
///
/// # Examples
///
/// ```
/// use lotbook_core::Cost;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let cost = Cost::new(dec!(150.00), "USD", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .with_label("lot1");
///
/// assert_eq!(cost.total_cost(dec!(10)).number, dec!(1500.00));
/// assert_eq!(cost.to_string(), "{150.00 USD, 2024-01-15, \"lot1\"}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cost {
    /// Cost per unit
    pub number: Decimal,
    /// Commodity the cost is expressed in
    pub currency: Symbol,
    /// Acquisition date of the lot
    pub date: NaiveDate,
    /// Lot label (optional, for explicit lot identification)
    pub label: Option<String>,
}

impl Cost {
    /// Create a new cost.
    #[must_use]
    pub fn new(number: Decimal, currency: impl Into<Symbol>, date: NaiveDate) -> Self {
        Self {
            number,
            currency: currency.into(),
            date,
            label: None,
        }
    }

    /// Add a label to this cost.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The per-unit cost as an amount.
    #[must_use]
    pub fn as_amount(&self) -> Amount {
        Amount::new(self.number, self.currency.clone())
    }

    /// Total cost of `units` units of this lot.
    #[must_use]
    pub fn total_cost(&self, units: Decimal) -> Amount {
        Amount::new(units * self.number, self.currency.clone())
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}, {}", self.number, self.currency, self.date)?;
        if let Some(label) = &self.label {
            write!(f, ", \"{label}\"")?;
        }
        write!(f, "}}")
    }
}

/// A possibly incomplete cost as written on a posting.
///
/// # Matching Rules
///
/// A `CostSpec` matches a `Cost` if every field it specifies matches:
/// - `number_per` must equal the cost's number
/// - `currency` must equal the cost's currency
/// - `date` must equal the cost's date
/// - `label` must equal the cost's label
///
/// `number_total` and `merge` do not take part in matching.
///
/// # Examples
///
/// ```
/// use lotbook_core::{Cost, CostSpec};
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let jan = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let cost = Cost::new(dec!(150.00), "USD", jan);
///
/// assert!(CostSpec::empty().with_date(jan).matches(&cost));
/// assert!(!CostSpec::empty().with_currency("EUR").matches(&cost));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CostSpec {
    /// Cost per unit (if specified)
    pub number_per: Option<Decimal>,
    /// Total cost (if specified)
    pub number_total: Option<Decimal>,
    /// Commodity of the cost (if specified)
    pub currency: Option<Symbol>,
    /// Acquisition date (if specified)
    pub date: Option<NaiveDate>,
    /// Lot label (if specified)
    pub label: Option<String>,
    /// Merge-cost marker (`{*}`): average the matched lots
    #[serde(default)]
    pub merge: bool,
}

impl CostSpec {
    /// Create an empty cost spec, matching every lot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the per-unit cost.
    #[must_use]
    pub const fn with_number_per(mut self, number: Decimal) -> Self {
        self.number_per = Some(number);
        self
    }

    /// Set the total cost.
    #[must_use]
    pub const fn with_number_total(mut self, number: Decimal) -> Self {
        self.number_total = Some(number);
        self
    }

    /// Set the cost commodity.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<Symbol>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Set the acquisition date.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the merge marker.
    #[must_use]
    pub const fn with_merge(mut self) -> Self {
        self.merge = true;
        self
    }

    /// Check if nothing is specified.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.number_per.is_none()
            && self.number_total.is_none()
            && self.currency.is_none()
            && self.date.is_none()
            && self.label.is_none()
            && !self.merge
    }

    /// Check whether this spec selects the given cost.
    #[must_use]
    pub fn matches(&self, cost: &Cost) -> bool {
        self.number_per.map_or(true, |n| n == cost.number)
            && self.currency.as_ref().map_or(true, |c| *c == cost.currency)
            && self.date.map_or(true, |d| d == cost.date)
            && self
                .label
                .as_ref()
                .map_or(true, |l| cost.label.as_ref() == Some(l))
    }

    /// Per-unit number for `units` units, if the spec pins one down.
    ///
    /// With both a per-unit and a total number, the total is treated as an
    /// extra amount spread over all units.
    #[must_use]
    pub fn per_unit(&self, units: Decimal) -> Option<Decimal> {
        match (self.number_per, self.number_total) {
            (per, Some(total)) => {
                let units = units.abs();
                if units.is_zero() {
                    return per;
                }
                Some((total + per.unwrap_or_default() * units) / units)
            }
            (Some(per), None) => Some(per),
            (None, None) => None,
        }
    }

    /// Complete this spec into a concrete cost for an augmentation of
    /// `units` units dated `date`.
    ///
    /// Returns `None` if the number or the commodity cannot be determined.
    #[must_use]
    pub fn complete(&self, units: Decimal, date: NaiveDate) -> Option<Cost> {
        Some(Cost {
            number: self.per_unit(units)?,
            currency: self.currency.clone()?,
            date: self.date.unwrap_or(date),
            label: self.label.clone(),
        })
    }
}

impl From<&Cost> for CostSpec {
    fn from(cost: &Cost) -> Self {
        Self {
            number_per: Some(cost.number),
            number_total: None,
            currency: Some(cost.currency.clone()),
            date: Some(cost.date),
            label: cost.label.clone(),
            merge: false,
        }
    }
}

impl fmt::Display for CostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        match (self.number_per, self.number_total, &self.currency) {
            (Some(per), Some(total), Some(c)) => parts.push(format!("{per} # {total} {c}")),
            (Some(per), None, Some(c)) => parts.push(format!("{per} {c}")),
            (None, Some(total), Some(c)) => parts.push(format!("# {total} {c}")),
            (per, total, currency) => {
                if let Some(n) = per {
                    parts.push(n.to_string());
                }
                if let Some(n) = total {
                    parts.push(format!("# {n}"));
                }
                if let Some(c) = currency {
                    parts.push(c.to_string());
                }
            }
        }
        if let Some(d) = self.date {
            parts.push(d.to_string());
        }
        if let Some(l) = &self.label {
            parts.push(format!("\"{l}\""));
        }
        if self.merge {
            parts.push("*".to_string());
        }

        write!(f, "{{{}}}", parts.join(", "))
    }
}
