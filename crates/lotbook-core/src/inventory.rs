//! Inventory type representing the lots held by one account.
//!
//! An [`Inventory`] maps `(commodity, cost)` keys to signed quantities. It is
//! stored as a vector of [`Lot`]s so insertion order is preserved, which the
//! FIFO and LIFO methods use to break ties between lots acquired on the same
//! day.
//!
//! Two invariants hold after every mutation:
//! - no two lots share the same key (augmentations merge into the existing lot)
//! - no lot is held at exactly zero (it is removed instead)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Amount, Cost, CostSpec, Lot};

/// Booking method determines how lots are matched when reducing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingMethod {
    /// Exactly one lot must match the reduction's cost spec.
    #[default]
    Strict,
    /// Like STRICT, and the reduction may not exceed the matched lot.
    StrictWithSize,
    /// First In, First Out. Oldest lots are reduced first.
    Fifo,
    /// Last In, First Out. Newest lots are reduced first.
    Lifo,
    /// Highest In, First Out. Lots with the highest per-unit cost are
    /// reduced first.
    Hifo,
    /// Matched lots are merged at their average cost before reducing.
    Average,
    /// No lot matching. Reductions are added as-is and may go negative.
    None,
}

impl BookingMethod {
    /// All methods, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Strict,
        Self::StrictWithSize,
        Self::Fifo,
        Self::Lifo,
        Self::Hifo,
        Self::Average,
        Self::None,
    ];
}

/// Error returned when parsing an unknown booking method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking method: {0}")]
pub struct ParseBookingMethodError(pub String);

impl FromStr for BookingMethod {
    type Err = ParseBookingMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STRICT" => Ok(Self::Strict),
            "STRICT_WITH_SIZE" => Ok(Self::StrictWithSize),
            "FIFO" => Ok(Self::Fifo),
            "LIFO" => Ok(Self::Lifo),
            "HIFO" => Ok(Self::Hifo),
            "AVERAGE" => Ok(Self::Average),
            "NONE" => Ok(Self::None),
            _ => Err(ParseBookingMethodError(s.to_string())),
        }
    }
}

impl fmt::Display for BookingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "STRICT"),
            Self::StrictWithSize => write!(f, "STRICT_WITH_SIZE"),
            Self::Fifo => write!(f, "FIFO"),
            Self::Lifo => write!(f, "LIFO"),
            Self::Hifo => write!(f, "HIFO"),
            Self::Average => write!(f, "AVERAGE"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// The lots held by one account.
///
/// # Examples
///
/// ```
/// use lotbook_core::{Amount, Cost, Inventory, Lot};
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let jan = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
/// let mut inv = Inventory::new();
///
/// inv.add(Lot::simple(Amount::new(dec!(100), "USD")));
/// inv.add(Lot::at_cost(Amount::new(dec!(10), "HOOL"), Cost::new(dec!(1), "USD", jan)));
/// inv.add(Lot::at_cost(Amount::new(dec!(-10), "HOOL"), Cost::new(dec!(1), "USD", jan)));
///
/// assert_eq!(inv.units("USD"), dec!(100));
/// assert_eq!(inv.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    lots: Vec<Lot>,
}

impl Inventory {
    /// Create an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lots, in insertion order.
    #[must_use]
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Check if no lots are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Number of lots held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Net units of a commodity across all lots, at cost or not.
    #[must_use]
    pub fn units(&self, currency: &str) -> Decimal {
        self.lots
            .iter()
            .filter(|l| l.units.currency == currency)
            .map(|l| l.units.number)
            .sum()
    }

    /// Find the lot with the given key.
    #[must_use]
    pub fn get(&self, currency: &str, cost: Option<&Cost>) -> Option<&Lot> {
        self.lots.iter().find(|l| l.same_key(currency, cost))
    }

    /// Add a signed quantity to the lot with the same key.
    ///
    /// A lot with a new key is appended. A lot whose quantity becomes zero is
    /// removed. Zero-quantity lots are ignored.
    pub fn add(&mut self, lot: Lot) {
        if lot.is_empty() {
            return;
        }

        let existing = self
            .lots
            .iter()
            .position(|l| l.same_key(&lot.units.currency, lot.cost.as_ref()));

        match existing {
            Some(idx) => {
                self.lots[idx].adjust(lot.units.number);
                if self.lots[idx].is_empty() {
                    self.lots.remove(idx);
                }
            }
            None => self.lots.push(lot),
        }
    }

    /// Check whether any lot held at cost would be reduced by `units`.
    #[must_use]
    pub fn is_reduced_by(&self, units: &Amount) -> bool {
        self.lots
            .iter()
            .any(|l| l.is_at_cost() && l.is_opposed_by(units))
    }

    /// Lots held at cost that `units` would reduce and that `spec` selects,
    /// in insertion order.
    #[must_use]
    pub fn candidates(&self, units: &Amount, spec: &CostSpec) -> Vec<&Lot> {
        self.lots
            .iter()
            .filter(|l| l.is_opposed_by(units) && l.matches(spec))
            .collect()
    }

    /// Remove and return every lot for which `pred` holds.
    pub fn take_where(&mut self, mut pred: impl FnMut(&Lot) -> bool) -> Vec<Lot> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.lots.len());
        for lot in self.lots.drain(..) {
            if pred(&lot) {
                taken.push(lot);
            } else {
                kept.push(lot);
            }
        }
        self.lots = kept;
        taken
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty)");
        }

        for (i, lot) in self.lots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{lot}")?;
        }
        Ok(())
    }
}

impl FromIterator<Lot> for Inventory {
    fn from_iter<I: IntoIterator<Item = Lot>>(iter: I) -> Self {
        let mut inv = Self::new();
        for lot in iter {
            inv.add(lot);
        }
        inv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn hool(units: Decimal, per: Decimal, d: NaiveDate) -> Lot {
        Lot::at_cost(Amount::new(units, "HOOL"), Cost::new(per, "USD", d))
    }

    #[test]
    fn test_empty_inventory() {
        let inv = Inventory::new();
        assert!(inv.is_empty());
        assert_eq!(inv.len(), 0);
        assert_eq!(inv.to_string(), "(empty)");
    }

    #[test]
    fn test_add_merges_same_key() {
        let mut inv = Inventory::new();
        inv.add(hool(dec!(10), dec!(1), date(2021, 1, 1)));
        inv.add(hool(dec!(5), dec!(1), date(2021, 1, 1)));

        assert_eq!(inv.len(), 1);
        assert_eq!(inv.units("HOOL"), dec!(15));
    }

    #[test]
    fn test_add_keeps_distinct_costs_apart() {
        let mut inv = Inventory::new();
        inv.add(hool(dec!(10), dec!(1), date(2021, 1, 1)));
        inv.add(hool(dec!(10), dec!(1), date(2021, 2, 1)));
        inv.add(Lot::simple(Amount::new(dec!(3), "HOOL")));

        assert_eq!(inv.len(), 3);
        assert_eq!(inv.units("HOOL"), dec!(23));
    }

    #[test]
    fn test_reducing_to_zero_removes_lot() {
        let mut inv = Inventory::new();
        inv.add(hool(dec!(10), dec!(1), date(2021, 1, 1)));
        inv.add(hool(dec!(-10), dec!(1), date(2021, 1, 1)));

        assert!(inv.is_empty());
        assert!(inv.get("HOOL", Some(&Cost::new(dec!(1), "USD", date(2021, 1, 1)))).is_none());
    }

    #[test]
    fn test_overshoot_flips_sign() {
        let mut inv = Inventory::new();
        inv.add(hool(dec!(5), dec!(3), date(2021, 1, 1)));
        inv.add(hool(dec!(-8), dec!(3), date(2021, 1, 1)));

        assert_eq!(inv.units("HOOL"), dec!(-3));
        assert_eq!(inv.len(), 1);
    }

    #[test]
    fn test_zero_lot_ignored() {
        let mut inv = Inventory::new();
        inv.add(Lot::simple(Amount::zero("USD")));
        assert!(inv.is_empty());
    }

    #[test]
    fn test_candidates_respect_sign_and_cost() {
        let mut inv = Inventory::new();
        inv.add(hool(dec!(10), dec!(1), date(2021, 1, 1)));
        inv.add(hool(dec!(10), dec!(2), date(2021, 2, 1)));
        inv.add(Lot::simple(Amount::new(dec!(7), "HOOL")));

        let sell = Amount::new(dec!(-1), "HOOL");
        assert_eq!(inv.candidates(&sell, &CostSpec::empty()).len(), 2);
        assert_eq!(
            inv.candidates(&sell, &CostSpec::empty().with_number_per(dec!(2)))
                .len(),
            1
        );

        let buy = Amount::new(dec!(1), "HOOL");
        assert!(inv.candidates(&buy, &CostSpec::empty()).is_empty());
        assert!(inv.is_reduced_by(&sell));
        assert!(!inv.is_reduced_by(&buy));
    }

    #[test]
    fn test_simple_lots_do_not_count_as_reduced() {
        let mut inv = Inventory::new();
        inv.add(Lot::simple(Amount::new(dec!(100), "USD")));
        assert!(!inv.is_reduced_by(&Amount::new(dec!(-5), "USD")));
    }

    #[test]
    fn test_take_where_preserves_order_of_rest() {
        let mut inv: Inventory = [
            hool(dec!(1), dec!(1), date(2021, 1, 1)),
            Lot::simple(Amount::new(dec!(5), "USD")),
            hool(dec!(2), dec!(2), date(2021, 1, 2)),
            Lot::simple(Amount::new(dec!(5), "EUR")),
        ]
        .into_iter()
        .collect();

        let taken = inv.take_where(Lot::is_at_cost);
        assert_eq!(taken.len(), 2);
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.lots()[0].currency(), "USD");
        assert_eq!(inv.lots()[1].currency(), "EUR");
    }

    #[test]
    fn test_booking_method_parse() {
        assert_eq!("fifo".parse::<BookingMethod>(), Ok(BookingMethod::Fifo));
        assert_eq!(
            "Strict_With_Size".parse::<BookingMethod>(),
            Ok(BookingMethod::StrictWithSize)
        );
        assert_eq!(" hifo ".parse::<BookingMethod>(), Ok(BookingMethod::Hifo));
        assert_eq!(
            "LOWEST".parse::<BookingMethod>(),
            Err(ParseBookingMethodError("LOWEST".to_string()))
        );
        for method in BookingMethod::ALL {
            assert_eq!(method.to_string().parse::<BookingMethod>(), Ok(method));
        }
    }
}
