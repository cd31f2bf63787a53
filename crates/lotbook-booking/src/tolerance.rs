//! Per-transaction balancing tolerances.
//!
//! Tolerances are inferred from the precision of the numbers written in a
//! transaction: a posting of `20.00 USD` has scale 2, so it contributes
//! `0.01 * multiplier` to the USD tolerance. The largest contribution per
//! currency wins. Integer amounts contribute nothing and are balanced
//! exactly unless a configured default says otherwise.

use lotbook_core::{Posting, Symbol};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::BookingOptions;

/// Tolerances for the currencies of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tolerances {
    map: HashMap<Symbol, Decimal>,
    /// Coarsest non-zero scale written per currency.
    precision: HashMap<Symbol, u32>,
    default: Decimal,
}

/// One unit in the last place of a number with the given scale.
fn unit_of_scale(scale: u32) -> Decimal {
    Decimal::new(1, scale.min(28))
}

impl Tolerances {
    /// Start from the configured defaults only.
    #[must_use]
    pub fn from_options(options: &BookingOptions) -> Self {
        let mut tolerances = Self::default();
        for (currency, tol) in &options.inferred_tolerance_default {
            if currency == "*" {
                tolerances.default = *tol;
            } else {
                tolerances.map.insert(Symbol::from(currency), *tol);
            }
        }
        tolerances
    }

    /// Infer tolerances from the numbers written on a transaction's postings.
    #[must_use]
    pub fn infer(postings: &[Posting], options: &BookingOptions) -> Self {
        let mut tolerances = Self::from_options(options);
        let multiplier = options.inferred_tolerance_multiplier;

        for posting in postings {
            let Some(units) = &posting.units else {
                continue;
            };
            let scale = units.number.scale();
            if scale == 0 {
                continue;
            }
            let unit_tol = unit_of_scale(scale) * multiplier;
            tolerances.widen(&units.currency, unit_tol);
            tolerances
                .precision
                .entry(units.currency.clone())
                .and_modify(|p| *p = (*p).min(scale))
                .or_insert(scale);

            if options.infer_tolerance_from_cost {
                if let Some(cost) = &posting.cost {
                    if let (Some(per), Some(currency)) =
                        (cost.per_unit(units.number), cost.currency.as_ref())
                    {
                        tolerances.widen(currency, unit_tol * per.abs());
                    }
                }
            }
        }

        tolerances
    }

    fn widen(&mut self, currency: &Symbol, tol: Decimal) {
        let entry = self.map.entry(currency.clone()).or_insert(tol);
        *entry = (*entry).max(tol);
    }

    /// Tolerance for a currency.
    #[must_use]
    pub fn get(&self, currency: &str) -> Decimal {
        self.map.get(currency).copied().unwrap_or(self.default)
    }

    /// Check whether a residual is small enough to count as zero.
    #[must_use]
    pub fn is_small(&self, currency: &str, residual: Decimal) -> bool {
        residual.abs() <= self.get(currency)
    }

    /// Round an interpolated number to the precision written for its
    /// currency. Numbers in currencies without inferred precision are
    /// returned unchanged.
    #[must_use]
    pub fn quantize(&self, currency: &str, number: Decimal) -> Decimal {
        match self.precision.get(currency) {
            Some(scale) => number.round_dp(*scale),
            None => number,
        }
    }
}
