//! Lot matching for reducing postings.
//!
//! Each booking method is a [`ReductionStrategy`]. A strategy only *plans*:
//! it inspects the unchanged inventory and returns a [`Resolution`] naming the
//! lots drawn on. [`resolve`] applies the plan only if planning succeeded, so
//! a failing reduction never leaves the inventory half-modified.
//!
//! Candidate lots are those held at cost, in the reduced commodity, with the
//! opposite sign, and selected by every field the cost spec sets.

use chrono::NaiveDate;
use lotbook_core::{Amount, BookingMethod, Cost, CostSpec, Inventory, Lot};
use rust_decimal::Decimal;
use std::cmp::Reverse;

use crate::BookingErrorKind;

/// A reducing posting, as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct Reduction<'a> {
    /// Account being reduced.
    pub account: &'a str,
    /// Signed units of the reduction.
    pub units: &'a Amount,
    /// Cost filter (empty when the posting has none).
    pub spec: &'a CostSpec,
    /// Date of the transaction.
    pub date: NaiveDate,
}

impl Reduction<'_> {
    fn no_match(&self) -> BookingErrorKind {
        BookingErrorKind::NoMatchingLot {
            account: self.account.to_string(),
            units: self.units.clone(),
            spec: self.spec.clone(),
        }
    }

    fn ambiguous(&self, candidates: usize) -> BookingErrorKind {
        BookingErrorKind::AmbiguousMatch {
            account: self.account.to_string(),
            units: self.units.clone(),
            spec: self.spec.clone(),
            candidates,
        }
    }

    fn exceeds(&self, available: Decimal) -> BookingErrorKind {
        BookingErrorKind::ReductionExceedsLot {
            account: self.account.to_string(),
            units: self.units.clone(),
            available,
        }
    }
}

/// A portion of a reduction booked against one lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotMatch {
    /// Signed units taken (same sign as the reduction).
    pub units: Amount,
    /// Cost of the lot drawn on.
    pub cost: Option<Cost>,
}

/// Lots replaced by a single average-cost lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Lots removed from the inventory.
    pub sources: Vec<Lot>,
    /// The lot that replaces them.
    pub merged: Lot,
}

/// The outcome of planning a reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// One entry per lot drawn on, in consumption order.
    pub matches: Vec<LotMatch>,
    /// Merge performed before the reduction, if any.
    pub merge: Option<MergePlan>,
}

impl Resolution {
    fn single(units: &Amount, cost: &Cost) -> Self {
        Self {
            matches: vec![LotMatch {
                units: units.clone(),
                cost: Some(cost.clone()),
            }],
            merge: None,
        }
    }

    /// Apply this resolution to an inventory.
    pub fn apply(&self, inventory: &mut Inventory) {
        if let Some(merge) = &self.merge {
            let sources = &merge.sources;
            inventory.take_where(|lot| sources.contains(lot));
            inventory.add(merge.merged.clone());
        }
        for m in &self.matches {
            inventory.add(Lot {
                units: m.units.clone(),
                cost: m.cost.clone(),
            });
        }
    }
}

/// A lot matching rule.
pub trait ReductionStrategy {
    /// The booking method this strategy implements.
    fn method(&self) -> BookingMethod;

    /// Plan a reduction against an inventory without modifying it.
    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind>;
}

/// Exactly one lot may match; a larger reduction flips the lot's sign.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strict;

/// Exactly one lot may match and it must cover the reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictWithSize;

/// Oldest lots first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

/// Newest lots first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

/// Highest per-unit cost first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hifo;

/// Matching lots are merged at their average cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct Average;

/// No matching at all; the posting is added as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBooking;

/// The strategy implementing a booking method.
#[must_use]
pub fn strategy(method: BookingMethod) -> &'static dyn ReductionStrategy {
    match method {
        BookingMethod::Strict => &Strict,
        BookingMethod::StrictWithSize => &StrictWithSize,
        BookingMethod::Fifo => &Fifo,
        BookingMethod::Lifo => &Lifo,
        BookingMethod::Hifo => &Hifo,
        BookingMethod::Average => &Average,
        BookingMethod::None => &NoBooking,
    }
}

/// Resolve a reduction and apply it to the inventory.
///
/// A cost spec carrying the merge marker is booked as AVERAGE whatever the
/// account's method, unless the account books with NONE. On error the
/// inventory is unchanged.
pub fn resolve(
    inventory: &mut Inventory,
    reduction: &Reduction<'_>,
    method: BookingMethod,
) -> Result<Resolution, BookingErrorKind> {
    let method = if reduction.spec.merge && method != BookingMethod::None {
        BookingMethod::Average
    } else {
        method
    };
    let resolution = strategy(method).plan(inventory, reduction)?;
    tracing::debug!(
        "{} reduction of {} in {} drew on {} lot(s)",
        method,
        reduction.units,
        reduction.account,
        resolution.matches.len()
    );
    resolution.apply(inventory);
    Ok(resolution)
}

/// Pick the single candidate, or fail.
fn unique<'i>(
    candidates: &[&'i Lot],
    reduction: &Reduction<'_>,
) -> Result<&'i Lot, BookingErrorKind> {
    match candidates {
        [] => Err(reduction.no_match()),
        [lot] => Ok(*lot),
        _ => Err(reduction.ambiguous(candidates.len())),
    }
}

fn lot_cost<'l>(lot: &'l Lot, reduction: &Reduction<'_>) -> Result<&'l Cost, BookingErrorKind> {
    lot.cost.as_ref().ok_or_else(|| reduction.no_match())
}

fn plan_strict(
    inventory: &Inventory,
    reduction: &Reduction<'_>,
) -> Result<Resolution, BookingErrorKind> {
    let candidates = inventory.candidates(reduction.units, reduction.spec);
    let lot = unique(&candidates, reduction)?;
    let cost = lot_cost(lot, reduction)?;

    if reduction.units.number.abs() > lot.units.number.abs() {
        tracing::warn!(
            "reduction of {} in {} exceeds lot {}; the lot changes sign",
            reduction.units,
            reduction.account,
            lot
        );
    }
    Ok(Resolution::single(reduction.units, cost))
}

impl ReductionStrategy for Strict {
    fn method(&self) -> BookingMethod {
        BookingMethod::Strict
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        plan_strict(inventory, reduction)
    }
}

impl ReductionStrategy for StrictWithSize {
    fn method(&self) -> BookingMethod {
        BookingMethod::StrictWithSize
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        let candidates = inventory.candidates(reduction.units, reduction.spec);
        let lot = unique(&candidates, reduction)?;
        let cost = lot_cost(lot, reduction)?;

        let available = lot.units.number.abs();
        if reduction.units.number.abs() > available {
            return Err(reduction.exceeds(available));
        }
        Ok(Resolution::single(reduction.units, cost))
    }
}

/// Consume candidates in the given order until the reduction is covered.
fn consume_in_order(
    candidates: &[&Lot],
    reduction: &Reduction<'_>,
) -> Result<Resolution, BookingErrorKind> {
    let negative = reduction.units.number.is_sign_negative();
    let mut remaining = reduction.units.number.abs();
    let mut matches = Vec::new();

    for lot in candidates {
        if remaining.is_zero() {
            break;
        }
        let cost = lot_cost(lot, reduction)?;
        let take = remaining.min(lot.units.number.abs());
        matches.push(LotMatch {
            units: Amount::new(
                if negative { -take } else { take },
                reduction.units.currency.clone(),
            ),
            cost: Some(cost.clone()),
        });
        remaining -= take;
    }

    if !remaining.is_zero() {
        let available = candidates.iter().map(|l| l.units.number.abs()).sum();
        return Err(reduction.exceeds(available));
    }
    Ok(Resolution {
        matches,
        merge: None,
    })
}

/// Order in which the ordered methods consume lots.
#[derive(Debug, Clone, Copy)]
enum ClosingOrder {
    Oldest,
    Newest,
    Highest,
}

fn plan_ordered(
    inventory: &Inventory,
    reduction: &Reduction<'_>,
    order: ClosingOrder,
) -> Result<Resolution, BookingErrorKind> {
    let mut candidates = inventory.candidates(reduction.units, reduction.spec);
    match candidates.len() {
        0 => Err(reduction.no_match()),
        1 => plan_strict(inventory, reduction),
        _ => {
            // Stable sorts keep insertion order among ties.
            match order {
                ClosingOrder::Oldest => {
                    candidates.sort_by_key(|l| l.cost.as_ref().map(|c| c.date));
                }
                ClosingOrder::Newest => {
                    candidates.sort_by_key(|l| Reverse(l.cost.as_ref().map(|c| c.date)));
                }
                ClosingOrder::Highest => {
                    candidates.sort_by_key(|l| Reverse(l.cost.as_ref().map(|c| c.number)));
                }
            }
            consume_in_order(&candidates, reduction)
        }
    }
}

impl ReductionStrategy for Fifo {
    fn method(&self) -> BookingMethod {
        BookingMethod::Fifo
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        plan_ordered(inventory, reduction, ClosingOrder::Oldest)
    }
}

impl ReductionStrategy for Lifo {
    fn method(&self) -> BookingMethod {
        BookingMethod::Lifo
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        plan_ordered(inventory, reduction, ClosingOrder::Newest)
    }
}

impl ReductionStrategy for Hifo {
    fn method(&self) -> BookingMethod {
        BookingMethod::Hifo
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        plan_ordered(inventory, reduction, ClosingOrder::Highest)
    }
}

/// Merge lots into one at their quantity-weighted mean cost.
///
/// The merged lot takes the earliest date and no label. All lots must share
/// one cost currency; `None` is returned otherwise. Lots must be non-empty.
#[must_use]
pub fn average_lots(lots: &[&Lot]) -> Option<Lot> {
    let first = lots.first()?;
    let first_cost = first.cost.as_ref()?;

    let mut units = Decimal::ZERO;
    let mut book = Decimal::ZERO;
    let mut date = first_cost.date;
    for lot in lots {
        let cost = lot.cost.as_ref()?;
        if cost.currency != first_cost.currency || lot.units.currency != first.units.currency {
            return None;
        }
        units += lot.units.number;
        book += lot.book_value()?.number;
        date = date.min(cost.date);
    }
    if units.is_zero() {
        return None;
    }

    Some(Lot::at_cost(
        Amount::new(units, first.units.currency.clone()),
        Cost::new(book / units, first_cost.currency.clone(), date),
    ))
}

impl ReductionStrategy for Average {
    fn method(&self) -> BookingMethod {
        BookingMethod::Average
    }

    fn plan(
        &self,
        inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        // Only the cost currency and label select lots: number and date
        // describe the merged lot, not the lots it came from.
        let filter = CostSpec {
            currency: reduction.spec.currency.clone(),
            label: reduction.spec.label.clone(),
            ..CostSpec::default()
        };
        let candidates = inventory.candidates(reduction.units, &filter);
        if candidates.is_empty() {
            return Err(reduction.no_match());
        }

        let available: Decimal = candidates.iter().map(|l| l.units.number.abs()).sum();
        if reduction.units.number.abs() > available {
            return Err(reduction.exceeds(available));
        }

        if let [lot] = candidates.as_slice() {
            let cost = lot_cost(lot, reduction)?;
            return Ok(Resolution::single(reduction.units, cost));
        }

        let merged =
            average_lots(&candidates).ok_or_else(|| reduction.ambiguous(candidates.len()))?;
        let cost = lot_cost(&merged, reduction)?.clone();
        tracing::info!(
            "merged {} lots of {} in {} at average cost {}",
            candidates.len(),
            reduction.units.currency,
            reduction.account,
            cost
        );

        Ok(Resolution {
            matches: vec![LotMatch {
                units: reduction.units.clone(),
                cost: Some(cost),
            }],
            merge: Some(MergePlan {
                sources: candidates.into_iter().cloned().collect(),
                merged,
            }),
        })
    }
}

impl ReductionStrategy for NoBooking {
    fn method(&self) -> BookingMethod {
        BookingMethod::None
    }

    /// The reduction is added as-is. An empty spec means no cost; otherwise
    /// the cost spec must be completable.
    fn plan(
        &self,
        _inventory: &Inventory,
        reduction: &Reduction<'_>,
    ) -> Result<Resolution, BookingErrorKind> {
        let cost = if reduction.spec.is_empty() {
            None
        } else {
            Some(
                reduction
                    .spec
                    .complete(reduction.units.number, reduction.date)
                    .ok_or_else(|| BookingErrorKind::IncompleteCost {
                        account: reduction.account.to_string(),
                        units: reduction.units.clone(),
                        spec: reduction.spec.clone(),
                    })?,
            )
        };
        Ok(Resolution {
            matches: vec![LotMatch {
                units: reduction.units.clone(),
                cost,
            }],
            merge: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn lot(units: Decimal, per: Decimal, d: NaiveDate) -> Lot {
        Lot::at_cost(Amount::new(units, "HOOL"), Cost::new(per, "USD", d))
    }

    fn two_lots() -> Inventory {
        [
            lot(dec!(10), dec!(1), date(2021, 1, 1)),
            lot(dec!(10), dec!(2), date(2021, 2, 1)),
        ]
        .into_iter()
        .collect()
    }

    fn sell(units: &Amount, spec: &CostSpec) -> Resolution {
        let reduction = Reduction {
            account: "Assets:Broker",
            units,
            spec,
            date: date(2021, 3, 1),
        };
        Fifo.plan(&two_lots(), &reduction).unwrap()
    }

    #[test]
    fn test_strict_ambiguous_leaves_inventory() {
        let mut inv = two_lots();
        let units = Amount::new(dec!(-1), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };

        let err = resolve(&mut inv, &reduction, BookingMethod::Strict).unwrap_err();
        assert!(matches!(err, BookingErrorKind::AmbiguousMatch { candidates: 2, .. }));
        assert_eq!(inv, two_lots());
    }

    #[test]
    fn test_strict_overshoot_flips_sign() {
        let mut inv: Inventory = [lot(dec!(5), dec!(3), date(2021, 1, 1))].into_iter().collect();
        let units = Amount::new(dec!(-8), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };

        resolve(&mut inv, &reduction, BookingMethod::Strict).unwrap();
        assert_eq!(inv.units("HOOL"), dec!(-3));

        let mut inv: Inventory = [lot(dec!(5), dec!(3), date(2021, 1, 1))].into_iter().collect();
        let err = resolve(&mut inv, &reduction, BookingMethod::StrictWithSize).unwrap_err();
        assert!(matches!(
            err,
            BookingErrorKind::ReductionExceedsLot { available, .. } if available == dec!(5)
        ));
        assert_eq!(inv.units("HOOL"), dec!(5));
    }

    #[test]
    fn test_fifo_splits_oldest_first() {
        let resolution = sell(&Amount::new(dec!(-15), "HOOL"), &CostSpec::empty());
        assert_eq!(
            resolution.matches,
            vec![
                LotMatch {
                    units: Amount::new(dec!(-10), "HOOL"),
                    cost: Some(Cost::new(dec!(1), "USD", date(2021, 1, 1))),
                },
                LotMatch {
                    units: Amount::new(dec!(-5), "HOOL"),
                    cost: Some(Cost::new(dec!(2), "USD", date(2021, 2, 1))),
                },
            ]
        );
    }

    #[test]
    fn test_fifo_filter_narrowing_to_one_lot() {
        let spec = CostSpec::empty().with_date(date(2021, 2, 1));
        let resolution = sell(&Amount::new(dec!(-3), "HOOL"), &spec);
        assert_eq!(resolution.matches.len(), 1);
        assert_eq!(
            resolution.matches[0].cost.as_ref().map(|c| c.number),
            Some(dec!(2))
        );
    }

    #[test]
    fn test_lifo_newest_first_and_ties_by_insertion() {
        let inv: Inventory = [
            lot(dec!(10), dec!(1), date(2021, 1, 1)),
            lot(dec!(10), dec!(2), date(2021, 2, 1)),
            lot(dec!(10), dec!(3), date(2021, 2, 1)),
        ]
        .into_iter()
        .collect();
        let units = Amount::new(dec!(-15), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };

        let resolution = Lifo.plan(&inv, &reduction).unwrap();
        let per: Vec<_> = resolution
            .matches
            .iter()
            .map(|m| m.cost.as_ref().unwrap().number)
            .collect();
        assert_eq!(per, vec![dec!(2), dec!(3)]);
    }

    #[test]
    fn test_hifo_highest_cost_first() {
        let inv: Inventory = [
            lot(dec!(10), dec!(1), date(2021, 1, 1)),
            lot(dec!(10), dec!(3), date(2021, 2, 1)),
            lot(dec!(10), dec!(2), date(2021, 3, 1)),
        ]
        .into_iter()
        .collect();
        let units = Amount::new(dec!(-15), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 4, 1),
        };

        let resolution = Hifo.plan(&inv, &reduction).unwrap();
        assert_eq!(
            resolution.matches,
            vec![
                LotMatch {
                    units: Amount::new(dec!(-10), "HOOL"),
                    cost: Some(Cost::new(dec!(3), "USD", date(2021, 2, 1))),
                },
                LotMatch {
                    units: Amount::new(dec!(-5), "HOOL"),
                    cost: Some(Cost::new(dec!(2), "USD", date(2021, 3, 1))),
                },
            ]
        );
    }

    #[test]
    fn test_fifo_insufficient_units() {
        let units = Amount::new(dec!(-25), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };
        let err = Fifo.plan(&two_lots(), &reduction).unwrap_err();
        assert!(matches!(
            err,
            BookingErrorKind::ReductionExceedsLot { available, .. } if available == dec!(20)
        ));
    }

    #[test]
    fn test_average_merges_before_reducing() {
        let mut inv = two_lots();
        let units = Amount::new(dec!(-5), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };

        let resolution = resolve(&mut inv, &reduction, BookingMethod::Average).unwrap();
        let merged_cost = Cost::new(dec!(1.5), "USD", date(2021, 1, 1));
        assert_eq!(resolution.matches[0].cost, Some(merged_cost.clone()));
        assert_eq!(resolution.merge.as_ref().map(|m| m.sources.len()), Some(2));
        assert_eq!(inv.len(), 1);
        assert_eq!(inv.get("HOOL", Some(&merged_cost)).map(|l| l.units.number), Some(dec!(15)));
    }

    #[test]
    fn test_average_mixed_cost_currencies() {
        let inv: Inventory = [
            lot(dec!(10), dec!(1), date(2021, 1, 1)),
            Lot::at_cost(
                Amount::new(dec!(10), "HOOL"),
                Cost::new(dec!(1), "EUR", date(2021, 1, 1)),
            ),
        ]
        .into_iter()
        .collect();
        let units = Amount::new(dec!(-5), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };
        assert!(matches!(
            Average.plan(&inv, &reduction),
            Err(BookingErrorKind::AmbiguousMatch { .. })
        ));

        // A currency filter resolves it.
        let usd = CostSpec::empty().with_currency("USD");
        let reduction = Reduction { spec: &usd, ..reduction };
        assert!(Average.plan(&inv, &reduction).is_ok());
    }

    #[test]
    fn test_merge_marker_forces_average() {
        let mut inv = two_lots();
        let units = Amount::new(dec!(-20), "HOOL");
        let spec = CostSpec::empty().with_merge();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };
        resolve(&mut inv, &reduction, BookingMethod::Strict).unwrap();
        assert!(inv.is_empty());
    }

    #[test]
    fn test_no_booking_goes_negative() {
        let mut inv = Inventory::new();
        let units = Amount::new(dec!(-3), "HOOL");
        let spec = CostSpec::empty();
        let reduction = Reduction {
            account: "Assets:Broker",
            units: &units,
            spec: &spec,
            date: date(2021, 3, 1),
        };
        let resolution = resolve(&mut inv, &reduction, BookingMethod::None).unwrap();
        assert_eq!(resolution.matches[0].cost, None);
        assert_eq!(inv.units("HOOL"), dec!(-3));

        // The merge marker does not turn NONE into AVERAGE.
        let merge = CostSpec::empty().with_merge();
        let reduction = Reduction { spec: &merge, ..reduction };
        let err = resolve(&mut inv, &reduction, BookingMethod::None).unwrap_err();
        assert!(matches!(err, BookingErrorKind::IncompleteCost { .. }));
    }

    #[test]
    fn test_strategy_dispatch() {
        for method in BookingMethod::ALL {
            assert_eq!(strategy(method).method(), method);
        }
    }

    #[test]
    fn test_average_lots_weighted_mean() {
        let a = lot(dec!(1), dec!(10), date(2021, 5, 1));
        let b = lot(dec!(3), dec!(20), date(2021, 4, 1));
        let merged = average_lots(&[&a, &b]).unwrap();
        assert_eq!(merged.units.number, dec!(4));
        assert_eq!(merged.cost, Some(Cost::new(dec!(17.5), "USD", date(2021, 4, 1))));
    }
}
