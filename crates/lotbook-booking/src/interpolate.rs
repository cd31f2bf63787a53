//! Transaction interpolation and balancing.
//!
//! The weight of a booked posting is its units converted through its cost,
//! or else through its price, or else the units themselves. A transaction
//! balances when, per currency, the weights sum to within tolerance of zero.
//!
//! A transaction may leave out one number: the units of an elided posting,
//! the per-unit cost of an augmentation, or the number of a price. The
//! missing number is solved from the residual of the other postings.

use lotbook_core::{Amount, BookedPosting, Posting, Symbol};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::{BookingErrorKind, Tolerances};

/// Calculate the residual (sum of weights) per currency.
///
/// Currencies are returned in sorted order.
#[must_use]
pub fn calculate_residual(postings: &[BookedPosting]) -> BTreeMap<Symbol, Decimal> {
    let mut residuals: BTreeMap<Symbol, Decimal> = BTreeMap::new();
    for posting in postings {
        let weight = posting.weight();
        *residuals.entry(weight.currency).or_default() += weight.number;
    }
    residuals
}

/// Residuals that the tolerances do not absorb.
fn significant(residuals: &BTreeMap<Symbol, Decimal>, tolerances: &Tolerances) -> Vec<Amount> {
    residuals
        .iter()
        .filter(|(currency, number)| !tolerances.is_small(currency, **number))
        .map(|(currency, number)| Amount::new(*number, currency.clone()))
        .collect()
}

/// Check that booked postings balance.
pub fn check_balance(
    postings: &[BookedPosting],
    tolerances: &Tolerances,
) -> Result<(), BookingErrorKind> {
    let residuals = significant(&calculate_residual(postings), tolerances);
    if residuals.is_empty() {
        Ok(())
    } else {
        Err(BookingErrorKind::TransactionDoesNotBalance { residuals })
    }
}

/// Fill in the units of an elided posting from the others.
///
/// The filled posting carries no cost and no price. If nothing is left to
/// balance, it gets zero units of the single currency the other postings
/// weigh in; with several such currencies the amount is undetermined.
///
/// ```
/// use lotbook_booking::{interpolate, BookingOptions, Tolerances};
/// use lotbook_core::{Amount, BookedPosting, Posting};
/// use rust_decimal_macros::dec;
///
/// let food = Posting::new("Expenses:Food", Amount::new(dec!(50.00), "USD"));
/// let booked = vec![BookedPosting::from_posting(&food, Amount::new(dec!(50.00), "USD"), None)];
/// let cash = Posting::auto("Assets:Cash");
///
/// let tolerances = Tolerances::infer(&[food, cash.clone()], &BookingOptions::default());
/// let filled = interpolate(&booked, &cash, &tolerances).unwrap();
/// assert_eq!(filled.units, Amount::new(dec!(-50.00), "USD"));
/// ```
pub fn interpolate(
    booked: &[BookedPosting],
    elided: &Posting,
    tolerances: &Tolerances,
) -> Result<BookedPosting, BookingErrorKind> {
    let residuals = calculate_residual(booked);
    let open = significant(&residuals, tolerances);
    let currencies: Vec<&Symbol> = residuals.keys().collect();

    let units = match (open.as_slice(), currencies.as_slice()) {
        ([residual], _) => {
            let number = tolerances.quantize(&residual.currency, -residual.number);
            Amount::new(number, residual.currency.clone())
        }
        ([], [only]) => Amount::zero(*only),
        _ => return Err(cannot(elided, open)),
    };

    tracing::debug!("interpolated {} for {}", units, elided.account);

    let mut posting = BookedPosting::from_posting(elided, units, None);
    posting.price = None;
    Ok(posting)
}

/// Per-unit number that lets `units` balance the other postings in
/// `currency`.
///
/// Used for a missing per-unit cost and for a missing price number. Every
/// other currency must already balance within tolerance.
///
/// ```
/// use lotbook_booking::{interpolate_per_unit, Tolerances};
/// use lotbook_core::{Amount, BookedPosting, Posting};
/// use rust_decimal_macros::dec;
///
/// let cash = Posting::new("Assets:Cash", Amount::new(dec!(-20.00), "USD"));
/// let booked = vec![BookedPosting::from_posting(&cash, Amount::new(dec!(-20.00), "USD"), None)];
///
/// let units = Amount::new(dec!(10), "HOOL");
/// let usd = "USD".into();
/// let per = interpolate_per_unit(&booked, "Assets:Broker", &units, &usd, &Tolerances::default());
/// assert_eq!(per.unwrap(), dec!(2));
/// ```
pub fn interpolate_per_unit(
    others: &[BookedPosting],
    account: &str,
    units: &Amount,
    currency: &Symbol,
    tolerances: &Tolerances,
) -> Result<Decimal, BookingErrorKind> {
    let residuals = calculate_residual(others);
    let open = significant(&residuals, tolerances);
    if units.is_zero() || open.iter().any(|r| r.currency != *currency) {
        return Err(BookingErrorKind::CannotInterpolate {
            account: account.to_string(),
            residuals: open,
        });
    }

    let weight = -residuals.get(currency).copied().unwrap_or_default();
    let per = weight / units.number;
    tracing::debug!("interpolated {} {} per unit of {} in {}", per, currency, units, account);
    Ok(per)
}

/// Fill a missing cost or price commodity from the other one.
#[must_use]
pub fn fill_currencies(posting: &Posting) -> Posting {
    let mut posting = posting.clone();
    if let (Some(cost), Some(price)) = (&mut posting.cost, &mut posting.price) {
        match (&cost.currency, &price.currency) {
            (Some(currency), None) => price.currency = Some(currency.clone()),
            (None, Some(currency)) => cost.currency = Some(currency.clone()),
            _ => {}
        }
    }
    posting
}

fn cannot(elided: &Posting, residuals: Vec<Amount>) -> BookingErrorKind {
    BookingErrorKind::CannotInterpolate {
        account: elided.account.clone(),
        residuals,
    }
}
