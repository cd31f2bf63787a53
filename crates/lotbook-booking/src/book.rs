//! The booking pass.
//!
//! [`BookingEngine`] walks transactions in the order given, keeps one
//! [`Inventory`] per account, and turns every [`Transaction`] into a
//! [`BookedTransaction`] or into errors. Errors never stop the pass.
//!
//! Within a transaction, postings are booked in order against working copies
//! of the touched inventories. The copies replace the real inventories only
//! when the transaction is emitted, so a rejected transaction leaves no trace.
//!
//! One number per transaction may be left out: the units of an elided
//! posting, the per-unit cost of an augmentation, or a price number. It is
//! solved once every other posting is booked.

use chrono::NaiveDate;
use lotbook_core::{
    Amount, BookedDirective, BookedPosting, BookedTransaction, BookingMethod, Cost, CostSpec,
    Directive, Inventory, Lot, Posting, SourceLocation, Symbol, Transaction,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::interpolate::{check_balance, fill_currencies, interpolate, interpolate_per_unit};
use crate::resolve::{average_lots, resolve, MergePlan, Reduction};
use crate::{classify, BookingError, BookingErrorKind, BookingOptions, PostingKind, Tolerances};

/// Booking method per account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMethods {
    default: BookingMethod,
    methods: HashMap<String, BookingMethod>,
}

impl AccountMethods {
    /// Every account uses `default` unless set otherwise.
    #[must_use]
    pub fn new(default: BookingMethod) -> Self {
        Self {
            default,
            methods: HashMap::new(),
        }
    }

    /// Set the method of one account.
    #[must_use]
    pub fn with(mut self, account: impl Into<String>, method: BookingMethod) -> Self {
        self.set(account, method);
        self
    }

    /// Set the method of one account.
    pub fn set(&mut self, account: impl Into<String>, method: BookingMethod) {
        self.methods.insert(account.into(), method);
    }

    /// The method of an account.
    #[must_use]
    pub fn get(&self, account: &str) -> BookingMethod {
        self.methods.get(account).copied().unwrap_or(self.default)
    }
}

/// An implicit average-cost merge, reported alongside the booked output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LotMerge {
    /// Date of the transaction that caused the merge.
    pub date: NaiveDate,
    /// Account whose lots were merged.
    pub account: String,
    /// Location of the posting that caused the merge.
    pub location: SourceLocation,
    /// The lots before merging.
    pub sources: Vec<Lot>,
    /// The merged lot.
    pub merged: Lot,
}

/// Result of booking a list of transactions.
#[derive(Debug, Clone, Default)]
pub struct BookingOutput {
    /// Emitted transactions, in input order.
    pub transactions: Vec<BookedTransaction>,
    /// Collected errors, in input order.
    pub errors: Vec<BookingError>,
    /// Implicit lot merges.
    pub adjustments: Vec<LotMerge>,
    /// Final inventory of every account touched.
    pub balances: BTreeMap<String, Inventory>,
}

/// Result of booking a directive stream.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Booked directives, in input order.
    pub entries: Vec<BookedDirective>,
    /// Collected errors, in input order.
    pub errors: Vec<BookingError>,
    /// Implicit lot merges.
    pub adjustments: Vec<LotMerge>,
    /// Final inventory of every account touched.
    pub balances: BTreeMap<String, Inventory>,
}

/// Stateful booking pass over a transaction stream.
///
/// ```
/// use lotbook_booking::{AccountMethods, BookingEngine, BookingOptions};
/// use lotbook_core::{Amount, BookingMethod, CostSpec, NaiveDate, Posting, Transaction};
/// use rust_decimal_macros::dec;
///
/// let options = BookingOptions::default();
/// let methods = AccountMethods::new(BookingMethod::Fifo);
/// let mut engine = BookingEngine::new(&options, methods);
///
/// let day = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
/// let buy = Transaction::new(day, "buy")
///     .with_posting(
///         Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
///             .with_cost(CostSpec::empty().with_number_per(dec!(2)).with_currency("USD")),
///     )
///     .with_posting(Posting::auto("Assets:Cash"));
///
/// let booked = engine.book_transaction(&buy).unwrap();
/// assert_eq!(booked.postings[1].units, Amount::new(dec!(-20), "USD"));
///
/// let output = engine.finish();
/// assert!(output.errors.is_empty());
/// assert_eq!(output.balances["Assets:Broker"].units("HOOL"), dec!(10));
/// ```
#[derive(Debug)]
pub struct BookingEngine<'o> {
    options: &'o BookingOptions,
    methods: AccountMethods,
    inventories: BTreeMap<String, Inventory>,
    errors: Vec<BookingError>,
    adjustments: Vec<LotMerge>,
}

/// Per-transaction state.
#[derive(Default)]
struct Working {
    inventories: HashMap<String, Inventory>,
    adjustments: Vec<LotMerge>,
}

/// The one number a transaction may leave out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Units,
    CostNumber,
    PriceNumber,
}

/// Outcome of booking one posting.
enum Booked {
    Done(Vec<BookedPosting>),
    /// An augmentation whose per-unit cost comes from the residual.
    CostPending,
}

impl<'o> BookingEngine<'o> {
    /// Create an engine with empty inventories.
    #[must_use]
    pub fn new(options: &'o BookingOptions, methods: AccountMethods) -> Self {
        Self {
            options,
            methods,
            inventories: BTreeMap::new(),
            errors: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    /// Set the booking method of an account.
    pub fn set_method(&mut self, account: impl Into<String>, method: BookingMethod) {
        self.methods.set(account, method);
    }

    /// Errors collected so far.
    #[must_use]
    pub fn errors(&self) -> &[BookingError] {
        &self.errors
    }

    /// Current inventory of an account.
    #[must_use]
    pub fn inventory(&self, account: &str) -> Option<&Inventory> {
        self.inventories.get(account)
    }

    /// Record an error not tied to a transaction.
    pub fn push_error(&mut self, error: BookingError) {
        self.errors.push(error);
    }

    fn working<'w>(&self, work: &'w mut Working, account: &str) -> &'w mut Inventory {
        work.inventories
            .entry(account.to_string())
            .or_insert_with(|| self.inventories.get(account).cloned().unwrap_or_default())
    }

    /// Book one transaction.
    ///
    /// Returns `None` if the transaction was rejected; the reason is in
    /// [`errors`](Self::errors).
    pub fn book_transaction(&mut self, txn: &Transaction) -> Option<BookedTransaction> {
        tracing::debug!("booking {} {:?} at {}", txn.date, txn.narration, txn.location);

        let postings: Vec<Posting> = txn.postings.iter().map(fill_currencies).collect();
        let mut missing: Vec<(usize, Missing)> = Vec::new();
        for (i, posting) in postings.iter().enumerate() {
            if !posting.has_units() {
                missing.push((i, Missing::Units));
            }
            if posting.price.as_ref().is_some_and(|p| p.number.is_none()) {
                missing.push((i, Missing::PriceNumber));
            }
        }
        if missing.len() > 1 {
            let count = missing.len();
            self.reject(txn, None, BookingErrorKind::TooManyMissingAmounts { count });
            return None;
        }

        let mut work = Working::default();
        let mut slots: Vec<Vec<BookedPosting>> = vec![Vec::new(); postings.len()];
        let mut failed = false;

        for (i, posting) in postings.iter().enumerate() {
            if !posting.has_units() {
                continue;
            }
            match self.book_posting(txn, i, posting, &mut work) {
                Ok(Booked::Done(booked)) => slots[i] = booked,
                Ok(Booked::CostPending) => missing.push((i, Missing::CostNumber)),
                Err(kind) => {
                    tracing::debug!("posting {} of {} failed: {}", i, txn.location, kind);
                    self.reject(txn, Some(i), kind);
                    failed = true;
                }
            }
        }
        if missing.len() > 1 {
            let count = missing.len();
            self.reject(txn, None, BookingErrorKind::TooManyMissingAmounts { count });
            return None;
        }

        // A failed posting leaves any missing number undetermined and the
        // balance meaningless; emit what was booked.
        if !failed {
            let tolerances = Tolerances::infer(&postings, self.options);

            if let Some(&(i, what)) = missing.first() {
                let filled = self.fill_missing(
                    txn,
                    &postings,
                    i,
                    what,
                    &mut slots,
                    &mut work,
                    &tolerances,
                );
                if let Err(kind) = filled {
                    self.reject(txn, Some(i), kind);
                    return None;
                }
            }

            // A solved per-unit number balances its currency exactly, up to
            // decimal precision; the other currencies were checked while
            // solving.
            if !matches!(missing.first(), Some((_, Missing::CostNumber | Missing::PriceNumber))) {
                let booked: Vec<BookedPosting> = slots.iter().flatten().cloned().collect();
                if let Err(kind) = check_balance(&booked, &tolerances) {
                    self.reject(txn, None, kind);
                    return None;
                }
            }
        }

        for (account, inventory) in work.inventories {
            if inventory.is_empty() && !self.inventories.contains_key(&account) {
                continue;
            }
            self.inventories.insert(account, inventory);
        }
        self.adjustments.extend(work.adjustments);
        Some(BookedTransaction::from_transaction(
            txn,
            slots.into_iter().flatten().collect(),
        ))
    }

    /// Record an error against a transaction.
    ///
    /// Posting-level errors point at the posting, the rest at the
    /// transaction.
    fn reject(&mut self, txn: &Transaction, index: Option<usize>, kind: BookingErrorKind) {
        let location = match index {
            Some(i) if !kind.is_transaction_level() => txn.posting_location(i),
            _ => &txn.location,
        };
        self.errors.push(BookingError::new(
            location.clone(),
            kind,
            Directive::Transaction(txn.clone()),
        ));
    }

    fn book_posting(
        &self,
        txn: &Transaction,
        index: usize,
        posting: &Posting,
        work: &mut Working,
    ) -> Result<Booked, BookingErrorKind> {
        let Some(units) = &posting.units else {
            return Ok(Booked::Done(Vec::new()));
        };
        if let Some(price) = posting.price.as_ref().filter(|p| p.currency.is_none()) {
            return Err(BookingErrorKind::UnresolvedPriceCurrency {
                account: posting.account.clone(),
                price: price.clone(),
            });
        }
        let method = self.methods.get(&posting.account);
        let empty = CostSpec::empty();
        let spec = posting.cost.as_ref().unwrap_or(&empty);
        let location = txn.posting_location(index).clone();
        let inventory = self.working(work, &posting.account);

        match classify(posting, inventory, method) {
            PostingKind::Unspecified => Ok(Booked::Done(Vec::new())),
            PostingKind::Degenerate => {
                let cost = degenerate_cost(inventory, posting, units, spec, txn.date)?;
                Ok(Booked::Done(vec![BookedPosting::from_posting(
                    posting,
                    units.clone(),
                    Some(cost),
                )]))
            }
            PostingKind::Augmentation if lacks_cost_number(posting) => Ok(Booked::CostPending),
            PostingKind::Augmentation => {
                let (booked, merge) = augment(inventory, posting, units, txn.date)?;
                if let Some(plan) = merge {
                    work.adjustments
                        .push(lot_merge(txn, &posting.account, location, plan));
                }
                Ok(Booked::Done(vec![booked]))
            }
            PostingKind::Reduction => {
                let reduction = Reduction {
                    account: &posting.account,
                    units,
                    spec,
                    date: txn.date,
                };
                let resolution = resolve(inventory, &reduction, method)?;
                if let Some(plan) = resolution.merge {
                    work.adjustments
                        .push(lot_merge(txn, &posting.account, location, plan));
                }
                Ok(Booked::Done(
                    resolution
                        .matches
                        .into_iter()
                        .map(|m| BookedPosting::from_posting(posting, m.units, m.cost))
                        .collect(),
                ))
            }
        }
    }

    /// Solve the one missing number of a transaction and book the posting
    /// that lacked it.
    #[allow(clippy::too_many_arguments)]
    fn fill_missing(
        &self,
        txn: &Transaction,
        postings: &[Posting],
        index: usize,
        missing: Missing,
        slots: &mut [Vec<BookedPosting>],
        work: &mut Working,
        tolerances: &Tolerances,
    ) -> Result<(), BookingErrorKind> {
        let posting = &postings[index];
        let others: Vec<BookedPosting> = slots
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != index)
            .flat_map(|(_, booked)| booked.iter().cloned())
            .collect();
        let cannot = || BookingErrorKind::CannotInterpolate {
            account: posting.account.clone(),
            residuals: Vec::new(),
        };

        match missing {
            Missing::Units => {
                let filled = interpolate(&others, posting, tolerances)?;
                self.working(work, &filled.account)
                    .add(Lot::simple(filled.units.clone()));
                slots[index] = vec![filled];
            }
            Missing::CostNumber => {
                let (Some(units), Some(spec)) = (&posting.units, &posting.cost) else {
                    return Err(cannot());
                };
                let currency = spec.currency.as_ref().ok_or_else(cannot)?;
                let per =
                    interpolate_per_unit(&others, &posting.account, units, currency, tolerances)?;
                let filled = Posting {
                    cost: Some(spec.clone().with_number_per(per)),
                    ..posting.clone()
                };
                let inventory = self.working(work, &posting.account);
                let (booked, merge) = augment(inventory, &filled, units, txn.date)?;
                if let Some(plan) = merge {
                    let location = txn.posting_location(index).clone();
                    work.adjustments
                        .push(lot_merge(txn, &posting.account, location, plan));
                }
                slots[index] = vec![booked];
            }
            Missing::PriceNumber => {
                let units = posting.units.as_ref().ok_or_else(cannot)?;
                let currency = posting
                    .price
                    .as_ref()
                    .and_then(|p| p.currency.clone())
                    .ok_or_else(cannot)?;
                // A price only weighs on postings booked without cost.
                if slots[index].iter().any(|p| p.cost.is_some()) {
                    return Err(cannot());
                }
                let per =
                    interpolate_per_unit(&others, &posting.account, units, &currency, tolerances)?;
                for booked in &mut slots[index] {
                    booked.price = Some(Amount::new(per, currency.clone()));
                }
            }
        }
        Ok(())
    }

    /// Finish the pass and hand out the collected state.
    #[must_use]
    pub fn finish(self) -> BookingOutput {
        BookingOutput {
            transactions: Vec::new(),
            errors: self.errors,
            adjustments: self.adjustments,
            balances: self.inventories,
        }
    }
}

fn lot_merge(
    txn: &Transaction,
    account: &str,
    location: SourceLocation,
    plan: MergePlan,
) -> LotMerge {
    tracing::info!(
        "{} {}: merged {} lots into {}",
        txn.date,
        account,
        plan.sources.len(),
        plan.merged
    );
    LotMerge {
        date: txn.date,
        account: account.to_string(),
        location,
        sources: plan.sources,
        merged: plan.merged,
    }
}

/// Add a posting to its inventory as a new or enlarged lot.
///
/// A cost spec must complete into a concrete cost. With the merge marker,
/// all lots of the commodity held at cost are then merged into one.
fn augment(
    inventory: &mut Inventory,
    posting: &Posting,
    units: &Amount,
    date: NaiveDate,
) -> Result<(BookedPosting, Option<MergePlan>), BookingErrorKind> {
    let Some(spec) = &posting.cost else {
        inventory.add(Lot::simple(units.clone()));
        return Ok((BookedPosting::from_posting(posting, units.clone(), None), None));
    };

    let cost = spec
        .complete(units.number, date)
        .ok_or_else(|| BookingErrorKind::IncompleteCost {
            account: posting.account.clone(),
            units: units.clone(),
            spec: spec.clone(),
        })?;
    let lot = Lot::at_cost(units.clone(), cost.clone());

    if !spec.merge {
        inventory.add(lot);
        return Ok((BookedPosting::from_posting(posting, units.clone(), Some(cost)), None));
    }

    let mut trial = inventory.clone();
    trial.add(lot);
    let currency: &Symbol = &units.currency;
    let sources: Vec<&Lot> = trial
        .lots()
        .iter()
        .filter(|l| l.is_at_cost() && l.units.currency == *currency)
        .collect();

    let merge = if sources.len() > 1 {
        let merged = average_lots(&sources).ok_or_else(|| BookingErrorKind::AmbiguousMatch {
            account: posting.account.clone(),
            units: units.clone(),
            spec: spec.clone(),
            candidates: sources.len(),
        })?;
        let plan = MergePlan {
            sources: sources.into_iter().cloned().collect(),
            merged,
        };
        let taken = &plan.sources;
        trial.take_where(|l| taken.contains(l));
        trial.add(plan.merged.clone());
        Some(plan)
    } else {
        None
    };

    *inventory = trial;
    Ok((BookedPosting::from_posting(posting, units.clone(), Some(cost)), merge))
}

/// Whether a cost spec names its commodity but leaves out the number.
fn lacks_cost_number(posting: &Posting) -> bool {
    posting.cost.as_ref().is_some_and(|spec| {
        spec.number_per.is_none() && spec.number_total.is_none() && spec.currency.is_some()
    })
}

/// Cost of a zero-units posting: the completed spec, or the single lot the
/// spec selects. The inventory is not touched.
fn degenerate_cost(
    inventory: &Inventory,
    posting: &Posting,
    units: &Amount,
    spec: &CostSpec,
    date: NaiveDate,
) -> Result<Cost, BookingErrorKind> {
    if let Some(cost) = spec.complete(units.number, date) {
        return Ok(cost);
    }

    let matching: Vec<&Lot> = inventory
        .lots()
        .iter()
        .filter(|l| l.units.currency == units.currency && l.matches(spec))
        .collect();
    match matching.as_slice() {
        [lot] => lot.cost.clone().ok_or_else(|| no_match(posting, units, spec)),
        _ => Err(no_match(posting, units, spec)),
    }
}

fn no_match(posting: &Posting, units: &Amount, spec: &CostSpec) -> BookingErrorKind {
    BookingErrorKind::NoMatchingLot {
        account: posting.account.clone(),
        units: units.clone(),
        spec: spec.clone(),
    }
}

/// Book a list of transactions, already in date order.
///
/// Every error is collected; transactions that fail as a whole are left out
/// of the output.
#[must_use]
pub fn book(
    transactions: &[Transaction],
    methods: &AccountMethods,
    options: &BookingOptions,
) -> BookingOutput {
    let mut engine = BookingEngine::new(options, methods.clone());
    let booked: Vec<BookedTransaction> = transactions
        .iter()
        .filter_map(|txn| engine.book_transaction(txn))
        .collect();

    let mut output = engine.finish();
    output.transactions = booked;
    output
}

/// Book a directive stream, already in date order.
///
/// Account methods come from Open directives, falling back to the
/// `booking_method` option. Directives other than transactions pass
/// through unchanged.
#[must_use]
pub fn book_directives(directives: &[Directive], options: &BookingOptions) -> Ledger {
    let mut engine = BookingEngine::new(options, AccountMethods::new(options.booking_method));
    let mut entries = Vec::with_capacity(directives.len());

    for directive in directives {
        match directive {
            Directive::Transaction(txn) => {
                if let Some(booked) = engine.book_transaction(txn) {
                    entries.push(BookedDirective::Transaction(booked));
                }
            }
            Directive::Open(open) => {
                if let Some(name) = &open.booking {
                    match name.parse::<BookingMethod>() {
                        Ok(method) => engine.set_method(open.account.clone(), method),
                        Err(_) => engine.push_error(BookingError::new(
                            open.location.clone(),
                            BookingErrorKind::InvalidBookingMethod {
                                account: open.account.clone(),
                                method: name.clone(),
                            },
                            directive.clone(),
                        )),
                    }
                }
                entries.push(BookedDirective::Open(open.clone()));
            }
            Directive::Close(close) => entries.push(BookedDirective::Close(close.clone())),
            Directive::Balance(balance) => entries.push(BookedDirective::Balance(balance.clone())),
            Directive::Price(price) => entries.push(BookedDirective::Price(price.clone())),
            Directive::Commodity(commodity) => {
                entries.push(BookedDirective::Commodity(commodity.clone()));
            }
        }
    }

    let output = engine.finish();
    Ledger {
        entries,
        errors: output.errors,
        adjustments: output.adjustments,
        balances: output.balances,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotbook_core::{IncompleteAmount, Open};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn buy(d: NaiveDate, units: Decimal, per: Decimal) -> Transaction {
        Transaction::new(d, "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(units, "HOOL")).with_cost(
                    CostSpec::empty()
                        .with_number_per(per)
                        .with_currency("USD"),
                ),
            )
            .with_posting(Posting::auto("Assets:Cash"))
    }

    #[test]
    fn test_too_many_missing_amounts() {
        let txn = Transaction::new(date(2021, 1, 1), "x")
            .with_posting(Posting::new("Expenses:Food", Amount::new(dec!(5), "USD")))
            .with_posting(Posting::auto("Assets:Cash"))
            .with_posting(Posting::auto("Assets:Bank"));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.transactions.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(matches!(
            output.errors[0].kind,
            BookingErrorKind::TooManyMissingAmounts { count: 2 }
        ));
        assert!(output.balances.is_empty());
    }

    #[test]
    fn test_failed_posting_drops_only_that_posting() {
        let sell = Transaction::new(date(2021, 3, 1), "sell")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(-1), "HOOL"))
                    .with_cost(CostSpec::empty().with_number_per(dec!(9))),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(9), "USD")))
            .with_posting(Posting::auto("Income:Gains"));

        let output = book(
            &[buy(date(2021, 1, 1), dec!(10), dec!(1)), sell],
            &AccountMethods::default(),
            &BookingOptions::default(),
        );

        assert_eq!(output.transactions.len(), 2);
        assert_eq!(output.transactions[1].postings.len(), 1);
        assert_eq!(output.transactions[1].postings[0].account, "Assets:Cash");
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code(), "B0001");
        assert_eq!(output.balances["Assets:Broker"].units("HOOL"), dec!(10));
        assert_eq!(output.balances["Assets:Cash"].units("USD"), dec!(-1));
    }

    #[test]
    fn test_unbalanced_transaction_discards_mutations() {
        let txn = Transaction::new(date(2021, 1, 1), "bad")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL")).with_cost(
                    CostSpec::empty()
                        .with_number_per(dec!(1))
                        .with_currency("USD"),
                ),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(-9), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.transactions.is_empty());
        assert_eq!(output.errors[0].code(), "B0006");
        assert!(output.balances.is_empty());
    }

    #[test]
    fn test_incomplete_cost_on_augmentation() {
        let txn = Transaction::new(date(2021, 1, 1), "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
                    .with_cost(CostSpec::empty().with_number_per(dec!(1))),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(-10), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code(), "B0008");
        assert_eq!(output.transactions[0].postings.len(), 1);
    }

    #[test]
    fn test_degenerate_posting_policy() {
        let zero = |spec: CostSpec| {
            Transaction::new(date(2021, 2, 1), "zero").with_posting(
                Posting::new("Assets:Broker", Amount::zero("HOOL")).with_cost(spec),
            )
        };

        let output = book(
            &[
                buy(date(2021, 1, 1), dec!(10), dec!(1)),
                zero(CostSpec::empty().with_currency("USD")),
                zero(CostSpec::empty().with_currency("EUR")),
            ],
            &AccountMethods::default(),
            &BookingOptions::default(),
        );

        // The first zero posting picks up the single matching lot's cost.
        let booked = &output.transactions[1].postings[0];
        assert_eq!(booked.cost, Some(Cost::new(dec!(1), "USD", date(2021, 1, 1))));
        assert!(booked.units.is_zero());

        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code(), "B0001");
        assert_eq!(output.balances["Assets:Broker"].units("HOOL"), dec!(10));
    }

    #[test]
    fn test_merge_marker_on_augmentation() {
        let add_merged = Transaction::new(date(2021, 2, 1), "buy more")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL")).with_cost(
                    CostSpec::empty()
                        .with_number_per(dec!(3))
                        .with_currency("USD")
                        .with_merge(),
                ),
            )
            .with_posting(Posting::auto("Assets:Cash"));

        let output = book(
            &[buy(date(2021, 1, 1), dec!(10), dec!(1)), add_merged],
            &AccountMethods::default(),
            &BookingOptions::default(),
        );

        assert!(output.errors.is_empty());
        assert_eq!(output.adjustments.len(), 1);
        let inv = &output.balances["Assets:Broker"];
        assert_eq!(inv.len(), 1);
        assert_eq!(
            inv.lots()[0].cost,
            Some(Cost::new(dec!(2), "USD", date(2021, 1, 1)))
        );
    }

    #[test]
    fn test_invalid_booking_method_falls_back() {
        let open = Open::new(date(2021, 1, 1), "Assets:Broker").with_booking("LOWEST");
        let directives = vec![
            Directive::Open(open),
            Directive::Transaction(buy(date(2021, 1, 2), dec!(10), dec!(1))),
        ];
        let options = BookingOptions::default().with_booking_method(BookingMethod::Fifo);

        let ledger = book_directives(&directives, &options);
        assert_eq!(ledger.errors.len(), 1);
        assert_eq!(ledger.errors[0].code(), "B0007");
        assert!(matches!(*ledger.errors[0].entry, Directive::Open(_)));
        assert_eq!(ledger.entries.len(), 2);
    }

    #[test]
    fn test_account_methods_default() {
        let methods =
            AccountMethods::new(BookingMethod::Lifo).with("Assets:A", BookingMethod::Fifo);
        assert_eq!(methods.get("Assets:A"), BookingMethod::Fifo);
        assert_eq!(methods.get("Assets:B"), BookingMethod::Lifo);
    }

    #[test]
    fn test_none_account_books_empty_spec_without_cost() {
        let txn = Transaction::new(date(2021, 1, 1), "short")
            .with_posting(
                Posting::new("Assets:Short", Amount::new(dec!(-3), "HOOL"))
                    .with_cost(CostSpec::empty()),
            )
            .with_posting(Posting::auto("Assets:Other"));
        let methods = AccountMethods::default().with("Assets:Short", BookingMethod::None);

        let output = book(&[txn], &methods, &BookingOptions::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        let booked = &output.transactions[0].postings[0];
        assert_eq!(booked.units, Amount::new(dec!(-3), "HOOL"));
        assert!(booked.cost.is_none());
        assert_eq!(
            output.balances["Assets:Short"].lots(),
            &[Lot::simple(Amount::new(dec!(-3), "HOOL"))]
        );
        assert_eq!(output.balances["Assets:Other"].units("HOOL"), dec!(3));
    }

    #[test]
    fn test_hifo_sells_highest_cost_first() {
        let sell = Transaction::new(date(2021, 4, 1), "sell")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(-15), "HOOL"))
                    .with_cost(CostSpec::empty()),
            )
            .with_posting(Posting::auto("Assets:Cash"));

        let output = book(
            &[
                buy(date(2021, 1, 1), dec!(10), dec!(1)),
                buy(date(2021, 2, 1), dec!(10), dec!(3)),
                buy(date(2021, 3, 1), dec!(10), dec!(2)),
                sell,
            ],
            &AccountMethods::new(BookingMethod::Hifo),
            &BookingOptions::default(),
        );

        assert!(output.errors.is_empty());
        let sale = &output.transactions[3];
        let per: Vec<_> = sale.postings[..2]
            .iter()
            .map(|p| p.cost.as_ref().map(|c| c.number))
            .collect();
        assert_eq!(per, vec![Some(dec!(3)), Some(dec!(2))]);
        assert_eq!(sale.postings[2].units, Amount::new(dec!(40), "USD"));
        assert_eq!(output.balances["Assets:Broker"].units("HOOL"), dec!(15));
    }

    #[test]
    fn test_cost_number_interpolated_from_residual() {
        let txn = Transaction::new(date(2021, 1, 1), "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
                    .with_cost(CostSpec::empty().with_currency("USD")),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(-25.00), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        let lot_cost = Cost::new(dec!(2.5), "USD", date(2021, 1, 1));
        assert_eq!(output.transactions[0].postings[0].cost, Some(lot_cost.clone()));
        assert_eq!(
            output.balances["Assets:Broker"]
                .get("HOOL", Some(&lot_cost))
                .map(|l| l.units.number),
            Some(dec!(10))
        );
    }

    #[test]
    fn test_missing_cost_number_and_units_is_too_many() {
        let txn = Transaction::new(date(2021, 1, 1), "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
                    .with_cost(CostSpec::empty().with_currency("USD")),
            )
            .with_posting(Posting::auto("Assets:Cash"));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.transactions.is_empty());
        assert!(matches!(
            output.errors[0].kind,
            BookingErrorKind::TooManyMissingAmounts { count: 2 }
        ));
        assert!(output.balances.is_empty());
    }

    #[test]
    fn test_price_number_interpolated_from_residual() {
        let txn = Transaction::new(date(2021, 1, 1), "exchange")
            .with_posting(
                Posting::new("Assets:Eur", Amount::new(dec!(-3), "EUR"))
                    .with_incomplete_price(IncompleteAmount::currency_only("USD")),
            )
            .with_posting(Posting::new("Assets:Usd", Amount::new(dec!(6.30), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(
            output.transactions[0].postings[0].price,
            Some(Amount::new(dec!(2.1), "USD"))
        );
    }

    #[test]
    fn test_price_number_on_posting_at_cost_cannot_be_solved() {
        let sell = Transaction::new(date(2021, 2, 1), "sell")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(-10), "HOOL"))
                    .with_cost(CostSpec::empty())
                    .with_incomplete_price(IncompleteAmount::currency_only("USD")),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(10), "USD")));

        let output = book(
            &[buy(date(2021, 1, 1), dec!(10), dec!(1)), sell],
            &AccountMethods::default(),
            &BookingOptions::default(),
        );
        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.errors[0].code(), "B0005");
        assert_eq!(output.balances["Assets:Broker"].units("HOOL"), dec!(10));
    }

    #[test]
    fn test_cost_currency_filled_from_price() {
        let txn = Transaction::new(date(2021, 1, 1), "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
                    .with_cost(CostSpec::empty().with_number_per(dec!(2)))
                    .with_price(Amount::new(dec!(2.5), "USD")),
            )
            .with_posting(Posting::auto("Assets:Cash"));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(
            output.transactions[0].postings[0].cost,
            Some(Cost::new(dec!(2), "USD", date(2021, 1, 1)))
        );
        assert_eq!(output.transactions[0].postings[1].units, Amount::new(dec!(-20), "USD"));
    }

    #[test]
    fn test_price_without_currency_is_rejected() {
        let txn = Transaction::new(date(2021, 1, 1), "exchange")
            .with_posting(
                Posting::new("Assets:Eur", Amount::new(dec!(-3), "EUR")).with_incomplete_price(
                    IncompleteAmount {
                        number: Some(dec!(2)),
                        currency: None,
                    },
                ),
            )
            .with_posting(Posting::new("Assets:Usd", Amount::new(dec!(6), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code(), "B0009");
        assert!(!output.balances.contains_key("Assets:Eur"));
    }

    #[test]
    fn test_failed_posting_leaves_no_empty_inventory() {
        let txn = Transaction::new(date(2021, 1, 1), "buy")
            .with_posting(
                Posting::new("Assets:Broker", Amount::new(dec!(-1), "HOOL"))
                    .with_cost(CostSpec::empty())
                    .with_location(SourceLocation::new("ledger", 7)),
            )
            .with_posting(Posting::new("Assets:Cash", Amount::new(dec!(5), "USD")));

        let output = book(&[txn], &AccountMethods::default(), &BookingOptions::default());
        assert_eq!(output.errors[0].code(), "B0008");
        assert_eq!(output.errors[0].location.lineno, 7);
        assert!(!output.balances.contains_key("Assets:Broker"));
        assert_eq!(output.balances["Assets:Cash"].units("USD"), dec!(5));
    }

    #[test]
    fn test_interpolation_rounds_under_configured_tolerance() {
        let mut options = BookingOptions::default();
        options.set("inferred_tolerance_default", "USD:0.01").unwrap();
        let txn = Transaction::new(date(2021, 1, 1), "exchange")
            .with_posting(Posting::new("Expenses:Food", Amount::new(dec!(10.00), "USD")))
            .with_posting(
                Posting::new("Assets:Eur", Amount::new(dec!(-3), "EUR"))
                    .with_price(Amount::new(dec!(1.23456), "USD")),
            )
            .with_posting(Posting::auto("Assets:Cash"));

        let output = book(&[txn], &AccountMethods::default(), &options);
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(
            output.transactions[0].postings[2].units,
            Amount::new(dec!(-6.30), "USD")
        );
    }
}
