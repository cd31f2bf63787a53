//! Directive types consumed and produced by the booking engine.
//!
//! The engine reads an ordered stream of [`Directive`]s and writes back a
//! stream of [`BookedDirective`]s. Only transactions change shape while
//! booking: a [`Transaction`] may carry elided amounts and partial
//! [`CostSpec`]s, while a [`BookedTransaction`] holds only complete amounts
//! and concrete [`Cost`]s. Every other directive passes through unchanged.
//!
//! - [`Transaction`] - transfers between accounts
//! - [`Open`] - opens an account, optionally declaring its booking method
//! - [`Close`] - closes an account
//! - [`Balance`] - balance assertion (passed through, not checked)
//! - [`Price`] - commodity price
//! - [`Commodity`] - commodity declaration

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{Amount, Cost, CostSpec, IncompleteAmount};

/// Where a directive or posting came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Source file name, if known
    #[serde(default)]
    pub filename: Option<String>,
    /// 1-based line number (0 when unknown)
    #[serde(default)]
    pub lineno: u32,
}

impl SourceLocation {
    /// Create a location in a named file.
    #[must_use]
    pub fn new(filename: impl Into<String>, lineno: u32) -> Self {
        Self {
            filename: Some(filename.into()),
            lineno,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filename = self.filename.as_deref().unwrap_or("<unknown>");
        write!(f, "{filename}:{}", self.lineno)
    }
}

/// Metadata value types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// String value
    String(String),
    /// Date value
    Date(NaiveDate),
    /// Numeric value
    Number(Decimal),
    /// Boolean value
    Bool(bool),
    /// Amount value
    Amount(Amount),
    /// Null value
    None,
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Date(d) => write!(f, "{d}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Amount(a) => write!(f, "{a}"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Metadata is a key-value map attached to directives and postings.
pub type Metadata = HashMap<String, MetaValue>;

/// A posting as written, before booking.
///
/// `units` is `None` for an elided posting whose amount is inferred from the
/// rest of the transaction. `cost` is a possibly partial spec: a filter on a
/// reduction, a template on an augmentation. `price` is always per unit and
/// may lack its number or commodity until booking fills them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// The account for this posting
    pub account: String,
    /// The units (None for an elided amount)
    #[serde(default)]
    pub units: Option<Amount>,
    /// Cost specification
    #[serde(default)]
    pub cost: Option<CostSpec>,
    /// Per-unit price annotation, possibly incomplete
    #[serde(default)]
    pub price: Option<IncompleteAmount>,
    /// Posting flag
    #[serde(default)]
    pub flag: Option<char>,
    /// Posting metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Posting location, when it differs from the transaction's
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl Posting {
    /// Create a posting with complete units.
    #[must_use]
    pub fn new(account: impl Into<String>, units: Amount) -> Self {
        Self {
            account: account.into(),
            units: Some(units),
            cost: None,
            price: None,
            flag: None,
            meta: Metadata::new(),
            location: None,
        }
    }

    /// Create a posting whose amount is to be interpolated.
    #[must_use]
    pub fn auto(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            units: None,
            cost: None,
            price: None,
            flag: None,
            meta: Metadata::new(),
            location: None,
        }
    }

    /// Add a cost specification.
    #[must_use]
    pub fn with_cost(mut self, cost: CostSpec) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Add a per-unit price.
    #[must_use]
    pub fn with_price(mut self, price: Amount) -> Self {
        self.price = Some(price.into());
        self
    }

    /// Add a per-unit price that may lack its number or commodity.
    #[must_use]
    pub fn with_incomplete_price(mut self, price: IncompleteAmount) -> Self {
        self.price = Some(price);
        self
    }

    /// Add a flag.
    #[must_use]
    pub const fn with_flag(mut self, flag: char) -> Self {
        self.flag = Some(flag);
        self
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Check if this posting has an amount.
    #[must_use]
    pub const fn has_units(&self) -> bool {
        self.units.is_some()
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        if let Some(flag) = self.flag {
            write!(f, "{flag} ")?;
        }
        write!(f, "{}", self.account)?;
        if let Some(units) = &self.units {
            write!(f, "  {units}")?;
        }
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        if let Some(price) = &self.price {
            write!(f, " @ {price}")?;
        }
        Ok(())
    }
}

/// A posting after booking: complete units and a concrete cost, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedPosting {
    /// The account for this posting
    pub account: String,
    /// The units
    pub units: Amount,
    /// The resolved lot cost
    #[serde(default)]
    pub cost: Option<Cost>,
    /// Per-unit price annotation
    #[serde(default)]
    pub price: Option<Amount>,
    /// Posting flag
    #[serde(default)]
    pub flag: Option<char>,
    /// Posting metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Posting location
    #[serde(default)]
    pub location: Option<SourceLocation>,
}

impl BookedPosting {
    /// Book a posting with the given units and cost, keeping everything else.
    ///
    /// An incomplete price is left out; the caller fills it in.
    #[must_use]
    pub fn from_posting(posting: &Posting, units: Amount, cost: Option<Cost>) -> Self {
        Self {
            account: posting.account.clone(),
            units,
            cost,
            price: posting.price.as_ref().and_then(IncompleteAmount::as_amount),
            flag: posting.flag,
            meta: posting.meta.clone(),
            location: posting.location.clone(),
        }
    }

    /// The amount this posting contributes to the transaction balance.
    ///
    /// Units converted through the cost if present, else through the price,
    /// else the units themselves.
    #[must_use]
    pub fn weight(&self) -> Amount {
        if let Some(cost) = &self.cost {
            cost.total_cost(self.units.number)
        } else if let Some(price) = &self.price {
            self.units.convert(price.number, price.currency.clone())
        } else {
            self.units.clone()
        }
    }
}

impl From<&BookedPosting> for Posting {
    fn from(booked: &BookedPosting) -> Self {
        Self {
            account: booked.account.clone(),
            units: Some(booked.units.clone()),
            cost: booked.cost.as_ref().map(CostSpec::from),
            price: booked.price.clone().map(IncompleteAmount::from),
            flag: booked.flag,
            meta: booked.meta.clone(),
            location: booked.location.clone(),
        }
    }
}

impl fmt::Display for BookedPosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        if let Some(flag) = self.flag {
            write!(f, "{flag} ")?;
        }
        write!(f, "{}  {}", self.account, self.units)?;
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        if let Some(price) = &self.price {
            write!(f, " @ {price}")?;
        }
        Ok(())
    }
}

const fn default_flag() -> char {
    '*'
}

/// A transaction directive, before booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction date
    pub date: NaiveDate,
    /// Transaction flag (* or !)
    #[serde(default = "default_flag")]
    pub flag: char,
    /// Payee (optional)
    #[serde(default)]
    pub payee: Option<String>,
    /// Narration (description)
    #[serde(default)]
    pub narration: String,
    /// Tags attached to this transaction
    #[serde(default)]
    pub tags: Vec<String>,
    /// Links attached to this transaction
    #[serde(default)]
    pub links: Vec<String>,
    /// Transaction metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Postings (account entries)
    pub postings: Vec<Posting>,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Transaction {
    /// Create a new transaction.
    #[must_use]
    pub fn new(date: NaiveDate, narration: impl Into<String>) -> Self {
        Self {
            date,
            flag: '*',
            payee: None,
            narration: narration.into(),
            tags: Vec::new(),
            links: Vec::new(),
            meta: Metadata::new(),
            postings: Vec::new(),
            location: SourceLocation::default(),
        }
    }

    /// Set the flag.
    #[must_use]
    pub const fn with_flag(mut self, flag: char) -> Self {
        self.flag = flag;
        self
    }

    /// Set the payee.
    #[must_use]
    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    /// Add a posting.
    #[must_use]
    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    /// Set the source location.
    #[must_use]
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    /// Location of a posting, falling back to the transaction's.
    #[must_use]
    pub fn posting_location(&self, index: usize) -> &SourceLocation {
        self.postings
            .get(index)
            .and_then(|p| p.location.as_ref())
            .unwrap_or(&self.location)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(
            f,
            self.date,
            self.flag,
            self.payee.as_deref(),
            &self.narration,
            &self.tags,
            &self.links,
        )?;
        for posting in &self.postings {
            write!(f, "\n{posting}")?;
        }
        Ok(())
    }
}

/// A transaction after booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedTransaction {
    /// Transaction date
    pub date: NaiveDate,
    /// Transaction flag (* or !)
    #[serde(default = "default_flag")]
    pub flag: char,
    /// Payee (optional)
    #[serde(default)]
    pub payee: Option<String>,
    /// Narration (description)
    #[serde(default)]
    pub narration: String,
    /// Tags attached to this transaction
    #[serde(default)]
    pub tags: Vec<String>,
    /// Links attached to this transaction
    #[serde(default)]
    pub links: Vec<String>,
    /// Transaction metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Booked postings
    pub postings: Vec<BookedPosting>,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl BookedTransaction {
    /// Copy the header of an unbooked transaction around booked postings.
    #[must_use]
    pub fn from_transaction(txn: &Transaction, postings: Vec<BookedPosting>) -> Self {
        Self {
            date: txn.date,
            flag: txn.flag,
            payee: txn.payee.clone(),
            narration: txn.narration.clone(),
            tags: txn.tags.clone(),
            links: txn.links.clone(),
            meta: txn.meta.clone(),
            postings,
            location: txn.location.clone(),
        }
    }
}

impl From<&BookedTransaction> for Transaction {
    fn from(booked: &BookedTransaction) -> Self {
        Self {
            date: booked.date,
            flag: booked.flag,
            payee: booked.payee.clone(),
            narration: booked.narration.clone(),
            tags: booked.tags.clone(),
            links: booked.links.clone(),
            meta: booked.meta.clone(),
            postings: booked.postings.iter().map(Posting::from).collect(),
            location: booked.location.clone(),
        }
    }
}

impl fmt::Display for BookedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_header(
            f,
            self.date,
            self.flag,
            self.payee.as_deref(),
            &self.narration,
            &self.tags,
            &self.links,
        )?;
        for posting in &self.postings {
            write!(f, "\n{posting}")?;
        }
        Ok(())
    }
}

fn write_header(
    f: &mut fmt::Formatter<'_>,
    date: NaiveDate,
    flag: char,
    payee: Option<&str>,
    narration: &str,
    tags: &[String],
    links: &[String],
) -> fmt::Result {
    write!(f, "{date} {flag} ")?;
    if let Some(payee) = payee {
        write!(f, "\"{payee}\" ")?;
    }
    write!(f, "\"{narration}\"")?;
    for tag in tags {
        write!(f, " #{tag}")?;
    }
    for link in links {
        write!(f, " ^{link}")?;
    }
    Ok(())
}

/// An open account directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    /// Date account was opened
    pub date: NaiveDate,
    /// Account name (e.g., "Assets:Broker")
    pub account: String,
    /// Allowed currencies (empty = any currency allowed)
    #[serde(default)]
    pub currencies: Vec<String>,
    /// Booking method name, as written
    #[serde(default)]
    pub booking: Option<String>,
    /// Metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Open {
    /// Create a new open directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            currencies: Vec::new(),
            booking: None,
            meta: Metadata::new(),
            location: SourceLocation::default(),
        }
    }

    /// Set allowed currencies.
    #[must_use]
    pub fn with_currencies(mut self, currencies: Vec<String>) -> Self {
        self.currencies = currencies;
        self
    }

    /// Set booking method.
    #[must_use]
    pub fn with_booking(mut self, booking: impl Into<String>) -> Self {
        self.booking = Some(booking.into());
        self
    }
}

impl fmt::Display for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} open {}", self.date, self.account)?;
        if !self.currencies.is_empty() {
            write!(f, " {}", self.currencies.join(","))?;
        }
        if let Some(booking) = &self.booking {
            write!(f, " \"{booking}\"")?;
        }
        Ok(())
    }
}

/// A close account directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Date account was closed
    pub date: NaiveDate,
    /// Account name
    pub account: String,
    /// Metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Close {
    /// Create a new close directive.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>) -> Self {
        Self {
            date,
            account: account.into(),
            meta: Metadata::new(),
            location: SourceLocation::default(),
        }
    }
}

impl fmt::Display for Close {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} close {}", self.date, self.account)
    }
}

/// A balance assertion directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Assertion date
    pub date: NaiveDate,
    /// Account to check
    pub account: String,
    /// Expected amount
    pub amount: Amount,
    /// Explicit tolerance
    #[serde(default)]
    pub tolerance: Option<Decimal>,
    /// Metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Balance {
    /// Create a new balance assertion.
    #[must_use]
    pub fn new(date: NaiveDate, account: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            account: account.into(),
            amount,
            tolerance: None,
            meta: Metadata::new(),
            location: SourceLocation::default(),
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} balance {} {}", self.date, self.account, self.amount)?;
        if let Some(tol) = self.tolerance {
            write!(f, " ~ {tol}")?;
        }
        Ok(())
    }
}

/// A price directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Price date
    pub date: NaiveDate,
    /// Currency being priced
    pub currency: String,
    /// Price amount (in another currency)
    pub amount: Amount,
    /// Metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Price {
    /// Create a new price directive.
    #[must_use]
    pub fn new(date: NaiveDate, currency: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            currency: currency.into(),
            amount,
            meta: Metadata::new(),
            location: SourceLocation::default(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} price {} {}", self.date, self.currency, self.amount)
    }
}

/// A commodity declaration directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    /// Declaration date
    pub date: NaiveDate,
    /// Commodity symbol
    pub currency: String,
    /// Metadata
    #[serde(default)]
    pub meta: Metadata,
    /// Source location
    #[serde(default)]
    pub location: SourceLocation,
}

impl Commodity {
    /// Create a new commodity declaration.
    #[must_use]
    pub fn new(date: NaiveDate, currency: impl Into<String>) -> Self {
        Self {
            date,
            currency: currency.into(),
            meta: Metadata::new(),
            location: SourceLocation::default(),
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} commodity {}", self.date, self.currency)
    }
}

/// Directive ordering priority for sorting.
///
/// When directives have the same date, they are sorted by type priority
/// to ensure proper processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectivePriority {
    /// Open accounts first so they exist before use
    Open = 0,
    /// Commodities declared before use
    Commodity = 1,
    /// Balance assertions hold at the start of the day
    Balance = 2,
    /// Main entries
    Transaction = 3,
    /// Prices at end of day
    Price = 4,
    /// Accounts closed after all activity
    Close = 5,
}

macro_rules! directive_enum {
    ($(#[$attr:meta])* $name:ident, $txn:ty) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "type", rename_all = "lowercase")]
        pub enum $name {
            /// Transaction directive
            Transaction($txn),
            /// Open account
            Open(Open),
            /// Close account
            Close(Close),
            /// Balance assertion
            Balance(Balance),
            /// Price directive
            Price(Price),
            /// Commodity declaration
            Commodity(Commodity),
        }

        impl $name {
            /// Get the date of this directive.
            #[must_use]
            pub const fn date(&self) -> NaiveDate {
                match self {
                    Self::Transaction(t) => t.date,
                    Self::Open(o) => o.date,
                    Self::Close(c) => c.date,
                    Self::Balance(b) => b.date,
                    Self::Price(p) => p.date,
                    Self::Commodity(c) => c.date,
                }
            }

            /// Get the source location of this directive.
            #[must_use]
            pub const fn location(&self) -> &SourceLocation {
                match self {
                    Self::Transaction(t) => &t.location,
                    Self::Open(o) => &o.location,
                    Self::Close(c) => &c.location,
                    Self::Balance(b) => &b.location,
                    Self::Price(p) => &p.location,
                    Self::Commodity(c) => &c.location,
                }
            }

            /// Get the directive type name.
            #[must_use]
            pub const fn type_name(&self) -> &'static str {
                match self {
                    Self::Transaction(_) => "transaction",
                    Self::Open(_) => "open",
                    Self::Close(_) => "close",
                    Self::Balance(_) => "balance",
                    Self::Price(_) => "price",
                    Self::Commodity(_) => "commodity",
                }
            }

            /// Get the sorting priority for this directive.
            #[must_use]
            pub const fn priority(&self) -> DirectivePriority {
                match self {
                    Self::Open(_) => DirectivePriority::Open,
                    Self::Commodity(_) => DirectivePriority::Commodity,
                    Self::Balance(_) => DirectivePriority::Balance,
                    Self::Transaction(_) => DirectivePriority::Transaction,
                    Self::Price(_) => DirectivePriority::Price,
                    Self::Close(_) => DirectivePriority::Close,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Transaction(t) => write!(f, "{t}"),
                    Self::Open(o) => write!(f, "{o}"),
                    Self::Close(c) => write!(f, "{c}"),
                    Self::Balance(b) => write!(f, "{b}"),
                    Self::Price(p) => write!(f, "{p}"),
                    Self::Commodity(c) => write!(f, "{c}"),
                }
            }
        }
    };
}

directive_enum!(
    /// A directive as read, before booking.
    Directive,
    Transaction
);

directive_enum!(
    /// A directive after booking.
    BookedDirective,
    BookedTransaction
);

impl Directive {
    /// Get as a transaction, if this is one.
    #[must_use]
    pub const fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

impl BookedDirective {
    /// Get as a booked transaction, if this is one.
    #[must_use]
    pub const fn as_transaction(&self) -> Option<&BookedTransaction> {
        match self {
            Self::Transaction(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&BookedDirective> for Directive {
    fn from(booked: &BookedDirective) -> Self {
        match booked {
            BookedDirective::Transaction(t) => Self::Transaction(t.into()),
            BookedDirective::Open(o) => Self::Open(o.clone()),
            BookedDirective::Close(c) => Self::Close(c.clone()),
            BookedDirective::Balance(b) => Self::Balance(b.clone()),
            BookedDirective::Price(p) => Self::Price(p.clone()),
            BookedDirective::Commodity(c) => Self::Commodity(c.clone()),
        }
    }
}

/// Sort directives by date, then by type priority.
///
/// This is a stable sort that preserves document order for directives
/// with the same date and type.
pub fn sort_directives(directives: &mut [Directive]) {
    directives.sort_by(|a, b| {
        a.date()
            .cmp(&b.date())
            .then_with(|| a.priority().cmp(&b.priority()))
    });
}
