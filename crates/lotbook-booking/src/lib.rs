//! Inventory booking engine for lotbook.
//!
//! This crate provides:
//! - Lot matching for reducing postings, under seven booking methods
//! - Transaction interpolation (filling in one missing units, cost or price
//!   number)
//! - Transaction balancing verification
//! - Tolerance inference from the precision of written numbers
//!
//! # Booking
//!
//! Every posting is classified against its account's inventory. Reductions
//! are matched against held lots by the account's [`BookingMethod`]; the
//! booked posting is split per lot drawn on and carries the lot's cost.
//!
//! ```
//! use lotbook_booking::{book, AccountMethods, BookingOptions};
//! use lotbook_core::{Amount, BookingMethod, CostSpec, NaiveDate, Posting, Transaction};
//! use rust_decimal_macros::dec;
//!
//! let jan = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
//! let feb = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
//! let buy = |date, per| {
//!     Transaction::new(date, "buy")
//!         .with_posting(
//!             Posting::new("Assets:Broker", Amount::new(dec!(10), "HOOL"))
//!                 .with_cost(CostSpec::empty().with_number_per(per).with_currency("USD")),
//!         )
//!         .with_posting(Posting::auto("Assets:Cash"))
//! };
//! let sell = Transaction::new(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(), "sell")
//!     .with_posting(
//!         Posting::new("Assets:Broker", Amount::new(dec!(-15), "HOOL"))
//!             .with_cost(CostSpec::empty()),
//!     )
//!     .with_posting(Posting::auto("Assets:Cash"));
//!
//! let output = book(
//!     &[buy(jan, dec!(1)), buy(feb, dec!(2)), sell],
//!     &AccountMethods::new(BookingMethod::Fifo),
//!     &BookingOptions::default(),
//! );
//!
//! assert!(output.errors.is_empty());
//! // The sale is split across both lots, oldest first.
//! let sale = &output.transactions[2];
//! assert_eq!(sale.postings[0].units, Amount::new(dec!(-10), "HOOL"));
//! assert_eq!(sale.postings[1].units, Amount::new(dec!(-5), "HOOL"));
//! assert_eq!(sale.postings[2].units, Amount::new(dec!(20), "USD"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod book;
mod classify;
mod error;
mod interpolate;
mod options;
pub mod resolve;
mod tolerance;

pub use book::{
    book, book_directives, AccountMethods, BookingEngine, BookingOutput, Ledger, LotMerge,
};
pub use classify::{classify, PostingKind};
pub use error::{BookingError, BookingErrorKind};
pub use interpolate::{
    calculate_residual, check_balance, fill_currencies, interpolate, interpolate_per_unit,
};
pub use options::{BookingOptions, OptionError, KNOWN_OPTIONS};
pub use resolve::{resolve, LotMatch, MergePlan, Reduction, ReductionStrategy, Resolution};
pub use tolerance::Tolerances;

pub use lotbook_core::BookingMethod;
