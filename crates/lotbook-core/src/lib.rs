//! Core types for lotbook
//!
//! This crate provides the data model shared by the booking engine and its
//! callers:
//!
//! - [`Symbol`] - A cheaply cloned commodity symbol
//! - [`Amount`] - A decimal number with a commodity
//! - [`IncompleteAmount`] - A price as written, possibly missing parts
//! - [`Cost`] - Acquisition cost of a lot
//! - [`CostSpec`] - Partial cost written on a posting before booking
//! - [`Lot`] - Units held at an optional cost
//! - [`Inventory`] - The lots held by one account
//! - [`BookingMethod`] - How reductions are matched against lots
//! - [`Directive`] / [`BookedDirective`] - Entries before and after booking
//!
//! # Example
//!
//! ```
//! use lotbook_core::{Amount, Cost, CostSpec, Inventory, Lot};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let jan = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
//! let feb = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
//!
//! let mut inv = Inventory::new();
//! inv.add(Lot::at_cost(Amount::new(dec!(10), "HOOL"), Cost::new(dec!(1), "USD", jan)));
//! inv.add(Lot::at_cost(Amount::new(dec!(10), "HOOL"), Cost::new(dec!(2), "USD", feb)));
//!
//! // Selling with a date filter selects a single lot.
//! let sell = Amount::new(dec!(-4), "HOOL");
//! let matched = inv.candidates(&sell, &CostSpec::empty().with_date(feb));
//! assert_eq!(matched.len(), 1);
//! assert_eq!(inv.units("HOOL"), dec!(20));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod cost;
pub mod directive;
pub mod inventory;
pub mod lot;
pub mod symbol;

pub use amount::{Amount, IncompleteAmount};
pub use cost::{Cost, CostSpec};
pub use directive::{
    sort_directives, Balance, BookedDirective, BookedPosting, BookedTransaction, Close,
    Commodity, Directive, DirectivePriority, MetaValue, Metadata, Open, Posting, Price,
    SourceLocation, Transaction,
};
pub use inventory::{BookingMethod, Inventory, ParseBookingMethodError};
pub use lot::Lot;
pub use symbol::Symbol;

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
