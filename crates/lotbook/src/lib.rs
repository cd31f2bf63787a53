//! Lotbook CLI tools.
//!
//! - `lotbook-book`: Book a JSON directive stream and report booking errors
//!
//! # Example Usage
//!
//! ```bash
//! lotbook-book ledger.json
//! lotbook-book --booking-method FIFO -o inferred_tolerance_default=USD:0.01 ledger.json
//! lotbook-book --format json - < ledger.json
//! ```
//!
//! The input document holds optional booking options and the directives:
//!
//! ```json
//! {
//!   "options": { "booking_method": "FIFO" },
//!   "directives": [
//!     { "type": "open", "date": "2021-01-01", "account": "Assets:Broker", "booking": "LIFO" }
//!   ]
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod report;
