//! Booking error taxonomy.
//!
//! Errors are collected rather than returned: the booking pass records one
//! [`BookingError`] per failing posting or transaction and carries on.

use lotbook_core::{Amount, CostSpec, Directive, IncompleteAmount, SourceLocation};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// What went wrong while booking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingErrorKind {
    /// B0001: No held lot matches a reduction.
    #[error("No position matches {units} {spec} in {account}")]
    NoMatchingLot {
        /// Account being reduced.
        account: String,
        /// Units of the reduction.
        units: Amount,
        /// Cost filter of the reduction.
        spec: CostSpec,
    },

    /// B0002: Several held lots match a reduction and the method cannot pick.
    #[error("Ambiguous match for {units} {spec} in {account}: {candidates} lots match")]
    AmbiguousMatch {
        /// Account being reduced.
        account: String,
        /// Units of the reduction.
        units: Amount,
        /// Cost filter of the reduction.
        spec: CostSpec,
        /// Number of matching lots.
        candidates: usize,
    },

    /// B0003: A reduction is larger than the lots it may draw from.
    #[error("Reduction of {units} in {account} exceeds the {available} units held")]
    ReductionExceedsLot {
        /// Account being reduced.
        account: String,
        /// Units of the reduction.
        units: Amount,
        /// Units available in the matched lots.
        available: Decimal,
    },

    /// B0004: A transaction leaves out more than one number.
    ///
    /// Elided units, a per-unit cost and a price number each count as one.
    #[error("Too many missing numbers: {count} numbers are left out")]
    TooManyMissingAmounts {
        /// Number of missing numbers.
        count: usize,
    },

    /// B0005: The missing number cannot be determined.
    #[error("Cannot interpolate posting to {account}: residual {}", Residuals(.residuals))]
    CannotInterpolate {
        /// Account of the incomplete posting.
        account: String,
        /// Non-zero residuals (empty if there is nothing to balance against).
        residuals: Vec<Amount>,
    },

    /// B0006: A transaction's weights do not sum to zero.
    #[error("Transaction does not balance: {}", Residuals(.residuals))]
    TransactionDoesNotBalance {
        /// Residuals outside tolerance.
        residuals: Vec<Amount>,
    },

    /// B0007: An account declares a booking method that does not exist.
    #[error("Invalid booking method \"{method}\" for account {account}")]
    InvalidBookingMethod {
        /// The account.
        account: String,
        /// The declared method.
        method: String,
    },

    /// B0008: An augmentation's cost lacks a number or currency.
    #[error("Incomplete cost {spec} for augmentation of {units} in {account}")]
    IncompleteCost {
        /// Account being augmented.
        account: String,
        /// Units of the augmentation.
        units: Amount,
        /// The incomplete cost.
        spec: CostSpec,
    },

    /// B0009: A price names no commodity and the cost has none to lend.
    #[error("Cannot determine the currency of price {price} in {account}")]
    UnresolvedPriceCurrency {
        /// Account of the posting.
        account: String,
        /// The price as written.
        price: IncompleteAmount,
    },
}

impl BookingErrorKind {
    /// Stable error code (e.g., "B0001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoMatchingLot { .. } => "B0001",
            Self::AmbiguousMatch { .. } => "B0002",
            Self::ReductionExceedsLot { .. } => "B0003",
            Self::TooManyMissingAmounts { .. } => "B0004",
            Self::CannotInterpolate { .. } => "B0005",
            Self::TransactionDoesNotBalance { .. } => "B0006",
            Self::InvalidBookingMethod { .. } => "B0007",
            Self::IncompleteCost { .. } => "B0008",
            Self::UnresolvedPriceCurrency { .. } => "B0009",
        }
    }

    /// Whether the error drops a whole transaction rather than one posting.
    #[must_use]
    pub const fn is_transaction_level(&self) -> bool {
        matches!(
            self,
            Self::TooManyMissingAmounts { .. }
                | Self::CannotInterpolate { .. }
                | Self::TransactionDoesNotBalance { .. }
        )
    }
}

struct Residuals<'a>(&'a [Amount]);

impl fmt::Display for Residuals<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        for (i, amount) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{amount}")?;
        }
        Ok(())
    }
}

/// A booking error attributed to a source location and entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: [{}] {kind}", .kind.code())]
pub struct BookingError {
    /// Location of the failing posting or directive.
    pub location: SourceLocation,
    /// What went wrong.
    pub kind: BookingErrorKind,
    /// The offending directive, as given to the engine.
    pub entry: Box<Directive>,
}

impl BookingError {
    /// Create a new booking error.
    #[must_use]
    pub fn new(location: SourceLocation, kind: BookingErrorKind, entry: Directive) -> Self {
        Self {
            location,
            kind,
            entry: Box::new(entry),
        }
    }

    /// Stable error code of the kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }
}
