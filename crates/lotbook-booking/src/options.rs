//! Ledger options that influence booking.

use lotbook_core::BookingMethod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Option names understood by [`BookingOptions::set`].
pub const KNOWN_OPTIONS: &[&str] = &[
    "booking_method",
    "inferred_tolerance_default",
    "inferred_tolerance_multiplier",
    "infer_tolerance_from_cost",
];

/// Error returned when an option cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// The option name is not known.
    #[error("unknown option \"{0}\", expected one of {known}", known = KNOWN_OPTIONS.join(", "))]
    UnknownOption(String),

    /// The option value could not be parsed.
    #[error("invalid value \"{value}\" for option \"{key}\": expected {expected}")]
    InvalidValue {
        /// Option name.
        key: String,
        /// Rejected value.
        value: String,
        /// What the option accepts.
        expected: &'static str,
    },
}

/// Booking configuration.
///
/// These mirror the `option` directives of a ledger that affect booking.
///
/// ```
/// use lotbook_booking::BookingOptions;
/// use lotbook_core::BookingMethod;
///
/// let mut opts = BookingOptions::default();
/// opts.set("booking_method", "fifo").unwrap();
/// opts.set("inferred_tolerance_default", "USD:0.01").unwrap();
///
/// assert_eq!(opts.booking_method, BookingMethod::Fifo);
/// assert!(opts.set("title", "My Ledger").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingOptions {
    /// Method for accounts whose Open directive declares none.
    pub booking_method: BookingMethod,
    /// Configured tolerances per currency; the key `*` sets the fallback.
    pub inferred_tolerance_default: HashMap<String, Decimal>,
    /// Multiplier applied to the last digit of inferred precision.
    pub inferred_tolerance_multiplier: Decimal,
    /// Also widen the cost currency tolerance by units tolerance times cost.
    pub infer_tolerance_from_cost: bool,
}

impl Default for BookingOptions {
    fn default() -> Self {
        Self {
            booking_method: BookingMethod::Strict,
            inferred_tolerance_default: HashMap::new(),
            inferred_tolerance_multiplier: Decimal::new(5, 1), // 0.5
            infer_tolerance_from_cost: false,
        }
    }
}

impl BookingOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default booking method.
    #[must_use]
    pub const fn with_booking_method(mut self, method: BookingMethod) -> Self {
        self.booking_method = method;
        self
    }

    /// Set an option by name.
    ///
    /// `inferred_tolerance_default` may be given several times, once per
    /// currency. Other options overwrite the previous value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let invalid = |expected| OptionError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };

        match key {
            "booking_method" => {
                self.booking_method = value.parse().map_err(|_| {
                    invalid("one of STRICT, STRICT_WITH_SIZE, FIFO, LIFO, HIFO, AVERAGE, NONE")
                })?;
            }
            "inferred_tolerance_default" => {
                let (currency, tol) = value
                    .split_once(':')
                    .ok_or_else(|| invalid("CURRENCY:TOLERANCE"))?;
                let tol = Decimal::from_str(tol.trim())
                    .map_err(|_| invalid("CURRENCY:TOLERANCE"))?;
                if currency.trim().is_empty() || tol.is_sign_negative() {
                    return Err(invalid("CURRENCY:TOLERANCE"));
                }
                self.inferred_tolerance_default
                    .insert(currency.trim().to_string(), tol);
            }
            "inferred_tolerance_multiplier" => {
                let d = Decimal::from_str(value.trim()).map_err(|_| invalid("decimal number"))?;
                if d.is_sign_negative() {
                    return Err(invalid("non-negative decimal number"));
                }
                self.inferred_tolerance_multiplier = d;
            }
            "infer_tolerance_from_cost" => {
                self.infer_tolerance_from_cost =
                    parse_bool(value).ok_or_else(|| invalid("TRUE or FALSE"))?;
            }
            _ => return Err(OptionError::UnknownOption(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
