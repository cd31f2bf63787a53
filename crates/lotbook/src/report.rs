//! Text and JSON rendering of booking results.

use lotbook_booking::{BookingError, Ledger, LotMerge};
use lotbook_core::{BookedDirective, Inventory};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

/// A booking error in JSON form.
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    /// Source file name
    pub file: String,
    /// Line number (1-based, 0 when unknown)
    pub line: u32,
    /// Error code (e.g., "B0001")
    pub code: String,
    /// Error message
    pub message: String,
    /// Type of the offending directive
    pub entry: String,
    /// Date of the offending directive
    pub date: String,
}

impl From<&BookingError> for JsonDiagnostic {
    fn from(error: &BookingError) -> Self {
        Self {
            file: error
                .location
                .filename
                .clone()
                .unwrap_or_else(|| "<unknown>".to_string()),
            line: error.location.lineno,
            code: error.code().to_string(),
            message: error.kind.to_string(),
            entry: error.entry.type_name().to_string(),
            date: error.entry.date().to_string(),
        }
    }
}

/// JSON output structure for a booked ledger.
#[derive(Debug, Serialize)]
pub struct JsonOutput<'a> {
    /// Booked directives
    pub entries: &'a [BookedDirective],
    /// Implicit lot merges
    pub adjustments: &'a [LotMerge],
    /// Final inventory per account
    pub balances: &'a BTreeMap<String, Inventory>,
    /// Booking errors
    pub diagnostics: Vec<JsonDiagnostic>,
    /// Total error count
    pub error_count: usize,
}

impl<'a> JsonOutput<'a> {
    /// Build the JSON view of a ledger.
    #[must_use]
    pub fn new(ledger: &'a Ledger) -> Self {
        Self {
            entries: &ledger.entries,
            adjustments: &ledger.adjustments,
            balances: &ledger.balances,
            diagnostics: ledger.errors.iter().map(JsonDiagnostic::from).collect(),
            error_count: ledger.errors.len(),
        }
    }
}

/// Write booked entries, one blank line apart.
pub fn print_entries<W: Write>(entries: &[BookedDirective], writer: &mut W) -> std::io::Result<()> {
    for entry in entries {
        writeln!(writer, "{entry}")?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Write final inventories of accounts still holding something.
pub fn print_balances<W: Write>(
    balances: &BTreeMap<String, Inventory>,
    writer: &mut W,
) -> std::io::Result<()> {
    for (account, inventory) in balances.iter().filter(|(_, inv)| !inv.is_empty()) {
        writeln!(writer, "{account}  {inventory}")?;
    }
    Ok(())
}

/// Report implicit lot merges.
pub fn report_adjustments<W: Write>(
    adjustments: &[LotMerge],
    writer: &mut W,
) -> std::io::Result<()> {
    for merge in adjustments {
        writeln!(
            writer,
            "note: {} {}: {} lots merged into {} ({})",
            merge.date,
            merge.account,
            merge.sources.len(),
            merge.merged,
            merge.location
        )?;
    }
    Ok(())
}

/// Report booking errors to the given writer.
pub fn report_booking_errors<W: Write>(
    errors: &[BookingError],
    writer: &mut W,
) -> std::io::Result<usize> {
    for error in errors {
        writeln!(writer, "error[{}]: {}", error.code(), error.kind)?;
        writeln!(writer, "  --> {}", error.location)?;
        writeln!(writer, "{}", indent(&error.entry.to_string()))?;
        writeln!(writer)?;
    }
    Ok(errors.len())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("   | {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a summary of errors.
pub fn print_summary<W: Write>(errors: usize, writer: &mut W) -> std::io::Result<()> {
    if errors == 0 {
        writeln!(writer, "\x1b[32m\u{2713}\x1b[0m No errors found")?;
    } else {
        let error_text = if errors == 1 { "error" } else { "errors" };
        writeln!(writer, "\x1b[31m\u{2717}\x1b[0m {errors} {error_text}")?;
    }
    Ok(())
}
