//! Implementation of the `lotbook-book` command.

use crate::report::{self, JsonOutput};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lotbook_booking::{book_directives, BookingOptions};
use lotbook_core::{sort_directives, BookingMethod, Directive};
use serde::Deserialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling integration
    Json,
}

/// An input document: booking options and a directive stream.
#[derive(Debug, Default, Deserialize)]
pub struct Document {
    /// Booking options
    #[serde(default)]
    pub options: BookingOptions,
    /// Directives, in any order
    #[serde(default)]
    pub directives: Vec<Directive>,
}

/// Book a JSON directive stream and report errors.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The JSON document to book ("-" reads standard input)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Default booking method, overriding the document's options
    #[arg(short = 'b', long, value_name = "METHOD")]
    pub booking_method: Option<BookingMethod>,

    /// Set a booking option (can be specified multiple times)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Print final inventories after the booked entries
    #[arg(long)]
    pub balances: bool,

    /// Show verbose output including booking decisions
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output (just use exit code)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Read and decode an input document.
pub fn load_document(path: &Path) -> Result<Document> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read standard input")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("failed to decode {}", path.display()))
}

/// Apply command-line overrides on top of the document's options.
pub fn apply_overrides(options: &mut BookingOptions, args: &Args) -> Result<()> {
    for option in &args.options {
        let (key, value) = option
            .split_once('=')
            .with_context(|| format!("invalid option {option:?}, expected KEY=VALUE"))?;
        options
            .set(key.trim(), value.trim())
            .with_context(|| format!("invalid option {option:?}"))?;
    }
    if let Some(method) = args.booking_method {
        options.booking_method = method;
    }
    Ok(())
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let start = std::time::Instant::now();

    let mut document = load_document(&args.file)?;
    apply_overrides(&mut document.options, args)?;

    if args.verbose && !args.quiet {
        eprintln!(
            "Booking {} directives (default method {})...",
            document.directives.len(),
            document.options.booking_method
        );
    }

    sort_directives(&mut document.directives);
    let ledger = book_directives(&document.directives, &document.options);
    let error_count = ledger.errors.len();

    match args.format {
        OutputFormat::Json => {
            let output = JsonOutput::new(&ledger);
            writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Text if !args.quiet => {
            report::print_entries(&ledger.entries, &mut stdout)?;
            if args.balances {
                report::print_balances(&ledger.balances, &mut stdout)?;
                writeln!(stdout)?;
            }
            report::report_adjustments(&ledger.adjustments, &mut stdout)?;
            report::report_booking_errors(&ledger.errors, &mut stdout)?;
            if args.verbose {
                writeln!(
                    stdout,
                    "\nBooked in {:.2}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                )?;
            }
            report::print_summary(error_count, &mut stdout)?;
        }
        OutputFormat::Text => {}
    }

    if error_count > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Main entry point for the book command.
pub fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }

    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
