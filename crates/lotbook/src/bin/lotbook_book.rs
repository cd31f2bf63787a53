//! lotbook-book - Book a directive stream.
//!
//! Resolves lots, interpolates missing amounts, and reports booking errors.

fn main() -> std::process::ExitCode {
    lotbook::cmd::book::main()
}
