//! Booking performance benchmarks.
//!
//! Run with: cargo bench -p lotbook-booking

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::NaiveDate;
use lotbook_booking::{book, resolve, AccountMethods, BookingOptions, Reduction};
use lotbook_core::{Amount, BookingMethod, Cost, CostSpec, Inventory, Lot, Posting, Transaction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Generate an inventory with N lots of 10 units each.
fn generate_inventory(num_lots: usize) -> Inventory {
    (0..num_lots)
        .map(|i| {
            let cost = Cost::new(
                dec!(100.00) + Decimal::from(i as i32),
                "USD",
                date(2024, 1 + (i / 28 % 12) as u32, 1 + (i % 28) as u32),
            );
            Lot::at_cost(Amount::new(dec!(10), "STOCK"), cost)
        })
        .collect()
}

/// Generate a ledger alternating purchases and half-size sales.
fn generate_ledger(num_txns: usize) -> Vec<Transaction> {
    (0..num_txns)
        .map(|i| {
            let day = date(2024, 1 + (i / 28 % 12) as u32, 1 + (i % 28) as u32);
            let (units, spec) = if i % 2 == 0 {
                (
                    dec!(10),
                    CostSpec::empty()
                        .with_number_per(dec!(100.00) + Decimal::from(i as i32))
                        .with_currency("USD"),
                )
            } else {
                (dec!(-5), CostSpec::empty())
            };
            Transaction::new(day, "trade")
                .with_posting(
                    Posting::new("Assets:Broker", Amount::new(units, "STOCK")).with_cost(spec),
                )
                .with_posting(Posting::auto("Assets:Cash"))
        })
        .collect()
}

fn bench_resolve(c: &mut Criterion) {
    let methods = [
        BookingMethod::Fifo,
        BookingMethod::Lifo,
        BookingMethod::Average,
    ];

    for method in methods {
        let mut group = c.benchmark_group(format!("resolve_{}", method.to_string().to_lowercase()));

        for size in [10, 100, 500] {
            let units = Amount::new(dec!(-55), "STOCK");
            let spec = CostSpec::empty();

            group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
                b.iter_batched(
                    || generate_inventory(size),
                    |mut inv| {
                        let reduction = Reduction {
                            account: "Assets:Broker",
                            units: &units,
                            spec: &spec,
                            date: date(2025, 1, 1),
                        };
                        let _ = resolve(&mut inv, &reduction, method);
                        black_box(inv)
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }

        group.finish();
    }
}

fn bench_book_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("book_ledger");
    let options = BookingOptions::default();

    for size in [100, 1000, 5000] {
        let ledger = generate_ledger(size);
        group.throughput(Throughput::Elements(size as u64));

        for method in [BookingMethod::Fifo, BookingMethod::Average] {
            let methods = AccountMethods::new(method);
            group.bench_with_input(
                BenchmarkId::new(method.to_string(), size),
                &ledger,
                |b, ledger| {
                    b.iter(|| black_box(book(ledger, &methods, &options)));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_book_ledger);
criterion_main!(benches);
