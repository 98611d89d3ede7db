//! Benchmarks for balance display, registry lookups and event normalization.
//!
//! These run on every wallet event, so they should stay well under a
//! microsecond.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wallet_session::adapters::gateway::normalize_event;
use wallet_session::utils::parse_chain_id;
use wallet_session::{format_native, Address, NetworkRegistry, WalletEvent};

fn bench_format_native(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_native");

    let amounts: [(&str, u128); 4] = [
        ("zero", 0),
        ("whole", 1_000_000_000_000_000_000),
        ("fraction", 1_234_567_890_123_456_789),
        ("dust", 1),
    ];

    for (label, amount) in amounts {
        group.bench_with_input(BenchmarkId::from_parameter(label), &amount, |b, &amount| {
            b.iter(|| format_native(black_box(amount)))
        });
    }

    group.finish();
}

fn bench_parse_chain_id(c: &mut Criterion) {
    c.bench_function("parse_chain_id (hex)", |b| b.iter(|| parse_chain_id(black_box("0x507"))));
    c.bench_function("parse_chain_id (decimal)", |b| b.iter(|| parse_chain_id(black_box("1287"))));
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = NetworkRegistry::moonbeam();

    c.bench_function("resolve_by_chain_id (hit)", |b| {
        b.iter(|| registry.resolve_by_chain_id(black_box(1287)))
    });
    c.bench_function("resolve_by_chain_id (miss)", |b| {
        b.iter(|| registry.resolve_by_chain_id(black_box(9999)))
    });
    c.bench_function("resolve_by_name", |b| {
        b.iter(|| registry.resolve_by_name(black_box("Moonbase Alpha")))
    });
}

fn bench_address(c: &mut Criterion) {
    let raw = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    let address = Address::parse(raw).unwrap();

    c.bench_function("Address::parse", |b| b.iter(|| Address::parse(black_box(raw))));
    c.bench_function("Address::to_checksum", |b| b.iter(|| black_box(&address).to_checksum()));
}

fn bench_normalize_event(c: &mut Criterion) {
    let accounts = WalletEvent::AccountsChanged(vec![
        "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
        "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359".to_string(),
    ]);
    let chain = WalletEvent::ChainChanged("0x501".to_string());

    c.bench_function("normalize_event (accounts)", |b| {
        b.iter(|| normalize_event(black_box(&accounts)))
    });
    c.bench_function("normalize_event (chain)", |b| b.iter(|| normalize_event(black_box(&chain))));
}

criterion_group!(
    benches,
    bench_format_native,
    bench_parse_chain_id,
    bench_registry_lookup,
    bench_address,
    bench_normalize_event
);
criterion_main!(benches);
