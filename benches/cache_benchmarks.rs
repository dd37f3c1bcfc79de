// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for the Bazaar query cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use tokio::runtime::Runtime;

use bazaar_cache::{search_patterns, KeySet, MarketCache, MarketConfig};
use bazaar_remote::predicate::ilike_matches;
use bazaar_remote::InMemoryStore;

fn seeded_store(rt: &Runtime, count: i64) -> InMemoryStore {
    let store = InMemoryStore::new();
    rt.block_on(async {
        store
            .insert_json(
                "items",
                (1..=count).map(|i| json!({"id": i, "name": format!("Bronze Item {i}")})),
            )
            .await;
        store
            .insert_json("equipment", (1..=count).map(|i| json!({"id": i, "level": i % 90 + 1})))
            .await;
        store
            .insert_json("item_patches", (1..=count).map(|i| json!({"id": i, "patch": 700})))
            .await;
        store.create_collection("marketable_items").await;
    });
    store
}

// ============================================================================
// Key Normalization Benchmarks
// ============================================================================

fn bench_key_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalizer");

    for size in [10i64, 1_000, 10_000] {
        let ids: Vec<i64> = (1..=size).rev().chain(1..=size / 2).collect();
        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_with_input(BenchmarkId::new("key_set", size), &ids, |b, ids| {
            b.iter(|| black_box(KeySet::from_ids(ids.iter().copied())))
        });
    }

    group.bench_function("fuzzy_patterns", |b| {
        b.iter(|| black_box(search_patterns(black_box("brz ingot of the 4th"), true)))
    });

    group.finish();
}

fn bench_ilike(c: &mut Criterion) {
    let mut group = c.benchmark_group("ilike");
    let text = "Augmented Bronze Ingot of the Fourth Patch";

    group.bench_function("exact", |b| {
        b.iter(|| black_box(ilike_matches(black_box("%ingot of%"), text)))
    });
    group.bench_function("fuzzy", |b| {
        b.iter(|| black_box(ilike_matches(black_box("%b%r%z%i%n%g%"), text)))
    });

    group.finish();
}

// ============================================================================
// Market Cache Benchmarks
// ============================================================================

fn bench_items_cold(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store(&rt, 5_000);

    let mut group = c.benchmark_group("market");
    group.throughput(Throughput::Elements(2_500));

    group.bench_function("items_cold_2500", |b| {
        b.to_async(&rt).iter(|| async {
            let cache = MarketCache::new(store.clone(), MarketConfig::default()).unwrap();
            black_box(cache.items(1..=2_500, None).await.unwrap())
        });
    });

    group.finish();
}

fn bench_items_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store(&rt, 5_000);
    let cache = MarketCache::new(store, MarketConfig::default()).unwrap();
    rt.block_on(async { cache.items(1..=2_500, None).await.unwrap() });

    let mut group = c.benchmark_group("market");

    group.bench_function("items_hit_2500", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cache.items((1..=2_500).rev(), None).await.unwrap()) });
    });

    group.finish();
}

fn bench_concurrent_dedup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store(&rt, 1_000);

    let mut group = c.benchmark_group("market");

    group.bench_function("concurrent_identical_32", |b| {
        b.to_async(&rt).iter(|| async {
            let cache = MarketCache::new(store.clone(), MarketConfig::default()).unwrap();
            let lookups = (0..32).map(|_| cache.items(1..=200, None));
            black_box(futures::future::join_all(lookups).await)
        });
    });

    group.finish();
}

fn bench_listing(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store(&rt, 1_000);

    let mut group = c.benchmark_group("market");

    group.bench_function("listing_cold_500", |b| {
        b.to_async(&rt).iter(|| async {
            let cache = MarketCache::new(store.clone(), MarketConfig::default()).unwrap();
            black_box(cache.listing(1..=500, None).await.unwrap())
        });
    });

    group.finish();
}

criterion_group!(normalizer_benches, bench_key_normalization, bench_ilike);
criterion_group!(
    market_benches,
    bench_items_cold,
    bench_items_hit,
    bench_concurrent_dedup,
    bench_listing
);
criterion_main!(normalizer_benches, market_benches);
