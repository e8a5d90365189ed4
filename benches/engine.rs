//! Storage-engine benchmarks: single-item get/set, annex in place vs
//! realloc, and a multi-key churn pattern, in the spirit of the teacher's
//! allocator microbenchmarks but driven through `Cache`'s public API
//! instead of a raw `GlobalAlloc`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use twemcache_core::config::Config;
use twemcache_core::Cache;

fn cache_with_profile(profile: Vec<usize>) -> Cache {
    let mut cfg = Config::default();
    cfg.slab_size = 1024 * 1024;
    cfg.slab_maxbytes = 64 * 1024 * 1024;
    cfg.slab_profile = profile;
    Cache::setup(&cfg, 0)
}

fn bench_set_get(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 64, 512, 4096];
    let mut group = c.benchmark_group("set_then_get");

    for &size in sizes {
        let value = vec![0xABu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("value_size", size), &size, |b, _| {
            let mut cache = cache_with_profile(vec![]);
            let mut i = 0u64;
            b.iter(|| {
                let key = i.to_le_bytes();
                cache.item_set(&key, black_box(&value), 0, 0).unwrap();
                black_box(cache.item_get(&key));
                i = i.wrapping_add(1);
            })
        });
    }
    group.finish();
}

fn bench_annex(c: &mut Criterion) {
    let mut group = c.benchmark_group("annex_append");

    group.bench_function("in_place", |b| {
        let mut cache = cache_with_profile(vec![256, 1024]);
        b.iter(|| {
            cache.item_set(b"k", b"seed", 0, 0).unwrap();
            cache.item_annex(b"k", black_box(b"more"), false).unwrap();
        })
    });

    group.bench_function("forces_realloc", |b| {
        // smallest class barely fits the seed value, so every append moves
        // into the next class up.
        let mut cache = cache_with_profile(vec![32, 64, 128, 256]);
        let seed = vec![0u8; 10];
        let extra = vec![0u8; 40];
        b.iter(|| {
            cache.item_set(b"k", black_box(&seed), 0, 0).unwrap();
            cache.item_annex(b"k", black_box(&extra), false).unwrap();
        })
    });

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_key_churn");
    let n_keys = 1000u64;
    group.throughput(Throughput::Elements(n_keys));

    group.bench_function("set_1000_then_get_all", |b| {
        b.iter(|| {
            let mut cache = cache_with_profile(vec![]);
            for i in 0..n_keys {
                let key = i.to_le_bytes();
                cache.item_set(&key, black_box(b"payload"), 0, 0).unwrap();
            }
            for i in 0..n_keys {
                let key = i.to_le_bytes();
                black_box(cache.item_get(&key));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_set_get, bench_annex, bench_churn);
criterion_main!(benches);
