//! Criterion benchmarks for the membership lookup strategies.
//!
//! Run with:
//!   cargo bench --bench lookup
//!
//! Builds an in-memory sorted column of pseudorandom MD5-width hashes and
//! measures `contains` under each strategy, for both present and absent
//! queries. The interesting comparison is basic (full binary search)
//! against the block hint, which should narrow the window to a handful of
//! entries at real corpus sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use hset::hint::{build_hint, compute_radius};
use hset::lookup::{HashArray, LookupStrategy};

fn sorted_column(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut hashes: Vec<[u8; 16]> = (0..n).map(|_| rng.gen()).collect();
    hashes.sort_unstable();
    hashes.concat()
}

fn bench_contains(c: &mut Criterion) {
    let mut group = c.benchmark_group("contains");

    for &n in &[100_000usize, 1_000_000] {
        let data = sorted_column(n, 0x5EED);
        let arr = HashArray::new(&data, 16);

        let strategies: Vec<(&str, LookupStrategy)> = vec![
            ("basic", LookupStrategy::Basic),
            ("radius", LookupStrategy::Radius(compute_radius(arr))),
            ("range", LookupStrategy::from_hint(Some(&build_hint(arr, 0)))),
            ("block8", LookupStrategy::from_hint(Some(&build_hint(arr, 8)))),
        ];

        // queries: half present, half random
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let queries: Vec<[u8; 16]> = (0..1024)
            .map(|i| {
                if i % 2 == 0 {
                    let k: usize = rng.gen_range(0..n);
                    arr.get(k).try_into().unwrap()
                } else {
                    rng.gen()
                }
            })
            .collect();

        for (name, strategy) in &strategies {
            group.bench_with_input(BenchmarkId::new(*name, n), &queries, |b, queries| {
                let mut i = 0;
                b.iter(|| {
                    let q = &queries[i & 1023];
                    i += 1;
                    strategy.contains(arr, q)
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_contains);
criterion_main!(benches);
