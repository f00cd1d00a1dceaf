// e2e/lookup.rs — lookup-engine behaviour on realistic column sizes
//
// Builds columns of tens of thousands of pseudorandom hashes and checks
// the interpolation machinery end to end: no false negatives, vanishing
// false positives, window bracketing for the block hint, and the
// equivalence of a zero-bit block hint with the range hint.

use std::collections::HashSet;

use hset::format::parse::parse;
use hset::format::HintData;
use hset::lookup::{expected_index, HashArray, LookupStrategy};
use hset::{HashKind, HashsetBuilder, Reader};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::TempDir;

const N: usize = 50_000;

fn random_hashes(seed: u64, n: usize) -> Vec<[u8; 16]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

fn build(dir: &TempDir, name: &str, hashes: &[[u8; 16]], bucket_bits: u8) -> Reader {
    let path = dir.path().join(format!("{name}.hset"));
    let mut b = HashsetBuilder::open(
        name,
        "lookup corpus",
        &[HashKind::Md5],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();
    b.set_bucket_bits(bucket_bits);
    for h in hashes {
        b.add_record(&[Some(h)]).unwrap();
    }
    b.finalize().unwrap();
    Reader::open_path(&path).unwrap()
}

#[test]
fn no_false_negatives_and_no_chance_hits() {
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(0xFEED, N);
    let r = build(&dir, "corpus", &hashes, 8);
    let col = r.column_index(HashKind::Md5).unwrap();

    // every inserted hash is found
    for h in hashes.iter().step_by(97) {
        assert!(r.contains(col, h));
    }

    // hashes drawn from a disjoint pool are not found
    let present: HashSet<[u8; 16]> = hashes.iter().copied().collect();
    let mut rng = StdRng::seed_from_u64(0xD15C0);
    let mut tried = 0;
    while tried < 200 {
        let probe: [u8; 16] = rng.gen();
        if present.contains(&probe) {
            continue;
        }
        assert!(!r.contains(col, &probe));
        tried += 1;
    }
}

#[test]
fn expected_index_is_monotone_over_the_column() {
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(0xAB, 10_000);
    let r = build(&dir, "mono", &hashes, 8);
    let col = r.column_index(HashKind::Md5).unwrap();
    let n = r.hash_count(col) as usize;

    let mut sorted = hashes.clone();
    sorted.sort_unstable();
    let mut prev = 0usize;
    for h in &sorted {
        let e = expected_index(h, n);
        assert!(e >= prev, "expected index must not decrease along sorted order");
        assert!(e < n);
        prev = e;
    }
}

#[test]
fn block_window_brackets_every_true_position() {
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(0xB10C, N);
    let path = {
        let r = build(&dir, "block", &hashes, 8);
        drop(r);
        dir.path().join("block.hset")
    };

    // Inspect the raw column through the format layer.
    let bytes = std::fs::read(&path).unwrap();
    let holder = parse(&bytes).unwrap();
    let col = &holder.columns[0];
    assert!(matches!(col.hint, Some(HintData::Block { bits: 8, .. })));

    let arr = HashArray::new(&bytes[col.hdat.clone()], 16);
    let strategy = &col.strategy;
    let n = arr.len();
    for i in 0..n {
        let q = arr.get(i);
        let (lo, hi) = strategy.window(q, n);
        let true_pos = arr.lower_bound(q, 0, n);
        assert!(
            lo <= true_pos && true_pos < hi,
            "window [{lo},{hi}) misses true position {true_pos}"
        );
    }
}

#[test]
fn zero_bucket_bits_writes_a_range_hint_with_identical_answers() {
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(0x0B17, 20_000);

    let block = build(&dir, "b8", &hashes, 8);
    let range = build(&dir, "b0", &hashes, 0);

    let bytes = std::fs::read(dir.path().join("b0.hset")).unwrap();
    let holder = parse(&bytes).unwrap();
    assert!(matches!(
        holder.columns[0].hint,
        Some(HintData::Range { .. })
    ));

    let bc = block.column_index(HashKind::Md5).unwrap();
    let rc = range.column_index(HashKind::Md5).unwrap();
    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..500 {
        let probe: [u8; 16] = rng.gen();
        assert_eq!(block.contains(bc, &probe), range.contains(rc, &probe));
    }
    for h in hashes.iter().step_by(211) {
        assert!(block.contains(bc, h));
        assert!(range.contains(rc, h));
    }
}

#[test]
fn sparse_column_still_answers_correctly() {
    // A tiny set leaves almost every block bucket unvisited; misses in
    // those buckets must stay misses and members must still be found.
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(3, 17);
    let r = build(&dir, "sparse", &hashes, 8);
    let col = r.column_index(HashKind::Md5).unwrap();

    for h in &hashes {
        assert!(r.contains(col, h));
    }
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..1000 {
        let probe: [u8; 16] = rng.gen();
        if !hashes.contains(&probe) {
            assert!(!r.contains(col, &probe));
        }
    }
}

#[test]
fn basic_strategy_agrees_with_hinted_strategies() {
    let dir = TempDir::new().unwrap();
    let hashes = random_hashes(0xCAFE, 5_000);
    let r = build(&dir, "hinted", &hashes, 8);
    let col = r.column_index(HashKind::Md5).unwrap();

    let bytes = std::fs::read(dir.path().join("hinted.hset")).unwrap();
    let holder = parse(&bytes).unwrap();
    let arr = HashArray::new(&bytes[holder.columns[0].hdat.clone()], 16);
    let basic = LookupStrategy::Basic;

    let mut rng = StdRng::seed_from_u64(0xF00);
    for _ in 0..2_000 {
        let probe: [u8; 16] = rng.gen();
        assert_eq!(basic.contains(arr, &probe), r.contains(col, &probe));
    }
}
