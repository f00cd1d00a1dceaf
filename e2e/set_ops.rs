// e2e/set_ops.rs — set-algebra laws over encoded files
//
// A is a 26-row set indexed by letter (MD5 + SHA-1 per row); B holds rows
// 11..=25. The merge rules are checked both by row counts and by the
// algebraic identities: idempotence, commutativity, absorption, and
// disjointness of a difference with its subtrahend.

use std::fs;
use std::path::PathBuf;

use hset::{compose, HashKind, HashsetBuilder, Reader, SetOp};
use tempfile::TempDir;

const TS: &str = "2026-08-01T00:00:00Z";

fn row(letter: u8) -> ([u8; 16], [u8; 20]) {
    ([letter; 16], [letter.wrapping_add(0x40); 20])
}

/// Encodes rows for the given letter indices under a fixed timestamp.
fn encode(dir: &TempDir, name: &str, letters: impl Iterator<Item = u8>) -> PathBuf {
    let path = dir.path().join(format!("{name}.hset"));
    let mut b = HashsetBuilder::open(
        name,
        "set algebra",
        &[HashKind::Md5, HashKind::Sha1],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();
    b.set_timestamp(TS);
    for l in letters {
        let (m, s) = row(l);
        b.add_record(&[Some(&m), Some(&s)]).unwrap();
    }
    b.finalize().unwrap();
    path
}

fn run(dir: &TempDir, l: &Reader, r: &Reader, op: SetOp, name: &str) -> PathBuf {
    let path = dir.path().join(format!("{name}.hset"));
    let mut b = compose(
        l,
        r,
        op,
        l.name(),
        l.description(),
        &path,
        dir.path(),
        true,
        true,
        None,
    )
    .unwrap();
    b.set_timestamp(TS);
    b.finalize().unwrap();
    path
}

fn letters_in(r: &Reader) -> Vec<u8> {
    let col = r.column_index(HashKind::Md5).unwrap();
    (0..26u8).filter(|l| r.contains(col, &[*l; 16])).collect()
}

#[test]
fn union_of_subset_is_bitwise_identical_to_the_whole() {
    let dir = TempDir::new().unwrap();
    let a_path = encode(&dir, "a", 0..26);
    let b_path = encode(&dir, "b", 11..26);
    let a = Reader::open_path(&a_path).unwrap();
    let b = Reader::open_path(&b_path).unwrap();

    let u_path = run(&dir, &a, &b, SetOp::Union, "aub");
    let u = Reader::open_path(&u_path).unwrap();
    assert_eq!(u.record_count(), 26);
    assert_eq!(letters_in(&u), (0..26).collect::<Vec<_>>());

    // B ⊆ A and every knob matches, so the union is byte-for-byte A.
    assert_eq!(fs::read(&a_path).unwrap(), fs::read(&u_path).unwrap());
}

#[test]
fn intersection_keeps_the_overlap_with_sorted_columns() {
    let dir = TempDir::new().unwrap();
    let a = Reader::open_path(&encode(&dir, "a", 0..18)).unwrap();
    let b = Reader::open_path(&encode(&dir, "b", 11..26)).unwrap();

    let i = Reader::open_path(&run(&dir, &a, &b, SetOp::Intersect, "anb")).unwrap();
    assert_eq!(i.record_count(), 7);
    assert_eq!(letters_in(&i), (11..18).collect::<Vec<_>>());

    // intersection re-derives sorted, queryable columns
    let sha1 = i.column_index(HashKind::Sha1).unwrap();
    for l in 11..18u8 {
        let (_, s) = row(l);
        assert!(i.contains(sha1, &s));
    }
}

#[test]
fn differences_split_the_universe() {
    let dir = TempDir::new().unwrap();
    let a = Reader::open_path(&encode(&dir, "a", 0..18)).unwrap();
    let b = Reader::open_path(&encode(&dir, "b", 11..26)).unwrap();

    let d = Reader::open_path(&run(&dir, &a, &b, SetOp::Difference, "amb")).unwrap();
    assert_eq!(letters_in(&d), (0..11).collect::<Vec<_>>());

    let d2 = Reader::open_path(&run(&dir, &b, &a, SetOp::Difference, "bma")).unwrap();
    assert_eq!(letters_in(&d2), (18..26).collect::<Vec<_>>());
}

#[test]
fn algebraic_identities() {
    let dir = TempDir::new().unwrap();
    let a = Reader::open_path(&encode(&dir, "a", 0..18)).unwrap();
    let b = Reader::open_path(&encode(&dir, "b", 11..26)).unwrap();

    // L op L
    let aua = Reader::open_path(&run(&dir, &a, &a, SetOp::Union, "aua")).unwrap();
    assert_eq!(aua.record_count(), a.record_count());
    let ana = Reader::open_path(&run(&dir, &a, &a, SetOp::Intersect, "ana")).unwrap();
    assert_eq!(ana.record_count(), a.record_count());
    let ama = Reader::open_path(&run(&dir, &a, &a, SetOp::Difference, "ama")).unwrap();
    assert_eq!(ama.record_count(), 0);

    // commutativity: L ∪ R == R ∪ L, L ∩ R == R ∩ L (same rows)
    let ab = Reader::open_path(&run(&dir, &a, &b, SetOp::Union, "ab")).unwrap();
    let ba = Reader::open_path(&run(&dir, &b, &a, SetOp::Union, "ba")).unwrap();
    assert_eq!(letters_in(&ab), letters_in(&ba));
    let anb = Reader::open_path(&run(&dir, &a, &b, SetOp::Intersect, "anb2")).unwrap();
    let bna = Reader::open_path(&run(&dir, &b, &a, SetOp::Intersect, "bna")).unwrap();
    assert_eq!(letters_in(&anb), letters_in(&bna));

    // absorption: (L ∪ R) ∩ L == L
    let absorbed =
        Reader::open_path(&run(&dir, &ab, &a, SetOp::Intersect, "absorb")).unwrap();
    assert_eq!(letters_in(&absorbed), letters_in(&a));

    // (L \ R) ∩ R == ∅
    let amb = Reader::open_path(&run(&dir, &a, &b, SetOp::Difference, "amb2")).unwrap();
    let empty = Reader::open_path(&run(&dir, &amb, &b, SetOp::Intersect, "mt")).unwrap();
    assert_eq!(empty.record_count(), 0);
}

#[test]
fn result_size_bounds() {
    let dir = TempDir::new().unwrap();
    let a = Reader::open_path(&encode(&dir, "a", 0..18)).unwrap();
    let b = Reader::open_path(&encode(&dir, "b", 11..26)).unwrap();

    let u = Reader::open_path(&run(&dir, &a, &b, SetOp::Union, "u")).unwrap();
    assert!(u.record_count() <= a.record_count() + b.record_count());
    let i = Reader::open_path(&run(&dir, &a, &b, SetOp::Intersect, "i")).unwrap();
    assert!(i.record_count() <= a.record_count().min(b.record_count()));
    let d = Reader::open_path(&run(&dir, &a, &b, SetOp::Difference, "d")).unwrap();
    assert!(d.record_count() <= a.record_count());
}

#[test]
fn presence_bytes_distinguish_rows() {
    // Two sets whose only row differs in a single absent field must not
    // intersect: rows compare by full bytes, presence included.
    let dir = TempDir::new().unwrap();

    let build_one = |name: &str, with_sha1: bool| {
        let path = dir.path().join(format!("{name}.hset"));
        let mut bld = HashsetBuilder::open(
            name,
            "",
            &[HashKind::Md5, HashKind::Sha1],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        bld.set_timestamp(TS);
        let (m, s) = row(7);
        let sha1 = with_sha1.then_some(&s[..]);
        bld.add_record(&[Some(&m), sha1]).unwrap();
        bld.finalize().unwrap();
        Reader::open_path(&path).unwrap()
    };

    let full = build_one("full", true);
    let partial = build_one("partial", false);

    let i = Reader::open_path(&run(&dir, &full, &partial, SetOp::Intersect, "pint")).unwrap();
    assert_eq!(i.record_count(), 0);
    let u = Reader::open_path(&run(&dir, &full, &partial, SetOp::Union, "puni")).unwrap();
    assert_eq!(u.record_count(), 2);
}
