// e2e/round_trip.rs — encode-then-decode round trips
//
// Builds hset files through the public builder API, reloads them, and
// checks that schema, records, sorted columns, and the structural file
// invariants (magic, trailer, alignment, chunk lengths) survive intact.

use std::fs;

use hset::format::parse::parse;
use hset::format::{HDAT_ALIGN, MAGIC};
use hset::{HashKind, HashsetBuilder, Reader};
use tempfile::TempDir;

fn md5(b: u8) -> [u8; 16] {
    [b; 16]
}

// ─────────────────────────────────────────────────────────────────────────────
// 1. Tiny set round trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tiny_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tiny.hset");

    let mut b = HashsetBuilder::open(
        "tiny",
        "three hashes",
        &[HashKind::Md5],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();
    let hashes: [[u8; 16]; 3] = [[0x00; 16], [0xDE; 16], [0xFF; 16]];
    for h in &hashes {
        b.add_record(&[Some(h)]).unwrap();
    }
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.name(), "tiny");
    assert_eq!(r.description(), "three hashes");
    assert_eq!(r.record_count(), 3);

    let col = r.column_index(HashKind::Md5).unwrap();
    assert_eq!(r.hash_count(col), 3);
    assert!(r.contains(col, &[0x00; 16]));
    assert!(r.contains(col, &[0xDE; 16]));
    assert!(r.contains(col, &[0xFF; 16]));

    let mut near_miss = [0x00u8; 16];
    near_miss[0] = 0x01;
    assert!(!r.contains(col, &near_miss));
}

// ─────────────────────────────────────────────────────────────────────────────
// 2. Structural invariants of the written bytes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn file_structure_invariants() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("struct.hset");

    let mut b = HashsetBuilder::open(
        "struct",
        "",
        &[HashKind::Md5, HashKind::Sha1],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();
    for v in 0..100u8 {
        let m = md5(v);
        let s = [v.wrapping_mul(3); 20];
        b.add_record(&[Some(&m), Some(&s)]).unwrap();
    }
    b.finalize().unwrap();

    let bytes = fs::read(&path).unwrap();

    // magic and trailer
    assert_eq!(&bytes[..8], MAGIC);
    assert_eq!(&bytes[bytes.len() - 4..], b"FTOC");
    let ftoc_off =
        u64::from_le_bytes(bytes[bytes.len() - 12..bytes.len() - 4].try_into().unwrap()) as usize;
    assert_eq!(&bytes[ftoc_off..ftoc_off + 4], b"FTOC");

    let holder = parse(&bytes).unwrap();
    assert_eq!(holder.columns.len(), 2);

    for col in &holder.columns {
        // HDAT tag offset (12 bytes before the payload) is page aligned
        assert_eq!((col.hdat.start - 12) as u64 % HDAT_ALIGN, 0);
        // payload length agrees with count * width
        assert_eq!(
            col.hdat.len() as u64,
            col.header.hash_count * col.header.hash_length
        );

        // hashes strictly sorted (no duplicate inputs here)
        let width = col.header.hash_length as usize;
        let data = &bytes[col.hdat.clone()];
        for pair in data.chunks(width).collect::<Vec<_>>().windows(2) {
            assert!(pair[0] < pair[1]);
        }

        // every record index is within range
        let ridx = &bytes[col.ridx.clone().unwrap()];
        let record_count = holder.rhdr.as_ref().unwrap().record_count;
        for entry in ridx.chunks(8) {
            assert!(u64::from_le_bytes(entry.try_into().unwrap()) < record_count);
        }
    }

    // records in non-decreasing byte order
    let rhdr = holder.rhdr.as_ref().unwrap();
    let rdat = &bytes[holder.rdat.clone().unwrap()];
    let rows: Vec<&[u8]> = rdat.chunks(rhdr.record_length as usize).collect();
    assert_eq!(rows.len() as u64, rhdr.record_count);
    for pair in rows.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// 3. Schema and record content round trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn schema_and_fields_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fields.hset");

    let kinds = [HashKind::Size, HashKind::Md5, HashKind::Sha2_256];
    let mut b =
        HashsetBuilder::open("fields", "schema test", &kinds, &path, dir.path(), true, true)
            .unwrap();

    let m = md5(1);
    let sha = [2u8; 32];
    let size = 4096u64.to_le_bytes();
    b.add_record(&[Some(&size), Some(&m), Some(&sha)]).unwrap();
    b.add_record(&[None, Some(&md5(9)), None]).unwrap();
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    let rhdr = r.record_header().unwrap();
    assert_eq!(rhdr.fields.len(), 3);
    assert_eq!(rhdr.fields[0].kind, HashKind::Size);
    assert_eq!(rhdr.fields[1].kind, HashKind::Md5);
    assert_eq!(rhdr.fields[2].kind, HashKind::Sha2_256);
    assert_eq!(rhdr.record_length, (1 + 8) + (1 + 16) + (1 + 32));

    // full record
    let md5col = r.column_index(HashKind::Md5).unwrap();
    let pos = r.records_for(md5col, &m);
    let rec = r
        .record(r.record_index_at(md5col, pos.start).unwrap())
        .unwrap();
    assert_eq!(rec.field(0).unwrap(), &size);
    assert_eq!(rec.field(1).unwrap(), &m);
    assert_eq!(rec.field(2).unwrap(), &sha);

    // record with absent fields
    let pos = r.records_for(md5col, &md5(9));
    let rec = r
        .record(r.record_index_at(md5col, pos.start).unwrap())
        .unwrap();
    assert_eq!(rec.field(0), None);
    assert_eq!(rec.field(2), None);

    // the size column only holds the present size
    let sizes = r.column_index(HashKind::Size).unwrap();
    assert_eq!(r.hash_count(sizes), 1);
    assert!(r.contains(sizes, &size));
}

// ─────────────────────────────────────────────────────────────────────────────
// 4. Duplicate handling policy
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_rows_collapse_duplicate_hashes_keep_multiplicity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dups.hset");

    let mut b = HashsetBuilder::open(
        "dups",
        "",
        &[HashKind::Md5, HashKind::Size],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();

    let h = md5(5);
    // the same full row three times: collapses to one record
    for _ in 0..3 {
        b.add_record(&[Some(&h), Some(&100u64.to_le_bytes())]).unwrap();
    }
    // same hash, different size: a distinct record sharing the hash
    b.add_record(&[Some(&h), Some(&200u64.to_le_bytes())]).unwrap();
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.record_count(), 2);

    let col = r.column_index(HashKind::Md5).unwrap();
    assert_eq!(r.hash_count(col), 2); // h appears twice, once per record

    let range = r.records_for(col, &h);
    assert_eq!(range.len(), 2);
    let mut sizes: Vec<u64> = range
        .map(|pos| {
            let rec = r.record(r.record_index_at(col, pos).unwrap()).unwrap();
            u64::from_le_bytes(rec.field(1).unwrap().try_into().unwrap())
        })
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, [100, 200]);
}

// ─────────────────────────────────────────────────────────────────────────────
// 5. Flags: records-only and hashsets-only files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn hashsets_only_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nr.hset");
    let mut b =
        HashsetBuilder::open("nr", "", &[HashKind::Md5], &path, dir.path(), false, true).unwrap();
    for v in 0..5u8 {
        let h = md5(v);
        b.add_record(&[Some(&h)]).unwrap();
    }
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.record_count(), 0);
    assert!(r.record_header().is_none());
    let col = r.column_index(HashKind::Md5).unwrap();
    assert!(r.contains(col, &md5(3)));
    // no RIDX: positions cannot resolve to records
    assert!(r.record_index_at(col, 0).is_none());
}

#[test]
fn records_only_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nh.hset");
    let mut b =
        HashsetBuilder::open("nh", "", &[HashKind::Md5], &path, dir.path(), true, false).unwrap();
    let h = md5(1);
    b.add_record(&[Some(&h)]).unwrap();
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.column_count(), 0);
    assert_eq!(r.record_count(), 1);
    assert_eq!(r.record(0).unwrap().field(0).unwrap(), &h);
}

// ─────────────────────────────────────────────────────────────────────────────
// 6. Empty set
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_set_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.hset");
    let b = HashsetBuilder::open("empty", "", &[HashKind::Md5], &path, dir.path(), true, true)
        .unwrap();
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.record_count(), 0);
    let col = r.column_index(HashKind::Md5).unwrap();
    assert_eq!(r.hash_count(col), 0);
    assert!(!r.contains(col, &md5(0)));
    assert!(!r.contains(col, &[0xFFu8; 16]));
}

// ─────────────────────────────────────────────────────────────────────────────
// 7. Determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_input_same_bytes_regardless_of_order() {
    let dir = TempDir::new().unwrap();

    let encode = |name: &str, order: &[u8]| {
        let path = dir.path().join(format!("{name}.hset"));
        let mut b = HashsetBuilder::open(
            "det",
            "",
            &[HashKind::Md5],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        b.set_timestamp("2026-08-01T00:00:00Z");
        for v in order {
            let h = md5(*v);
            b.add_record(&[Some(&h)]).unwrap();
        }
        b.finalize().unwrap();
        fs::read(path).unwrap()
    };

    // input order must not matter: rows are sorted before anything else
    assert_eq!(encode("fwd", &[1, 2, 3, 4]), encode("rev", &[4, 3, 2, 1]));
}
