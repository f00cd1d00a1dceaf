// e2e/error_handling.rs — failure paths across the public API
//
// Corrupt files must fail with the right error kind and never panic;
// builder misuse must be rejected up front; cancellation and lenient
// text parsing must behave as documented.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hset::{add_text_records, Error, HashKind, HashsetBuilder, Reader};
use tempfile::TempDir;

fn sample_file(dir: &TempDir) -> Vec<u8> {
    let path = dir.path().join("sample.hset");
    let mut b = HashsetBuilder::open(
        "sample",
        "",
        &[HashKind::Md5],
        &path,
        dir.path(),
        true,
        true,
    )
    .unwrap();
    for v in 0..16u8 {
        let h = [v; 16];
        b.add_record(&[Some(&h)]).unwrap();
    }
    b.finalize().unwrap();
    fs::read(path).unwrap()
}

// ── corrupt inputs ────────────────────────────────────────────────────────────

#[test]
fn bad_magic() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sample_file(&dir);
    bytes[3] ^= 0xFF;
    assert!(matches!(
        Reader::from_vec(bytes).unwrap_err(),
        Error::BadMagic
    ));
}

#[test]
fn empty_and_tiny_buffers() {
    assert!(Reader::from_vec(Vec::new()).is_err());
    assert!(Reader::from_vec(b"SetOHash".to_vec()).is_err());
    assert!(Reader::from_vec(b"SetOHash\x00\x00\x00".to_vec()).is_err());
}

#[test]
fn truncation_at_every_quarter() {
    let dir = TempDir::new().unwrap();
    let bytes = sample_file(&dir);
    for frac in [1, 2, 3] {
        let cut = bytes.len() * frac / 4;
        assert!(
            Reader::from_vec(bytes[..cut].to_vec()).is_err(),
            "truncation to {cut} bytes must fail"
        );
    }
}

#[test]
fn trailer_offset_out_of_range() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sample_file(&dir);
    let at = bytes.len() - 12;
    bytes[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    assert!(Reader::from_vec(bytes).is_err());
}

#[test]
fn corrupted_hint_type() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sample_file(&dir);
    // find the HINT chunk tag and break its type word
    let at = bytes
        .windows(4)
        .position(|w| w == b"HINT")
        .expect("sample has a hint");
    bytes[at + 12] = 0x7A; // payload starts after tag + length
    assert!(matches!(
        Reader::from_vec(bytes).unwrap_err(),
        Error::UnknownChunk(_)
    ));
}

#[test]
fn flipped_chunk_tag_is_unexpected() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sample_file(&dir);
    let at = bytes
        .windows(4)
        .position(|w| w == b"RHDR")
        .expect("sample has records");
    bytes[at..at + 4].copy_from_slice(b"RHDX");
    // the FTOC entry no longer matches the chunk on disk
    assert!(Reader::from_vec(bytes).is_err());
}

// ── builder misuse ────────────────────────────────────────────────────────────

#[test]
fn builder_rejects_wrong_width_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("w.hset");
    let mut b =
        HashsetBuilder::open("w", "", &[HashKind::Sha1], &path, dir.path(), true, true).unwrap();
    let not_a_sha1 = [0u8; 16];
    assert!(matches!(
        b.add_record(&[Some(&not_a_sha1)]).unwrap_err(),
        Error::BadRecord { .. }
    ));
}

#[test]
fn failed_finalize_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gone.hset");
    let mut b =
        HashsetBuilder::open("gone", "", &[HashKind::Md5], &path, dir.path(), true, true).unwrap();
    let flag = Arc::new(AtomicBool::new(false));
    b.set_cancel_flag(flag.clone());
    let h = [1u8; 16];
    b.add_record(&[Some(&h)]).unwrap();

    flag.store(true, Ordering::Relaxed);
    assert!(matches!(b.finalize().unwrap_err(), Error::Cancelled));
    assert!(!path.exists());
}

// ── text parsing ──────────────────────────────────────────────────────────────

#[test]
fn strict_text_reports_first_bad_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.hset");
    let mut b =
        HashsetBuilder::open("t", "", &[HashKind::Size, HashKind::Md5], &path, dir.path(), true, true)
            .unwrap();
    let input = "100 00112233445566778899aabbccddeeff\nnot_a_size 00112233445566778899aabbccddeeff\n";
    match add_text_records(&mut b, input.as_bytes(), false).unwrap_err() {
        Error::BadRecord { line, msg } => {
            assert_eq!(line, 2);
            assert!(msg.contains("size"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn lenient_text_builds_with_batch_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("l.hset");
    let mut b =
        HashsetBuilder::open("l", "", &[HashKind::Md5], &path, dir.path(), true, true).unwrap();
    let input = "\
00112233445566778899aabbccddeeff
zz112233445566778899aabbccddeeff
ffeeddccbbaa99887766554433221100
too short
";
    let skipped = add_text_records(&mut b, input.as_bytes(), true).unwrap();
    assert_eq!(skipped.len(), 2);
    b.finalize().unwrap();

    let r = Reader::open_path(&path).unwrap();
    assert_eq!(r.record_count(), 2);
}

// ── queries never fail ────────────────────────────────────────────────────────

#[test]
fn contains_is_total_on_odd_queries() {
    let dir = TempDir::new().unwrap();
    let r = Reader::from_vec(sample_file(&dir)).unwrap();
    let col = r.column_index(HashKind::Md5).unwrap();

    assert!(!r.contains(col, &[]));
    assert!(!r.contains(col, &[0u8; 4]));
    assert!(!r.contains(col, &[0u8; 64]));
    assert_eq!(r.records_for(col, &[0u8; 3]), 0..0);
}
