//! Set algebra over hash sets: union, intersection, difference.
//!
//! The operation is defined on the record streams. Records compare as
//! full row bytes — presence bytes included — so two rows differing only
//! in an absent field are distinct. Both inputs are re-sorted through the
//! external sorter (stored rows are already sorted for files this crate
//! wrote, but the builder does not rely on it), then merged with the
//! classic two-pointer rules and pushed into a fresh encoder, which
//! re-derives every column and hint for the result.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::debug;

use crate::encoder::extsort::{ExtSorter, SortedItems};
use crate::encoder::HashsetBuilder;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// The three composition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
    Difference,
}

/// Opens a builder holding `l op r`; the caller finalises it.
///
/// Both inputs must carry records with matching schemas (kinds and
/// widths; names may differ, and the left side's names win). The result
/// obeys the usual bounds: `|L ∪ R| ≤ |L| + |R|`, `|L ∩ R| ≤ min`,
/// `|L \ R| ≤ |L|`.
#[allow(clippy::too_many_arguments)]
pub fn compose(
    l: &Reader,
    r: &Reader,
    op: SetOp,
    name: &str,
    desc: &str,
    out_path: &Path,
    tmp_dir: &Path,
    with_records: bool,
    with_hashsets: bool,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<HashsetBuilder> {
    let l_rhdr = l
        .record_header()
        .ok_or_else(|| Error::SchemaMismatch("left set has no records".into()))?;
    let r_rhdr = r
        .record_header()
        .ok_or_else(|| Error::SchemaMismatch("right set has no records".into()))?;
    if !l_rhdr.schema_matches(r_rhdr) {
        return Err(Error::SchemaMismatch(format!(
            "field layouts differ: {} vs {} fields",
            l_rhdr.fields.len(),
            r_rhdr.fields.len()
        )));
    }

    let mut builder = HashsetBuilder::open_with_fields(
        name,
        desc,
        l_rhdr.fields.clone(),
        out_path,
        tmp_dir,
        with_records,
        with_hashsets,
    )?;
    if let Some(flag) = cancel {
        builder.set_cancel_flag(flag);
    }

    let stride = l_rhdr.record_length as usize;
    let mut ls = resort(l, stride, tmp_dir, &builder)?;
    let mut rs = resort(r, stride, tmp_dir, &builder)?;

    // Two-pointer merge over deduplicated sorted streams.
    let mut lc: Option<Vec<u8>> = None;
    let mut rc: Option<Vec<u8>> = None;
    advance(&mut ls, &mut lc)?;
    advance(&mut rs, &mut rc)?;

    loop {
        builder.check_cancel()?;
        match (&lc, &rc) {
            (Some(a), Some(b)) => match a.cmp(b) {
                std::cmp::Ordering::Less => {
                    if matches!(op, SetOp::Union | SetOp::Difference) {
                        builder.add_encoded_row(a)?;
                    }
                    advance(&mut ls, &mut lc)?;
                }
                std::cmp::Ordering::Greater => {
                    if op == SetOp::Union {
                        builder.add_encoded_row(b)?;
                    }
                    advance(&mut rs, &mut rc)?;
                }
                std::cmp::Ordering::Equal => {
                    if matches!(op, SetOp::Union | SetOp::Intersect) {
                        builder.add_encoded_row(a)?;
                    }
                    advance(&mut ls, &mut lc)?;
                    advance(&mut rs, &mut rc)?;
                }
            },
            (Some(a), None) => {
                if matches!(op, SetOp::Union | SetOp::Difference) {
                    builder.add_encoded_row(a)?;
                }
                advance(&mut ls, &mut lc)?;
            }
            (None, Some(b)) => {
                if op == SetOp::Union {
                    builder.add_encoded_row(b)?;
                }
                advance(&mut rs, &mut rc)?;
            }
            (None, None) => break,
        }
    }

    debug!(?op, rows = builder.pushed_records(), "set operation merged");
    Ok(builder)
}

/// Streams a reader's rows through the external sorter.
fn resort(
    reader: &Reader,
    stride: usize,
    tmp_dir: &Path,
    builder: &HashsetBuilder,
) -> Result<SortedItems> {
    let mut sorter = ExtSorter::new(tmp_dir, stride)?;
    for i in 0..reader.record_count() {
        builder.check_cancel()?;
        let row = reader.record_bytes(i).expect("index within record count");
        sorter.push(row)?;
    }
    sorter.finish()
}

/// Replaces `cur` with the stream's next row distinct from it, or `None`
/// at end of stream. Collapses duplicate rows within one input.
fn advance(items: &mut SortedItems, cur: &mut Option<Vec<u8>>) -> Result<()> {
    loop {
        match items.next_item()? {
            Some(item) => {
                if cur.as_deref() != Some(item) {
                    *cur = Some(item.to_vec());
                    return Ok(());
                }
            }
            None => {
                *cur = None;
                return Ok(());
            }
        }
    }
}

/// `l ∪ r` into a new builder.
#[allow(clippy::too_many_arguments)]
pub fn union_open(
    l: &Reader,
    r: &Reader,
    name: &str,
    desc: &str,
    out_path: &Path,
    tmp_dir: &Path,
    with_records: bool,
    with_hashsets: bool,
) -> Result<HashsetBuilder> {
    compose(
        l, r, SetOp::Union, name, desc, out_path, tmp_dir, with_records, with_hashsets, None,
    )
}

/// `l ∩ r` into a new builder.
#[allow(clippy::too_many_arguments)]
pub fn intersect_open(
    l: &Reader,
    r: &Reader,
    name: &str,
    desc: &str,
    out_path: &Path,
    tmp_dir: &Path,
    with_records: bool,
    with_hashsets: bool,
) -> Result<HashsetBuilder> {
    compose(
        l, r, SetOp::Intersect, name, desc, out_path, tmp_dir, with_records, with_hashsets, None,
    )
}

/// `l \ r` into a new builder.
#[allow(clippy::too_many_arguments)]
pub fn difference_open(
    l: &Reader,
    r: &Reader,
    name: &str,
    desc: &str,
    out_path: &Path,
    tmp_dir: &Path,
    with_records: bool,
    with_hashsets: bool,
) -> Result<HashsetBuilder> {
    compose(
        l, r, SetOp::Difference, name, desc, out_path, tmp_dir, with_records, with_hashsets, None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashKind;
    use tempfile::TempDir;

    fn encode(dir: &TempDir, name: &str, values: &[u8]) -> Reader {
        let path = dir.path().join(format!("{name}.hset"));
        let mut b = HashsetBuilder::open(
            name,
            "",
            &[HashKind::Md5, HashKind::Sha1],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        for v in values {
            let md5 = [*v; 16];
            let sha1 = [v.wrapping_add(100); 20];
            b.add_record(&[Some(&md5), Some(&sha1)]).unwrap();
        }
        b.finalize().unwrap();
        Reader::open_path(&path).unwrap()
    }

    fn run(dir: &TempDir, l: &Reader, r: &Reader, op: SetOp, name: &str) -> Reader {
        let path = dir.path().join(format!("{name}.hset"));
        let b = compose(l, r, op, name, "", &path, dir.path(), true, true, None).unwrap();
        b.finalize().unwrap();
        Reader::open_path(&path).unwrap()
    }

    #[test]
    fn union_intersect_difference_counts() {
        let dir = TempDir::new().unwrap();
        let a = encode(&dir, "a", &[1, 2, 3, 4]);
        let b = encode(&dir, "b", &[3, 4, 5]);

        let u = run(&dir, &a, &b, SetOp::Union, "u");
        assert_eq!(u.record_count(), 5);
        let i = run(&dir, &a, &b, SetOp::Intersect, "i");
        assert_eq!(i.record_count(), 2);
        let d = run(&dir, &a, &b, SetOp::Difference, "d");
        assert_eq!(d.record_count(), 2);
        let d2 = run(&dir, &b, &a, SetOp::Difference, "d2");
        assert_eq!(d2.record_count(), 1);

        let md5 = u.column_index(HashKind::Md5).unwrap();
        for v in 1..=5u8 {
            assert!(u.contains(md5, &[v; 16]));
        }
        let md5 = i.column_index(HashKind::Md5).unwrap();
        assert!(i.contains(md5, &[3; 16]) && i.contains(md5, &[4; 16]));
        assert!(!i.contains(md5, &[1; 16]));
    }

    #[test]
    fn self_identities() {
        let dir = TempDir::new().unwrap();
        let a = encode(&dir, "a", &[9, 7, 5]);

        let u = run(&dir, &a, &a, SetOp::Union, "uaa");
        assert_eq!(u.record_count(), 3);
        let i = run(&dir, &a, &a, SetOp::Intersect, "iaa");
        assert_eq!(i.record_count(), 3);
        let d = run(&dir, &a, &a, SetOp::Difference, "daa");
        assert_eq!(d.record_count(), 0);
    }

    #[test]
    fn schema_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let a = encode(&dir, "a", &[1]);

        let path = dir.path().join("c.hset");
        let mut c = HashsetBuilder::open(
            "c",
            "",
            &[HashKind::Md5],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        let h = [1u8; 16];
        c.add_record(&[Some(&h)]).unwrap();
        c.finalize().unwrap();
        let c = Reader::open_path(&path).unwrap();

        let out = dir.path().join("out.hset");
        assert!(matches!(
            compose(&a, &c, SetOp::Union, "x", "", &out, dir.path(), true, true, None),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn recordless_input_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nr.hset");
        let mut b = HashsetBuilder::open(
            "nr",
            "",
            &[HashKind::Md5],
            &path,
            dir.path(),
            false,
            true,
        )
        .unwrap();
        let h = [1u8; 16];
        b.add_record(&[Some(&h)]).unwrap();
        b.finalize().unwrap();
        let nr = Reader::open_path(&path).unwrap();
        let a = encode(&dir, "a", &[1]);

        let out = dir.path().join("out.hset");
        assert!(matches!(
            compose(&nr, &a, SetOp::Union, "x", "", &out, dir.path(), true, true, None),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn left_names_win() {
        let dir = TempDir::new().unwrap();
        let a = encode(&dir, "a", &[1, 2]);
        let b = encode(&dir, "b", &[2, 3]);
        let u = run(&dir, &a, &b, SetOp::Union, "named");
        let rhdr = u.record_header().unwrap();
        assert_eq!(rhdr.fields[0].name, "md5");
        assert_eq!(rhdr.fields[1].name, "sha1");
    }
}
