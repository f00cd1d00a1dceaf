//! Read-side API over a parsed hset image.
//!
//! A [`Reader`] owns the file bytes — either slurped into memory or
//! memory-mapped — plus the parsed [`Holder`], whose byte ranges index
//! into that buffer. Column data is therefore zero-copy: `contains`
//! binary-searches the mapped pages directly. Readers are immutable and
//! safe to share by reference across threads.
//!
//! [`Holder`]: crate::format::parse::Holder

use std::fmt;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::format::parse::{parse, ColumnData, Holder};
use crate::format::RecordHeader;
use crate::hash::HashKind;
use crate::lookup::{equal_range, HashArray};

/// File bytes behind a reader: an owned buffer or a read-only mapping.
enum Buffer {
    Owned(Box<[u8]>),
    Mapped(memmap2::Mmap),
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        match self {
            Buffer::Owned(b) => b,
            Buffer::Mapped(m) => m,
        }
    }
}

/// An open, immutable hset file.
pub struct Reader {
    buf: Buffer,
    holder: Holder,
    sha2_256: [u8; 32],
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("name", &self.name())
            .field("columns", &self.column_count())
            .field("records", &self.record_count())
            .finish()
    }
}

impl Reader {
    /// Opens a reader over bytes already in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Result<Reader> {
        Reader::new(Buffer::Owned(bytes.into_boxed_slice()))
    }

    /// Memory-maps `path` read-only and opens a reader over the mapping.
    pub fn open_path(path: &Path) -> Result<Reader> {
        let file = File::open(path)?;
        // Read-only mapping of an immutable file.
        let map = unsafe { memmap2::Mmap::map(&file)? };
        debug!(path = %path.display(), len = map.len(), "mapped hset");
        Reader::new(Buffer::Mapped(map))
    }

    fn new(buf: Buffer) -> Result<Reader> {
        let holder = parse(buf.as_ref())?;
        let sha2_256 = Sha256::digest(buf.as_ref()).into();
        Ok(Reader {
            buf,
            holder,
            sha2_256,
        })
    }

    // ── metadata ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.holder.fhdr.name
    }

    pub fn description(&self) -> &str {
        &self.holder.fhdr.desc
    }

    pub fn timestamp(&self) -> &str {
        &self.holder.fhdr.timestamp
    }

    /// SHA2-256 of the whole file image, computed at open. An integrity
    /// check against accidental corruption, not authentication.
    pub fn sha2_256(&self) -> &[u8; 32] {
        &self.sha2_256
    }

    // ── columns ──────────────────────────────────────────────────────────────

    pub fn column_count(&self) -> usize {
        self.holder.columns.len()
    }

    /// The first column of the given kind, if any.
    pub fn column_index(&self, kind: HashKind) -> Option<usize> {
        self.holder
            .columns
            .iter()
            .position(|c| c.header.kind == kind)
    }

    pub fn column_kind(&self, column: usize) -> HashKind {
        self.holder.columns[column].header.kind
    }

    pub fn hash_count(&self, column: usize) -> u64 {
        self.holder.columns[column].header.hash_count
    }

    fn column(&self, column: usize) -> &ColumnData {
        &self.holder.columns[column]
    }

    fn hashes(&self, column: usize) -> HashArray<'_> {
        let col = self.column(column);
        HashArray::new(
            &self.buf.as_ref()[col.hdat.clone()],
            col.header.hash_length as usize,
        )
    }

    /// Membership of `hash` in the column. Total: a query of the wrong
    /// width is simply not present.
    pub fn contains(&self, column: usize, hash: &[u8]) -> bool {
        let col = self.column(column);
        if hash.len() as u64 != col.header.hash_length {
            return false;
        }
        col.strategy.contains(self.hashes(column), hash)
    }

    /// Positions within the sorted column whose hash equals `hash`.
    /// Duplicate hashes map adjacent positions to distinct records; the
    /// range is empty on a miss.
    pub fn records_for(&self, column: usize, hash: &[u8]) -> Range<usize> {
        let col = self.column(column);
        if hash.len() as u64 != col.header.hash_length {
            return 0..0;
        }
        equal_range(self.hashes(column), hash)
    }

    /// Resolves a column position (from [`Reader::records_for`]) to its
    /// record index via the column's `RIDX`. `None` when the file carries
    /// no records or the position is out of range.
    pub fn record_index_at(&self, column: usize, position: usize) -> Option<u64> {
        let col = self.column(column);
        let ridx = &self.buf.as_ref()[col.ridx.clone()?];
        let at = position.checked_mul(8)?;
        let bytes = ridx.get(at..at + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    // ── records ──────────────────────────────────────────────────────────────

    pub fn record_header(&self) -> Option<&RecordHeader> {
        self.holder.rhdr.as_ref()
    }

    pub fn record_count(&self) -> u64 {
        self.holder
            .rhdr
            .as_ref()
            .map(|r| r.record_count)
            .unwrap_or(0)
    }

    /// The raw stored bytes of record `index`, presence bytes included.
    pub fn record_bytes(&self, index: u64) -> Option<&[u8]> {
        let rhdr = self.holder.rhdr.as_ref()?;
        if index >= rhdr.record_count {
            return None;
        }
        let rdat = &self.buf.as_ref()[self.holder.rdat.clone()?];
        let len = rhdr.record_length as usize;
        let at = index as usize * len;
        Some(&rdat[at..at + len])
    }

    /// Record `index` with field access through the schema.
    pub fn record(&self, index: u64) -> Option<Record<'_>> {
        let rhdr = self.holder.rhdr.as_ref()?;
        Some(Record {
            rhdr,
            row: self.record_bytes(index)?,
        })
    }

    /// All records in stored (sorted) order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.record_count()).filter_map(|i| self.record(i))
    }

    /// Index of the record field with the given kind.
    pub fn field_index(&self, kind: HashKind) -> Option<usize> {
        self.holder
            .rhdr
            .as_ref()?
            .fields
            .iter()
            .position(|f| f.kind == kind)
    }
}

/// One stored record; field lookups borrow from the reader's buffer.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    rhdr: &'a RecordHeader,
    row: &'a [u8],
}

impl<'a> Record<'a> {
    /// Field `i`'s value bytes, or `None` when the presence byte is zero.
    pub fn field(&self, i: usize) -> Option<&'a [u8]> {
        let f = self.rhdr.fields.get(i)?;
        let at = self.rhdr.field_offset(i) as usize;
        if self.row[at] == 0 {
            return None;
        }
        Some(&self.row[at + 1..at + 1 + f.width as usize])
    }

    pub fn field_count(&self) -> usize {
        self.rhdr.fields.len()
    }

    /// The raw row bytes, presence bytes included.
    pub fn bytes(&self) -> &'a [u8] {
        self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::HashsetBuilder;
    use tempfile::TempDir;

    fn build_sample(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("sample.hset");
        let mut b = HashsetBuilder::open(
            "sample",
            "reader test set",
            &[HashKind::Md5, HashKind::Size],
            &path,
            dir.path(),
            true,
            true,
        )
        .unwrap();
        for v in [7u8, 1, 4] {
            let h = [v; 16];
            let s = (v as u64 * 100).to_le_bytes();
            b.add_record(&[Some(&h), Some(&s)]).unwrap();
        }
        // one record missing its size
        let h = [9u8; 16];
        b.add_record(&[Some(&h), None]).unwrap();
        b.finalize().unwrap();
        path
    }

    #[test]
    fn metadata_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = build_sample(&dir);
        let r = Reader::open_path(&path).unwrap();
        assert_eq!(r.name(), "sample");
        assert_eq!(r.description(), "reader test set");
        assert_eq!(r.column_count(), 2);
        assert_eq!(r.record_count(), 4);
        assert_eq!(r.sha2_256().len(), 32);
    }

    #[test]
    fn mapped_and_owned_agree() {
        let dir = TempDir::new().unwrap();
        let path = build_sample(&dir);
        let mapped = Reader::open_path(&path).unwrap();
        let owned = Reader::from_vec(std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(mapped.sha2_256(), owned.sha2_256());
        let col = mapped.column_index(HashKind::Md5).unwrap();
        assert_eq!(
            mapped.contains(col, &[7u8; 16]),
            owned.contains(col, &[7u8; 16])
        );
    }

    #[test]
    fn contains_and_lookup() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        let md5 = r.column_index(HashKind::Md5).unwrap();

        for v in [1u8, 4, 7, 9] {
            assert!(r.contains(md5, &[v; 16]));
        }
        assert!(!r.contains(md5, &[2u8; 16]));
        // wrong-width queries are misses, not errors
        assert!(!r.contains(md5, &[1u8; 20]));
    }

    #[test]
    fn size_column_lookup() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        let sizes = r.column_index(HashKind::Size).unwrap();
        assert_eq!(r.hash_count(sizes), 3); // the absent size contributes nothing
        assert!(r.contains(sizes, &400u64.to_le_bytes()));
        assert!(!r.contains(sizes, &401u64.to_le_bytes()));
    }

    #[test]
    fn records_resolve_through_ridx() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        let md5 = r.column_index(HashKind::Md5).unwrap();

        let range = r.records_for(md5, &[4u8; 16]);
        assert_eq!(range.len(), 1);
        let ridx = r.record_index_at(md5, range.start).unwrap();
        let rec = r.record(ridx).unwrap();
        assert_eq!(rec.field(0).unwrap(), &[4u8; 16]);
        assert_eq!(rec.field(1).unwrap(), &400u64.to_le_bytes());
    }

    #[test]
    fn absent_field_reads_none() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        let md5 = r.column_index(HashKind::Md5).unwrap();
        let range = r.records_for(md5, &[9u8; 16]);
        let ridx = r.record_index_at(md5, range.start).unwrap();
        let rec = r.record(ridx).unwrap();
        assert_eq!(rec.field(0).unwrap(), &[9u8; 16]);
        assert_eq!(rec.field(1), None);
    }

    #[test]
    fn records_are_sorted_by_row_bytes() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        let rows: Vec<&[u8]> = r.records().map(|rec| rec.bytes()).collect();
        for pair in rows.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn out_of_range_record_is_none() {
        let dir = TempDir::new().unwrap();
        let r = Reader::open_path(&build_sample(&dir)).unwrap();
        assert!(r.record(99).is_none());
        let md5 = r.column_index(HashKind::Md5).unwrap();
        assert!(r.record_index_at(md5, 999).is_none());
    }
}
