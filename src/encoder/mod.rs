//! The hset file encoder.
//!
//! A [`HashsetBuilder`] is opened with the output schema and paths, fed
//! records one at a time, and finalised. Records are spooled to temp
//! files and externally merge-sorted, so the builder never holds the full
//! record set in memory:
//!
//! 1. rows accumulate into a run-sorted spool, sorted by full row bytes;
//! 2. the sorted row stream is deduplicated (bit-identical rows collapse)
//!    and written to a records spool, assigning final record indices;
//! 3. each lookup column extracts `(hash, record index)` pairs into its
//!    own spool — the index is stored big-endian so the byte sort orders
//!    pairs by hash first, then index;
//! 4. columns stream out as `HHnn`/`HINT`/`HDAT`/`RIDX`, each `HDAT` tag
//!    padded to a 4096-byte boundary, followed by `RHDR`/`RDAT` and the
//!    table of contents, with every chunk length back-patched from the
//!    bytes actually written.
//!
//! The builder is single-owner and not thread-safe. Cancellation is
//! cooperative: a shared flag is checked between records, and a set flag
//! aborts the build, unlinking the partial output. Output bytes are
//! deterministic for a given input set and timestamp.

pub mod extsort;
pub mod text;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::format::encode::{
    fhdr_data, ftoc_data, hhnn_data, hint_data, record_row, rhdr_data, write_chunk, write_chunk_bytes,
    write_magic, write_padding, write_trailer,
};
use crate::format::{
    alignment_padding, column_tag, FieldDescriptor, HintData, TableOfContents, FEND, FORMAT_VERSION,
    FTOC, HDAT, HDAT_ALIGN, HINT, RDAT, RHDR, RIDX,
};
use crate::hash::HashKind;
use crate::hint::HintAccumulator;
use self::extsort::ExtSorter;

/// Bucket bits used for column hints unless overridden. Zero selects the
/// single-window range hint.
pub const DEFAULT_BUCKET_BITS: u8 = 8;

/// Builds one hset file from a stream of records.
pub struct HashsetBuilder {
    name: String,
    desc: String,
    timestamp: String,
    fields: Vec<FieldDescriptor>,
    out_path: PathBuf,
    tmp_dir: PathBuf,
    with_records: bool,
    with_hashsets: bool,
    bucket_bits: u8,
    cancel: Option<Arc<AtomicBool>>,
    rows: ExtSorter,
    row_buf: Vec<u8>,
    record_length: usize,
    pushed: u64,
}

/// One column's spooled, sorted data, ready to stream into the file.
struct ColumnPlan {
    field: FieldDescriptor,
    count: u64,
    hint: Option<HintData>,
    /// Sorted `(hash, u64 BE record index)` items.
    file: File,
}

impl HashsetBuilder {
    /// Opens a builder for the given schema.
    ///
    /// `kinds` orders the record fields; at most one may be [`HashKind::Size`]
    /// and [`HashKind::Other`] is not accepted. `with_records` controls the
    /// `RHDR`/`RDAT` (and per-column `RIDX`) chunks; `with_hashsets`
    /// controls the hash columns themselves.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        name: &str,
        desc: &str,
        kinds: &[HashKind],
        out_path: &Path,
        tmp_dir: &Path,
        with_records: bool,
        with_hashsets: bool,
    ) -> Result<HashsetBuilder> {
        let fields: Vec<FieldDescriptor> =
            kinds.iter().map(|k| FieldDescriptor::for_kind(*k)).collect();
        HashsetBuilder::open_with_fields(
            name,
            desc,
            fields,
            out_path,
            tmp_dir,
            with_records,
            with_hashsets,
        )
    }

    /// As [`HashsetBuilder::open`], but with caller-supplied field
    /// descriptors so column names can be carried over from an existing
    /// set instead of the canonical kind names.
    #[allow(clippy::too_many_arguments)]
    pub fn open_with_fields(
        name: &str,
        desc: &str,
        fields: Vec<FieldDescriptor>,
        out_path: &Path,
        tmp_dir: &Path,
        with_records: bool,
        with_hashsets: bool,
    ) -> Result<HashsetBuilder> {
        if fields.is_empty() {
            return Err(Error::SchemaMismatch("no record fields".into()));
        }
        if fields.iter().any(|f| f.kind == HashKind::Other) {
            return Err(Error::SchemaMismatch("cannot build 'other' columns".into()));
        }
        if fields.iter().filter(|f| f.kind == HashKind::Size).count() > 1 {
            return Err(Error::SchemaMismatch("more than one size column".into()));
        }

        let record_length: usize = fields.iter().map(|f| f.stored_width() as usize).sum();

        let rows = ExtSorter::new(tmp_dir, record_length)?;

        Ok(HashsetBuilder {
            name: name.to_string(),
            desc: desc.to_string(),
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            fields,
            out_path: out_path.to_path_buf(),
            tmp_dir: tmp_dir.to_path_buf(),
            with_records,
            with_hashsets,
            bucket_bits: DEFAULT_BUCKET_BITS,
            cancel: None,
            rows,
            row_buf: Vec::with_capacity(record_length),
            record_length,
            pushed: 0,
        })
    }

    /// Overrides the hint granularity: `0` emits a range hint, `1..=8`
    /// emit block hints with that many bucket bits.
    pub fn set_bucket_bits(&mut self, bits: u8) {
        assert!(bits <= 8, "bucket bits limited to 8");
        self.bucket_bits = bits;
    }

    /// Fixes the FHDR timestamp; without this the open time is used.
    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) {
        self.timestamp = timestamp.into();
    }

    /// Installs a cooperative cancellation flag, checked between records.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Records pushed so far (before deduplication).
    pub fn pushed_records(&self) -> u64 {
        self.pushed
    }

    pub(crate) fn check_cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Adds a row already laid out in record encoding; used by the
    /// set-algebra builder, whose inputs are stored rows.
    pub(crate) fn add_encoded_row(&mut self, row: &[u8]) -> Result<()> {
        self.check_cancel()?;
        if row.len() != self.record_length {
            return Err(Error::BadRecord {
                line: 0,
                msg: format!(
                    "row is {} bytes, schema rows are {}",
                    row.len(),
                    self.record_length
                ),
            });
        }
        self.rows.push(row)?;
        self.pushed += 1;
        Ok(())
    }

    /// Adds one record; `values` follows the field order given at open.
    /// Absent fields store a zero presence byte and zero value bytes.
    pub fn add_record(&mut self, values: &[Option<&[u8]>]) -> Result<()> {
        self.check_cancel()?;
        if values.len() != self.fields.len() {
            return Err(Error::BadRecord {
                line: 0,
                msg: format!(
                    "record has {} fields, schema has {}",
                    values.len(),
                    self.fields.len()
                ),
            });
        }
        self.row_buf.clear();
        record_row(&mut self.row_buf, &self.fields, values)?;
        debug_assert_eq!(self.row_buf.len(), self.record_length);
        self.rows.push(&self.row_buf)?;
        self.pushed += 1;
        Ok(())
    }

    /// Sorts, spools, and writes the output file, returning its size in
    /// bytes. On any error the partial output is removed.
    pub fn finalize(self) -> Result<u64> {
        let out_path = self.out_path.clone();
        let written = self.finalize_inner();
        if written.is_err() {
            let _ = fs::remove_file(&out_path);
        }
        written
    }

    fn finalize_inner(self) -> Result<u64> {
        let HashsetBuilder {
            name,
            desc,
            timestamp,
            fields,
            out_path,
            tmp_dir,
            with_records,
            with_hashsets,
            bucket_bits,
            cancel,
            rows,
            record_length,
            pushed,
            ..
        } = self;

        let check_cancel = || -> Result<()> {
            match &cancel {
                Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
                _ => Ok(()),
            }
        };

        // Pass 1: sorted rows -> deduplicated records spool.
        let mut records_file = BufWriter::new(tempfile::tempfile_in(&tmp_dir)?);
        let mut record_count: u64 = 0;
        let mut prev: Vec<u8> = Vec::new();
        let mut sorted = rows.finish()?;
        while let Some(row) = sorted.next_item()? {
            check_cancel()?;
            if record_count > 0 && prev == row {
                continue;
            }
            records_file.write_all(row)?;
            prev.clear();
            prev.extend_from_slice(row);
            record_count += 1;
        }
        let mut records_file = records_file.into_inner().map_err(|e| e.into_error())?;
        debug!(pushed, record_count, "records deduplicated");

        // Pass 2: extract (hash, index) pairs per lookup column.
        let mut columns: Vec<ColumnPlan> = Vec::new();
        if with_hashsets {
            let col_fields: Vec<(usize, FieldDescriptor)> = fields
                .iter()
                .enumerate()
                .filter(|(_, f)| f.kind.is_lookup_kind())
                .map(|(i, f)| (i, f.clone()))
                .collect();

            let mut sorters: Vec<ExtSorter> = col_fields
                .iter()
                .map(|(_, f)| ExtSorter::new(&tmp_dir, f.width as usize + 8))
                .collect::<Result<_>>()?;

            records_file.seek(SeekFrom::Start(0))?;
            let mut reader = BufReader::new(records_file.try_clone()?);
            let mut row = vec![0u8; record_length];
            let offsets: Vec<usize> = col_fields
                .iter()
                .map(|(i, _)| field_offset(&fields, *i))
                .collect();

            let mut item = Vec::new();
            for ri in 0..record_count {
                check_cancel()?;
                reader.read_exact(&mut row)?;
                for (ci, (_, f)) in col_fields.iter().enumerate() {
                    let off = offsets[ci];
                    if row[off] == 0 {
                        continue;
                    }
                    item.clear();
                    item.extend_from_slice(&row[off + 1..off + 1 + f.width as usize]);
                    item.extend_from_slice(&ri.to_be_bytes());
                    sorters[ci].push(&item)?;
                }
            }

            // Pass 3: per column, merge-sort into a spool file while
            // accumulating the hint.
            for ((_, f), sorter) in col_fields.into_iter().zip(sorters) {
                let count = sorter.len();
                let width = f.width as usize;
                let mut acc = hint_eligible(f.kind)
                    .then(|| HintAccumulator::new(bucket_bits, count as usize));

                let mut colfile = BufWriter::new(tempfile::tempfile_in(&tmp_dir)?);
                let mut sorted = sorter.finish()?;
                while let Some(item) = sorted.next_item()? {
                    check_cancel()?;
                    if let Some(acc) = &mut acc {
                        acc.observe(&item[..width]);
                    }
                    colfile.write_all(item)?;
                }
                let file = colfile.into_inner().map_err(|e| e.into_error())?;

                columns.push(ColumnPlan {
                    field: f,
                    count,
                    hint: acc.map(HintAccumulator::finish),
                    file,
                });
            }
        }

        // Pass 4: emit the file.
        let mut out = BufWriter::new(File::create(&out_path)?);
        let mut toc = TableOfContents::default();

        write_magic(&mut out)?;

        toc.entries.push((out.stream_position()?, crate::format::FHDR));
        let mut payload = Vec::new();
        fhdr_data(&mut payload, FORMAT_VERSION, &name, &timestamp, &desc)?;
        write_chunk_bytes(&mut out, crate::format::FHDR, &payload)?;

        for col in &mut columns {
            check_cancel()?;
            let tag = column_tag(col.field.kind);
            toc.entries.push((out.stream_position()?, tag));
            let mut payload = Vec::new();
            hhnn_data(&mut payload, &col.field.name, col.field.width, col.count)?;
            write_chunk_bytes(&mut out, tag, &payload)?;

            if let Some(hint) = &col.hint {
                toc.entries.push((out.stream_position()?, HINT));
                let mut payload = Vec::new();
                hint_data(&mut payload, hint);
                write_chunk_bytes(&mut out, HINT, &payload)?;
            }

            let pos = out.stream_position()?;
            write_padding(&mut out, alignment_padding(pos, HDAT_ALIGN))?;

            let width = col.field.width as usize;
            let stride = width + 8;
            let count = col.count;

            toc.entries.push((out.stream_position()?, HDAT));
            col.file.seek(SeekFrom::Start(0))?;
            let mut reader = BufReader::new(col.file.try_clone()?);
            write_chunk(&mut out, HDAT, |w| {
                let mut item = vec![0u8; stride];
                for _ in 0..count {
                    reader.read_exact(&mut item)?;
                    w.write_all(&item[..width])?;
                }
                Ok(())
            })?;

            if with_records {
                toc.entries.push((out.stream_position()?, RIDX));
                col.file.seek(SeekFrom::Start(0))?;
                let mut reader = BufReader::new(col.file.try_clone()?);
                write_chunk(&mut out, RIDX, |w| {
                    let mut item = vec![0u8; stride];
                    for _ in 0..count {
                        reader.read_exact(&mut item)?;
                        let ri = u64::from_be_bytes(item[width..].try_into().expect("8 bytes"));
                        w.write_all(&ri.to_le_bytes())?;
                    }
                    Ok(())
                })?;
            }
        }

        if with_records {
            toc.entries.push((out.stream_position()?, RHDR));
            let mut payload = Vec::new();
            rhdr_data(&mut payload, &fields, record_count)?;
            write_chunk_bytes(&mut out, RHDR, &payload)?;

            toc.entries.push((out.stream_position()?, RDAT));
            records_file.seek(SeekFrom::Start(0))?;
            let mut reader = BufReader::new(records_file.try_clone()?);
            write_chunk(&mut out, RDAT, |w| {
                let mut row = vec![0u8; record_length];
                for _ in 0..record_count {
                    reader.read_exact(&mut row)?;
                    w.write_all(&row)?;
                }
                Ok(())
            })?;
        }

        let ftoc_offset = out.stream_position()?;
        let mut payload = Vec::new();
        ftoc_data(&mut payload, &toc);
        write_chunk_bytes(&mut out, FTOC, &payload)?;
        write_chunk_bytes(&mut out, FEND, &[])?;
        write_trailer(&mut out, ftoc_offset)?;

        let total = out.stream_position()?;
        out.flush()?;
        debug!(total, columns = columns.len(), record_count, "hset written");
        Ok(total)
    }
}

/// Byte offset of field `i` within an encoded row.
fn field_offset(fields: &[FieldDescriptor], i: usize) -> usize {
    fields[..i]
        .iter()
        .map(|f| f.stored_width() as usize)
        .sum()
}

/// Whether a column's byte distribution supports interpolation. Size and
/// entropy values are little-endian scalars, so their leading bytes are
/// the least significant and the expected-index estimate is meaningless.
fn hint_eligible(kind: HashKind) -> bool {
    kind.is_lookup_kind() && !matches!(kind, HashKind::Size | HashKind::Entropy)
}
