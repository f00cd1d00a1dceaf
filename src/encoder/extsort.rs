//! External merge sort over fixed-stride byte items.
//!
//! The encoder's inputs can exceed memory, so items are accumulated into
//! bounded in-memory runs, each run sorted and spilled to an anonymous
//! temp file in the configured directory, and the runs replayed through a
//! k-way heap merge. Items sort by their full byte content, so equal
//! items are bit-identical and run-level sort stability is immaterial to
//! output determinism.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// Default bytes per in-memory run before spilling.
const RUN_BYTES: usize = 64 << 20;

/// Accumulates fixed-stride items and produces them back in sorted order.
pub struct ExtSorter {
    stride: usize,
    run_items: usize,
    buf: Vec<u8>,
    spill: BufWriter<File>,
    /// `(first item index, item count)` of each spilled run.
    runs: Vec<(u64, u64)>,
    count: u64,
}

impl ExtSorter {
    /// A sorter for `stride`-byte items spooling into `tmp_dir`.
    pub fn new(tmp_dir: &Path, stride: usize) -> Result<ExtSorter> {
        ExtSorter::with_run_bytes(tmp_dir, stride, RUN_BYTES)
    }

    /// As [`ExtSorter::new`] with an explicit run size; small run sizes
    /// force multi-run merges and are used by tests.
    pub fn with_run_bytes(tmp_dir: &Path, stride: usize, run_bytes: usize) -> Result<ExtSorter> {
        assert!(stride > 0);
        let spill = tempfile::tempfile_in(tmp_dir)?;
        Ok(ExtSorter {
            stride,
            run_items: (run_bytes / stride).max(1),
            buf: Vec::new(),
            spill: BufWriter::new(spill),
            runs: Vec::new(),
            count: 0,
        })
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Adds one item; `item.len()` must equal the stride.
    pub fn push(&mut self, item: &[u8]) -> Result<()> {
        debug_assert_eq!(item.len(), self.stride);
        self.buf.extend_from_slice(item);
        self.count += 1;
        if self.buf.len() / self.stride >= self.run_items {
            self.spill_run()?;
        }
        Ok(())
    }

    fn spill_run(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let stride = self.stride;
        let n = self.buf.len() / stride;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_unstable_by(|&a, &b| {
            self.buf[a * stride..(a + 1) * stride].cmp(&self.buf[b * stride..(b + 1) * stride])
        });

        let first = self.runs.iter().map(|(_, c)| c).sum::<u64>();
        for i in order {
            self.spill.write_all(&self.buf[i * stride..(i + 1) * stride])?;
        }
        self.runs.push((first, n as u64));
        self.buf.clear();
        Ok(())
    }

    /// Spills the final run and returns the merged, sorted stream.
    pub fn finish(mut self) -> Result<SortedItems> {
        self.spill_run()?;
        let file = self.spill.into_inner().map_err(|e| e.into_error())?;

        let stride = self.stride;
        let mut sources = Vec::with_capacity(self.runs.len());
        for &(first, items) in &self.runs {
            let mut f = file.try_clone()?;
            f.seek(SeekFrom::Start(first * stride as u64))?;
            sources.push(RunSource {
                reader: BufReader::new(f),
                remaining: items,
            });
        }

        let mut merged = SortedItems {
            stride,
            sources,
            heap: BinaryHeap::new(),
            current: vec![0u8; stride],
        };
        merged.prime()?;
        Ok(merged)
    }
}

struct RunSource {
    reader: BufReader<File>,
    remaining: u64,
}

impl RunSource {
    fn read_item(&mut self, stride: usize) -> Result<Option<Vec<u8>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let mut item = vec![0u8; stride];
        self.reader.read_exact(&mut item)?;
        self.remaining -= 1;
        Ok(Some(item))
    }
}

/// The sorted output stream of an [`ExtSorter`]. Items are yielded via
/// [`SortedItems::next_item`] into an internal buffer, so the caller sees
/// each item without a per-item allocation.
pub struct SortedItems {
    stride: usize,
    sources: Vec<RunSource>,
    heap: BinaryHeap<Reverse<(Vec<u8>, usize)>>,
    current: Vec<u8>,
}

impl SortedItems {
    fn prime(&mut self) -> Result<()> {
        for i in 0..self.sources.len() {
            if let Some(item) = self.sources[i].read_item(self.stride)? {
                self.heap.push(Reverse((item, i)));
            }
        }
        Ok(())
    }

    /// The next item in ascending byte order, or `None` when exhausted.
    pub fn next_item(&mut self) -> Result<Option<&[u8]>> {
        let Some(Reverse((item, src))) = self.heap.pop() else {
            return Ok(None);
        };
        if let Some(next) = self.sources[src].read_item(self.stride)? {
            self.heap.push(Reverse((next, src)));
        }
        self.current.copy_from_slice(&item);
        Ok(Some(&self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tempfile::TempDir;

    fn drain(mut items: SortedItems) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(item) = items.next_item().unwrap() {
            out.push(item.to_vec());
        }
        out
    }

    #[test]
    fn empty_input_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let sorter = ExtSorter::new(dir.path(), 8).unwrap();
        assert!(sorter.is_empty());
        let items = sorter.finish().unwrap();
        assert!(drain(items).is_empty());
    }

    #[test]
    fn single_run_sorts() {
        let dir = TempDir::new().unwrap();
        let mut sorter = ExtSorter::new(dir.path(), 4).unwrap();
        for v in [7u32, 3, 9, 1, 3] {
            sorter.push(&v.to_be_bytes()).unwrap();
        }
        assert_eq!(sorter.len(), 5);
        let out = drain(sorter.finish().unwrap());
        let vals: Vec<u32> = out
            .iter()
            .map(|b| u32::from_be_bytes(b.as_slice().try_into().unwrap()))
            .collect();
        assert_eq!(vals, [1, 3, 3, 7, 9]);
    }

    #[test]
    fn multi_run_merge_matches_in_memory_sort() {
        let dir = TempDir::new().unwrap();
        // 16-byte items, runs of 32 items: 1000 items => 32 runs
        let mut sorter = ExtSorter::with_run_bytes(dir.path(), 16, 16 * 32).unwrap();
        let mut rng = StdRng::seed_from_u64(0xB10C);
        let mut expected: Vec<[u8; 16]> = Vec::new();
        for _ in 0..1000 {
            let item: [u8; 16] = rng.gen();
            sorter.push(&item).unwrap();
            expected.push(item);
        }
        expected.sort_unstable();

        let out = drain(sorter.finish().unwrap());
        assert_eq!(out.len(), 1000);
        for (a, b) in out.iter().zip(&expected) {
            assert_eq!(a.as_slice(), b.as_slice());
        }
    }

    #[test]
    fn duplicates_survive_merge() {
        let dir = TempDir::new().unwrap();
        let mut sorter = ExtSorter::with_run_bytes(dir.path(), 2, 4).unwrap();
        for _ in 0..10 {
            sorter.push(&[5, 5]).unwrap();
        }
        let out = drain(sorter.finish().unwrap());
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|i| i == &[5, 5]));
    }
}
