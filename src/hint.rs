//! Hint construction: one linear pass over a sorted column measuring how
//! far each hash's actual position strays from its expected position.
//!
//! For bucketed hints the deviations are grouped by the top `bits` bits of
//! each hash's first byte; each bucket keeps its minimum and maximum
//! signed deviation. Buckets no hash fell into keep the sentinel
//! `(i64::MAX, i64::MIN)` — after clamping, that window is empty and a
//! query landing there misses without touching the column.
//!
//! [`HintAccumulator`] is the streaming form used by the encoder, which
//! visits each sorted column once as it spools to disk. The slice-based
//! helpers wrap it for callers with the column already in memory.

use crate::format::HintData;
use crate::lookup::{expected_index, HashArray};

/// Streaming hint builder: feed each hash of a sorted column in order,
/// then take the finished hint. `bits == 0` selects the single-window
/// range strategy; `1..=8` select the bucketed block strategy.
#[derive(Debug)]
pub struct HintAccumulator {
    bits: u8,
    set_size: usize,
    next_index: usize,
    bounds: Vec<(i64, i64)>,
}

impl HintAccumulator {
    /// `set_size` is the total number of hashes that will be observed.
    pub fn new(bits: u8, set_size: usize) -> HintAccumulator {
        debug_assert!(bits <= 8);
        let buckets = 1usize << bits;
        HintAccumulator {
            bits,
            set_size,
            next_index: 0,
            bounds: vec![(i64::MAX, i64::MIN); buckets],
        }
    }

    /// Records the next hash of the column, in sorted order.
    pub fn observe(&mut self, hash: &[u8]) {
        let i = self.next_index;
        self.next_index += 1;
        let delta = i as i64 - expected_index(hash, self.set_size) as i64;
        let bi = if self.bits == 0 {
            0
        } else {
            (hash[0] >> (8 - self.bits)) as usize
        };
        let b = &mut self.bounds[bi];
        b.0 = b.0.min(delta);
        b.1 = b.1.max(delta);
    }

    pub fn finish(self) -> HintData {
        debug_assert_eq!(self.next_index, self.set_size);
        if self.bits == 0 {
            let (left, right) = self.bounds[0];
            HintData::Range { left, right }
        } else {
            HintData::Block {
                bits: self.bits,
                bounds: self.bounds,
            }
        }
    }
}

fn accumulate(hashes: HashArray<'_>, bits: u8) -> HintAccumulator {
    let mut acc = HintAccumulator::new(bits, hashes.len());
    for i in 0..hashes.len() {
        acc.observe(hashes.get(i));
    }
    acc
}

/// Per-bucket `(min δ, max δ)` over `δᵢ = i − expected(H[i])`, for
/// `bits ∈ {1..8}`.
pub fn build_block_hint(hashes: HashArray<'_>, bits: u8) -> HintData {
    debug_assert!((1..=8).contains(&bits));
    accumulate(hashes, bits).finish()
}

/// A single `(min δ, max δ)` window over the whole column — the
/// degenerate one-bucket case, selected by a bucket-bits parameter of 0.
pub fn build_range_hint(hashes: HashArray<'_>) -> HintData {
    accumulate(hashes, 0).finish()
}

/// Builds the hint a column should carry: `bits == 0` selects the range
/// strategy, anything else the bucketed block strategy.
pub fn build_hint(hashes: HashArray<'_>, bits: u8) -> HintData {
    accumulate(hashes, bits).finish()
}

/// The maximum absolute deviation, for the symmetric radius strategy.
pub fn compute_radius(hashes: HashArray<'_>) -> u32 {
    let n = hashes.len();
    let mut max_delta: i64 = 0;
    for i in 0..n {
        let delta = i as i64 - expected_index(hashes.get(i), n) as i64;
        max_delta = max_delta.max(delta.abs());
    }
    max_delta as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::LookupStrategy;

    fn column(firsts: &[u8], width: usize) -> Vec<u8> {
        let mut data = Vec::new();
        for (i, b) in firsts.iter().enumerate() {
            let mut h = vec![0u8; width];
            h[0] = *b;
            h[width - 1] = i as u8;
            data.extend_from_slice(&h);
        }
        data
    }

    #[test]
    fn block_bounds_cover_all_deltas() {
        let mut firsts: Vec<u8> = (0..=255u32).map(|i| ((i * i) / 256) as u8).collect();
        firsts.sort_unstable();
        let data = column(&firsts, 8);
        let arr = HashArray::new(&data, 8);

        let HintData::Block { bits, bounds } = build_block_hint(arr, 8) else {
            panic!("expected block hint");
        };
        assert_eq!(bits, 8);
        assert_eq!(bounds.len(), 256);

        let n = arr.len();
        for i in 0..n {
            let h = arr.get(i);
            let delta = i as i64 - expected_index(h, n) as i64;
            let (l, r) = bounds[h[0] as usize];
            assert!(l <= delta && delta <= r);
        }
    }

    #[test]
    fn unvisited_buckets_keep_sentinel() {
        // Every hash starts with byte 0: bucket 0 visited, all others not.
        let data = column(&[0, 0, 0, 0], 8);
        let arr = HashArray::new(&data, 8);
        let HintData::Block { bounds, .. } = build_block_hint(arr, 4) else {
            panic!("expected block hint");
        };
        assert_ne!(bounds[0], (i64::MAX, i64::MIN));
        for b in &bounds[1..] {
            assert_eq!(*b, (i64::MAX, i64::MIN));
        }
    }

    #[test]
    fn range_hint_covers_every_member() {
        let firsts: Vec<u8> = (0..=255u32).step_by(3).map(|b| b as u8).collect();
        let data = column(&firsts, 8);
        let arr = HashArray::new(&data, 8);

        let HintData::Range { left, right } = build_range_hint(arr) else {
            panic!("expected range hint");
        };
        let s = LookupStrategy::Range { left, right };
        for i in 0..arr.len() {
            assert!(s.contains(arr, arr.get(i)));
        }
    }

    #[test]
    fn zero_bits_selects_range() {
        let data = column(&[1, 2, 3], 8);
        let arr = HashArray::new(&data, 8);
        assert!(matches!(build_hint(arr, 0), HintData::Range { .. }));
        assert!(matches!(build_hint(arr, 8), HintData::Block { bits: 8, .. }));
    }

    #[test]
    fn streaming_matches_slice_build() {
        let mut firsts: Vec<u8> = (0..=255u32).map(|i| ((i * 7) % 256) as u8).collect();
        firsts.sort_unstable();
        let data = column(&firsts, 16);
        let arr = HashArray::new(&data, 16);

        let mut acc = HintAccumulator::new(8, arr.len());
        for i in 0..arr.len() {
            acc.observe(arr.get(i));
        }
        assert_eq!(acc.finish(), build_block_hint(arr, 8));
    }

    #[test]
    fn radius_bounds_every_member() {
        let mut firsts: Vec<u8> = (0..=255u32).map(|i| ((i * i) / 256) as u8).collect();
        firsts.sort_unstable();
        let data = column(&firsts, 8);
        let arr = HashArray::new(&data, 8);

        let r = compute_radius(arr);
        let s = LookupStrategy::Radius(r);
        for i in 0..arr.len() {
            assert!(s.contains(arr, arr.get(i)));
        }
    }

    #[test]
    fn empty_column_hints() {
        let arr = HashArray::new(&[], 8);
        assert_eq!(compute_radius(arr), 0);
        let HintData::Range { left, right } = build_range_hint(arr) else {
            panic!("expected range hint");
        };
        // No deltas observed: the window stays inverted (empty).
        assert!(left > right);
    }
}
