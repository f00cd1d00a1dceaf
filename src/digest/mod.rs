//! Multi-algorithm digest pipeline.
//!
//! A [`Hasher`] fans one byte stream out to every digest kind named in a
//! bitmask. Each kind is a separate state object behind [`DigestState`];
//! the pipeline drives them all per `update` call and collects results
//! into the fixed-layout [`HashValues`]. This is the usual data source
//! for the encoder: hash an object, then push one record per object.
//!
//! The ssdeep fuzzy kind lives behind an external wrapper and is not
//! constructed here, but the pipeline still forwards
//! `set_total_input_length`, which that kind (alone) requires before
//! hashing begins.

use digest::{Digest, Reset};

use crate::hash::{kinds_from_mask, HashKind};

// ─────────────────────────────────────────────────────────────────────────────
// Per-kind state
// ─────────────────────────────────────────────────────────────────────────────

/// One digest algorithm's running state.
pub trait DigestState: Send {
    fn update(&mut self, data: &[u8]);

    /// Length hint delivered before hashing; ignored by every kind except
    /// the fuzzy hash (and harmless everywhere else).
    fn set_total_input_length(&mut self, _len: u64) {}

    /// Writes the current digest into `out` without disturbing the
    /// running state; more input may follow.
    fn finish_into(&self, out: &mut [u8]);

    fn reset(&mut self);

    fn boxed_clone(&self) -> Box<dyn DigestState>;
}

/// Adapter over any RustCrypto hash.
struct CryptoState<D> {
    inner: D,
}

impl<D> DigestState for CryptoState<D>
where
    D: Digest + Reset + Clone + Send + 'static,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finish_into(&self, out: &mut [u8]) {
        out.copy_from_slice(self.inner.clone().finalize().as_slice());
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.inner);
    }

    fn boxed_clone(&self) -> Box<dyn DigestState> {
        Box::new(CryptoState {
            inner: self.inner.clone(),
        })
    }
}

/// BLAKE3 keeps its own API surface; adapt it directly.
struct Blake3State {
    inner: blake3::Hasher,
}

impl DigestState for Blake3State {
    fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn finish_into(&self, out: &mut [u8]) {
        out.copy_from_slice(self.inner.finalize().as_bytes());
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn boxed_clone(&self) -> Box<dyn DigestState> {
        Box::new(Blake3State {
            inner: self.inner.clone(),
        })
    }
}

/// Shannon entropy over the byte histogram.
///
/// Computed as `log2(s) - (Σ bᵢ·log2(bᵢ)) / s` rather than straight from
/// the definition: one extra `log2` call in exchange for 255 fewer
/// floating-point divisions, which accumulates less error.
#[derive(Clone)]
struct EntropyState {
    hist: [u64; 256],
}

impl EntropyState {
    fn new() -> EntropyState {
        EntropyState { hist: [0; 256] }
    }

    fn entropy(&self) -> f64 {
        let s: u64 = self.hist.iter().sum();
        if s == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .hist
            .iter()
            .map(|&b| if b > 0 { b as f64 * (b as f64).log2() } else { 0.0 })
            .sum();
        (s as f64).log2() - sum / s as f64
    }
}

impl DigestState for EntropyState {
    fn update(&mut self, data: &[u8]) {
        for b in data {
            self.hist[*b as usize] += 1;
        }
    }

    fn finish_into(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.entropy().to_le_bytes());
    }

    fn reset(&mut self) {
        self.hist = [0; 256];
    }

    fn boxed_clone(&self) -> Box<dyn DigestState> {
        Box::new(self.clone())
    }
}

/// Bytes of input the quick hash covers.
pub const QUICK_HASH_BYTES: u64 = 256;

/// MD5 of the first [`QUICK_HASH_BYTES`] bytes only; a cheap triage key
/// for large files.
struct QuickMd5State {
    inner: md5::Md5,
    offset: u64,
}

impl QuickMd5State {
    fn new() -> QuickMd5State {
        QuickMd5State {
            inner: md5::Md5::new(),
            offset: 0,
        }
    }
}

impl DigestState for QuickMd5State {
    fn update(&mut self, data: &[u8]) {
        if self.offset >= QUICK_HASH_BYTES {
            return;
        }
        let take = ((QUICK_HASH_BYTES - self.offset) as usize).min(data.len());
        Digest::update(&mut self.inner, &data[..take]);
        self.offset += take as u64;
    }

    fn finish_into(&self, out: &mut [u8]) {
        out.copy_from_slice(self.inner.clone().finalize().as_slice());
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.inner);
        self.offset = 0;
    }

    fn boxed_clone(&self) -> Box<dyn DigestState> {
        Box::new(QuickMd5State {
            inner: self.inner.clone(),
            offset: self.offset,
        })
    }
}

fn make_state(kind: HashKind) -> Option<Box<dyn DigestState>> {
    Some(match kind {
        HashKind::Md5 => Box::new(CryptoState { inner: md5::Md5::new() }),
        HashKind::Sha1 => Box::new(CryptoState { inner: sha1::Sha1::new() }),
        HashKind::Sha2_224 => Box::new(CryptoState { inner: sha2::Sha224::new() }),
        HashKind::Sha2_256 => Box::new(CryptoState { inner: sha2::Sha256::new() }),
        HashKind::Sha2_384 => Box::new(CryptoState { inner: sha2::Sha384::new() }),
        HashKind::Sha2_512 => Box::new(CryptoState { inner: sha2::Sha512::new() }),
        HashKind::Sha3_224 => Box::new(CryptoState { inner: sha3::Sha3_224::new() }),
        HashKind::Sha3_256 => Box::new(CryptoState { inner: sha3::Sha3_256::new() }),
        HashKind::Sha3_384 => Box::new(CryptoState { inner: sha3::Sha3_384::new() }),
        HashKind::Sha3_512 => Box::new(CryptoState { inner: sha3::Sha3_512::new() }),
        HashKind::Blake3 => Box::new(Blake3State { inner: blake3::Hasher::new() }),
        HashKind::Entropy => Box::new(EntropyState::new()),
        HashKind::QuickMd5 => Box::new(QuickMd5State::new()),
        // size comes from stat, fuzzy from its external wrapper
        HashKind::Size | HashKind::Fuzzy | HashKind::Other => return None,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Output layout
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed output layout; each pipeline kind writes its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct HashValues {
    pub md5: [u8; 16],
    pub sha1: [u8; 20],
    pub sha2_224: [u8; 28],
    pub sha2_256: [u8; 32],
    pub sha2_384: [u8; 48],
    pub sha2_512: [u8; 64],
    pub sha3_224: [u8; 28],
    pub sha3_256: [u8; 32],
    pub sha3_384: [u8; 48],
    pub sha3_512: [u8; 64],
    pub blake3: [u8; 32],
    pub fuzzy: [u8; 148],
    pub entropy: f64,
    pub quick_md5: [u8; 16],
}

impl Default for HashValues {
    fn default() -> HashValues {
        HashValues {
            md5: [0; 16],
            sha1: [0; 20],
            sha2_224: [0; 28],
            sha2_256: [0; 32],
            sha2_384: [0; 48],
            sha2_512: [0; 64],
            sha3_224: [0; 28],
            sha3_256: [0; 32],
            sha3_384: [0; 48],
            sha3_512: [0; 64],
            blake3: [0; 32],
            fuzzy: [0; 148],
            entropy: 0.0,
            quick_md5: [0; 16],
        }
    }
}

impl HashValues {
    /// The slot a pipeline kind writes into, as mutable bytes.
    fn slot_mut(&mut self, kind: HashKind) -> Option<&mut [u8]> {
        Some(match kind {
            HashKind::Md5 => &mut self.md5,
            HashKind::Sha1 => &mut self.sha1,
            HashKind::Sha2_224 => &mut self.sha2_224,
            HashKind::Sha2_256 => &mut self.sha2_256,
            HashKind::Sha2_384 => &mut self.sha2_384,
            HashKind::Sha2_512 => &mut self.sha2_512,
            HashKind::Sha3_224 => &mut self.sha3_224,
            HashKind::Sha3_256 => &mut self.sha3_256,
            HashKind::Sha3_384 => &mut self.sha3_384,
            HashKind::Sha3_512 => &mut self.sha3_512,
            HashKind::Blake3 => &mut self.blake3,
            HashKind::QuickMd5 => &mut self.quick_md5,
            _ => return None,
        })
    }

    /// The value for `kind`, as stored in a record field.
    pub fn field_bytes(&self, kind: HashKind) -> Option<Vec<u8>> {
        Some(match kind {
            HashKind::Md5 => self.md5.to_vec(),
            HashKind::Sha1 => self.sha1.to_vec(),
            HashKind::Sha2_224 => self.sha2_224.to_vec(),
            HashKind::Sha2_256 => self.sha2_256.to_vec(),
            HashKind::Sha2_384 => self.sha2_384.to_vec(),
            HashKind::Sha2_512 => self.sha2_512.to_vec(),
            HashKind::Sha3_224 => self.sha3_224.to_vec(),
            HashKind::Sha3_256 => self.sha3_256.to_vec(),
            HashKind::Sha3_384 => self.sha3_384.to_vec(),
            HashKind::Sha3_512 => self.sha3_512.to_vec(),
            HashKind::Blake3 => self.blake3.to_vec(),
            HashKind::Fuzzy => self.fuzzy.to_vec(),
            HashKind::Entropy => self.entropy.to_le_bytes().to_vec(),
            HashKind::QuickMd5 => self.quick_md5.to_vec(),
            HashKind::Size | HashKind::Other => return None,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Fan-out digest pipeline over the kinds named in a bitmask.
pub struct Hasher {
    states: Vec<(HashKind, Box<dyn DigestState>)>,
}

impl Hasher {
    /// One state per requested kind; bits for kinds the pipeline cannot
    /// compute (size, fuzzy, other) are ignored.
    pub fn new(mask: u32) -> Hasher {
        let states = kinds_from_mask(mask)
            .into_iter()
            .filter_map(|k| make_state(k).map(|s| (k, s)))
            .collect();
        Hasher { states }
    }

    pub fn update(&mut self, data: &[u8]) {
        for (_, s) in &mut self.states {
            s.update(data);
        }
    }

    /// Forwarded to every state; must precede the first `update` for
    /// length-sensitive kinds.
    pub fn set_total_input_length(&mut self, len: u64) {
        for (_, s) in &mut self.states {
            s.set_total_input_length(len);
        }
    }

    /// Collects every requested digest. The pipeline remains usable; more
    /// input may follow.
    pub fn get(&self, out: &mut HashValues) {
        for (kind, s) in &self.states {
            match kind {
                HashKind::Entropy => {
                    let mut b = [0u8; 8];
                    s.finish_into(&mut b);
                    out.entropy = f64::from_le_bytes(b);
                }
                _ => {
                    if let Some(slot) = out.slot_mut(*kind) {
                        s.finish_into(slot);
                    }
                }
            }
        }
    }

    pub fn reset(&mut self) {
        for (_, s) in &mut self.states {
            s.reset();
        }
    }
}

impl Clone for Hasher {
    fn clone(&self) -> Hasher {
        Hasher {
            states: self
                .states
                .iter()
                .map(|(k, s)| (*k, s.boxed_clone()))
                .collect(),
        }
    }
}

/// One-shot convenience: every digest of `data` for the masked kinds.
pub fn hash_bytes(mask: u32, data: &[u8]) -> HashValues {
    let mut h = Hasher::new(mask);
    h.set_total_input_length(data.len() as u64);
    h.update(data);
    let mut out = HashValues::default();
    h.get(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn known_vectors() {
        let v = hash_bytes(
            HashKind::Md5 as u32 | HashKind::Sha1 as u32 | HashKind::Sha2_256 as u32,
            b"abc",
        );
        assert_eq!(v.md5.as_slice(), hex("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(
            v.sha1.as_slice(),
            hex("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        assert_eq!(
            v.sha2_256.as_slice(),
            hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn matches_direct_crate_calls() {
        use digest::Digest;
        let data = b"the quick brown fox";
        let mask = HashKind::Sha2_512 as u32
            | HashKind::Sha3_256 as u32
            | HashKind::Blake3 as u32;
        let v = hash_bytes(mask, data);
        assert_eq!(v.sha2_512.as_slice(), sha2::Sha512::digest(data).as_slice());
        assert_eq!(v.sha3_256.as_slice(), sha3::Sha3_256::digest(data).as_slice());
        assert_eq!(v.blake3, *blake3::hash(data).as_bytes());
    }

    #[test]
    fn unrequested_slots_stay_zero() {
        let v = hash_bytes(HashKind::Md5 as u32, b"abc");
        assert_eq!(v.sha1, [0u8; 20]);
        assert_eq!(v.blake3, [0u8; 32]);
    }

    #[test]
    fn incremental_equals_oneshot() {
        let mask = HashKind::Sha1 as u32 | HashKind::Entropy as u32;
        let mut h = Hasher::new(mask);
        h.update(b"hello ");
        h.update(b"world");
        let mut inc = HashValues::default();
        h.get(&mut inc);
        assert_eq!(inc, hash_bytes(mask, b"hello world"));
    }

    #[test]
    fn get_does_not_disturb_state() {
        let mut h = Hasher::new(HashKind::Md5 as u32);
        h.update(b"hello ");
        let mut mid = HashValues::default();
        h.get(&mut mid);
        h.update(b"world");
        let mut done = HashValues::default();
        h.get(&mut done);
        assert_eq!(done, hash_bytes(HashKind::Md5 as u32, b"hello world"));
        assert_ne!(mid, done);
    }

    #[test]
    fn reset_starts_over() {
        let mask = HashKind::Sha1 as u32 | HashKind::QuickMd5 as u32;
        let mut h = Hasher::new(mask);
        h.update(b"garbage");
        h.reset();
        h.update(b"abc");
        let mut v = HashValues::default();
        h.get(&mut v);
        assert_eq!(v, hash_bytes(mask, b"abc"));
    }

    #[test]
    fn clone_forks_state() {
        let mut a = Hasher::new(HashKind::Md5 as u32);
        a.update(b"shared");
        let mut b = a.clone();
        a.update(b"-left");
        b.update(b"-right");
        let (mut va, mut vb) = (HashValues::default(), HashValues::default());
        a.get(&mut va);
        b.get(&mut vb);
        assert_eq!(va, hash_bytes(HashKind::Md5 as u32, b"shared-left"));
        assert_eq!(vb, hash_bytes(HashKind::Md5 as u32, b"shared-right"));
    }

    #[test]
    fn quick_md5_caps_at_256_bytes() {
        let long = vec![0xABu8; 1000];
        let v = hash_bytes(HashKind::QuickMd5 as u32, &long);
        let head = hash_bytes(HashKind::Md5 as u32, &long[..256]);
        assert_eq!(v.quick_md5, head.md5);

        // short input: quick hash equals the plain hash
        let v = hash_bytes(
            HashKind::QuickMd5 as u32 | HashKind::Md5 as u32,
            b"short input",
        );
        assert_eq!(v.quick_md5, v.md5);
    }

    #[test]
    fn entropy_extremes() {
        let uniform: Vec<u8> = (0..=255u8).collect();
        let v = hash_bytes(HashKind::Entropy as u32, &uniform);
        assert!((v.entropy - 8.0).abs() < 1e-9);

        let constant = vec![7u8; 4096];
        let v = hash_bytes(HashKind::Entropy as u32, &constant);
        assert_eq!(v.entropy, 0.0);

        let v = hash_bytes(HashKind::Entropy as u32, b"");
        assert_eq!(v.entropy, 0.0);
    }

    #[test]
    fn unsupported_mask_bits_ignored() {
        let h = Hasher::new(HashKind::Size as u32 | HashKind::Fuzzy as u32);
        assert_eq!(h.states.len(), 0);
    }
}
