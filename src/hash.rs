//! Hash kinds recognised by the container format.
//!
//! Each kind is a single bit in a `u32` flag word, so a set of kinds is a
//! plain bitmask and the column chunk tag can carry the bit index (the
//! `nn` in `HHnn`) instead of the full flag value.

use crate::error::{Error, Result};

/// A digest (or companion-field) kind with a fixed on-disk width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum HashKind {
    Md5 = 1 << 0,
    Sha1 = 1 << 1,
    Sha2_224 = 1 << 2,
    Sha2_256 = 1 << 3,
    Sha2_384 = 1 << 4,
    Sha2_512 = 1 << 5,
    Sha3_224 = 1 << 6,
    Sha3_256 = 1 << 7,
    Sha3_384 = 1 << 8,
    Sha3_512 = 1 << 9,
    Blake3 = 1 << 10,
    /// ssdeep fuzzy hash; a null-padded string field, never a lookup column.
    Fuzzy = 1 << 11,
    /// Shannon entropy as a little-endian f64.
    Entropy = 1 << 12,
    /// File size as a little-endian u64, keyed as an 8-byte column.
    Size = 1 << 13,
    /// MD5 of the first 256 bytes of input.
    QuickMd5 = 1 << 14,
    /// Reserved for kinds this implementation does not interpret.
    Other = 1 << 31,
}

/// All kinds in bit order, for iteration over a mask.
pub const ALL_KINDS: [HashKind; 16] = [
    HashKind::Md5,
    HashKind::Sha1,
    HashKind::Sha2_224,
    HashKind::Sha2_256,
    HashKind::Sha2_384,
    HashKind::Sha2_512,
    HashKind::Sha3_224,
    HashKind::Sha3_256,
    HashKind::Sha3_384,
    HashKind::Sha3_512,
    HashKind::Blake3,
    HashKind::Fuzzy,
    HashKind::Entropy,
    HashKind::Size,
    HashKind::QuickMd5,
    HashKind::Other,
];

impl HashKind {
    /// Byte width of one value of this kind. `Other` has no fixed width.
    pub fn width(self) -> usize {
        match self {
            HashKind::Md5 | HashKind::QuickMd5 => 16,
            HashKind::Sha1 => 20,
            HashKind::Sha2_224 | HashKind::Sha3_224 => 28,
            HashKind::Sha2_256 | HashKind::Sha3_256 | HashKind::Blake3 => 32,
            HashKind::Sha2_384 | HashKind::Sha3_384 => 48,
            HashKind::Sha2_512 | HashKind::Sha3_512 => 64,
            HashKind::Fuzzy => 148,
            HashKind::Entropy | HashKind::Size => 8,
            HashKind::Other => 0,
        }
    }

    /// Canonical name, as stored in column and field descriptors.
    pub fn name(self) -> &'static str {
        match self {
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
            HashKind::Sha2_224 => "sha2_224",
            HashKind::Sha2_256 => "sha2_256",
            HashKind::Sha2_384 => "sha2_384",
            HashKind::Sha2_512 => "sha2_512",
            HashKind::Sha3_224 => "sha3_224",
            HashKind::Sha3_256 => "sha3_256",
            HashKind::Sha3_384 => "sha3_384",
            HashKind::Sha3_512 => "sha3_512",
            HashKind::Blake3 => "blake3",
            HashKind::Fuzzy => "fuzzy",
            HashKind::Entropy => "entropy",
            HashKind::Size => "sizes",
            HashKind::QuickMd5 => "quick_md5",
            HashKind::Other => "other",
        }
    }

    /// Parses a canonical name. The inverse of [`HashKind::name`].
    pub fn from_name(name: &str) -> Option<HashKind> {
        ALL_KINDS.iter().copied().find(|k| k.name() == name)
    }

    /// The bit index `n` such that the flag value equals `1 << n`.
    pub fn exponent(self) -> u16 {
        (self as u32).trailing_zeros() as u16
    }

    /// Recovers a kind from its bit index; the `nn` of an `HHnn` tag.
    pub fn from_exponent(n: u16) -> Result<HashKind> {
        if n >= 32 {
            return Err(Error::UnknownChunk(format!("hash kind exponent {n}")));
        }
        let flag = 1u32 << n;
        ALL_KINDS
            .iter()
            .copied()
            .find(|k| *k as u32 == flag)
            .ok_or_else(|| Error::UnknownChunk(format!("hash kind exponent {n}")))
    }

    /// True for kinds the lookup engine can serve: fixed-width, byte-ordered
    /// columns. Fuzzy hashes are string-valued and excluded.
    pub fn is_lookup_kind(self) -> bool {
        !matches!(self, HashKind::Fuzzy | HashKind::Other)
    }
}

/// Expands a bitmask into kinds, in ascending bit order.
pub fn kinds_from_mask(mask: u32) -> Vec<HashKind> {
    ALL_KINDS
        .iter()
        .copied()
        .filter(|k| mask & (*k as u32) != 0)
        .collect()
}
