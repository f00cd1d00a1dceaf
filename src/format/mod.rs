//! The hset container format: chunk types, tags, and the structs each
//! chunk decodes into.
//!
//! A file is the 8-byte magic `"SetOHash"` followed by chunks, each laid
//! out as `[4-byte tag][u64 LE payload length][payload]`. A trailing
//! table of contents (`FTOC`) records the offset and tag of every chunk
//! before it, and the file's final 12 bytes — `[u64 LE ftoc_offset]["FTOC"]`
//! — let a decoder find the FTOC without scanning. An empty `FEND` chunk
//! terminates the file.
//!
//! Column chunks use a parameterised tag: `'H','H'` followed by the hash
//! kind's bit index as a big-endian u16, so `HH` + `0x0001` is the SHA-1
//! column header.

pub mod decode;
pub mod encode;
pub mod parse;

use crate::error::{Error, Result};
use crate::hash::HashKind;

/// First 8 bytes of every hset file.
pub const MAGIC: &[u8; 8] = b"SetOHash";

/// Format version written to (and required in) `FHDR`.
pub const FORMAT_VERSION: u64 = 2;

/// `HDAT` tags start on a multiple of this, for mmap-friendly access.
pub const HDAT_ALIGN: u64 = 4096;

/// Tag bytes plus the u64 length field.
pub const CHUNK_HEADER_LEN: usize = 12;

/// `[u64 LE ftoc_offset]["FTOC"]` at the very end of the file.
pub const TRAILER_LEN: usize = 12;

/// A chunk type tag.
pub type Tag = [u8; 4];

pub const FHDR: Tag = *b"FHDR";
pub const HINT: Tag = *b"HINT";
pub const FLTR: Tag = *b"FLTR";
pub const HDAT: Tag = *b"HDAT";
pub const RIDX: Tag = *b"RIDX";
pub const RHDR: Tag = *b"RHDR";
pub const RDAT: Tag = *b"RDAT";
pub const FTOC: Tag = *b"FTOC";
pub const FEND: Tag = *b"FEND";

/// The `HHnn` tag for a column of the given kind.
pub fn column_tag(kind: HashKind) -> Tag {
    let n = kind.exponent().to_be_bytes();
    [b'H', b'H', n[0], n[1]]
}

/// True if `tag` is any column header tag.
pub fn is_column_tag(tag: Tag) -> bool {
    tag[0] == b'H' && tag[1] == b'H'
}

/// Recovers the hash kind from an `HHnn` tag.
pub fn column_kind(tag: Tag) -> Result<HashKind> {
    debug_assert!(is_column_tag(tag));
    HashKind::from_exponent(u16::from_be_bytes([tag[2], tag[3]]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoded chunk contents
// ─────────────────────────────────────────────────────────────────────────────

/// `FHDR` payload: format version and the hashset's identity strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u64,
    /// Hashset name, e.g. `"NSRL"`.
    pub name: String,
    /// ISO-8601 UTC creation time, e.g. `"2026-08-01T12:00:00Z"`.
    pub timestamp: String,
    pub desc: String,
}

/// `HHnn` payload: metadata for one hash column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub kind: HashKind,
    /// Kind name as written, normally [`HashKind::name`].
    pub hash_name: String,
    /// Byte width of each hash in this column.
    pub hash_length: u64,
    /// Number of hashes in this column's `HDAT`.
    pub hash_count: u64,
}

/// `HINT` payload: parameters for an interpolation-narrowed binary search.
///
/// The two-byte hint type is big-endian on disk; for the block strategy the
/// high byte is `'b'` and the low byte is the bucket-bit count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintData {
    /// Window `[expected - r, expected + r]`.
    Radius(u32),
    /// Window `[expected + left, expected + right]`; both signed.
    Range { left: i64, right: i64 },
    /// Per-bucket `(left, right)` windows indexed by the top `bits` bits
    /// of the query's first byte.
    Block {
        bits: u8,
        bounds: Vec<(i64, i64)>,
    },
}

/// Hint type word for [`HintData::Radius`].
pub const HINT_TYPE_RADIUS: u16 = 0x0001;
/// Hint type word for [`HintData::Range`].
pub const HINT_TYPE_RANGE: u16 = 0x0002;
/// High byte of the hint type word for [`HintData::Block`].
pub const HINT_TYPE_BLOCK_TAG: u8 = b'b';

impl HintData {
    /// The on-disk hint type word.
    pub fn type_word(&self) -> u16 {
        match self {
            HintData::Radius(_) => HINT_TYPE_RADIUS,
            HintData::Range { .. } => HINT_TYPE_RANGE,
            HintData::Block { bits, .. } => ((HINT_TYPE_BLOCK_TAG as u16) << 8) | *bits as u16,
        }
    }
}

/// `FLTR` payload: an opaque probabilistic prefilter. Retained for
/// diagnostics; lookup never consults it and this encoder never emits one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub filter_type: u16,
    pub data: Vec<u8>,
}

/// One field of a record, in `RHDR` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub kind: HashKind,
    pub name: String,
    /// Byte width of the field's value (excluding the presence byte).
    pub width: u64,
}

impl FieldDescriptor {
    /// A descriptor with the kind's canonical name and width.
    pub fn for_kind(kind: HashKind) -> FieldDescriptor {
        FieldDescriptor {
            kind,
            name: kind.name().to_string(),
            width: kind.width() as u64,
        }
    }

    /// Bytes one value of this field occupies in a row: presence byte
    /// plus the value itself.
    pub fn stored_width(&self) -> u64 {
        1 + self.width
    }
}

/// `RHDR` payload: row length, row count, and the ordered field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Total bytes per row: the sum of `1 + width` over all fields.
    pub record_length: u64,
    pub record_count: u64,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordHeader {
    pub fn for_fields(fields: Vec<FieldDescriptor>, record_count: u64) -> RecordHeader {
        let record_length = fields.iter().map(FieldDescriptor::stored_width).sum();
        RecordHeader {
            record_length,
            record_count,
            fields,
        }
    }

    /// Byte offset of field `i` within a row.
    pub fn field_offset(&self, i: usize) -> u64 {
        self.fields[..i].iter().map(FieldDescriptor::stored_width).sum()
    }

    /// True when both schemas agree on kinds and widths, position by
    /// position. Names are not compared; the left side's names win when
    /// two sets are composed.
    pub fn schema_matches(&self, other: &RecordHeader) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.kind == b.kind && a.width == b.width)
    }
}

/// `FTOC` payload: `(absolute offset, tag)` for every chunk before the
/// FTOC itself, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub entries: Vec<(u64, Tag)>,
}

/// Zero bytes needed to advance `pos` to the next multiple of `align`.
pub fn alignment_padding(pos: u64, align: u64) -> u64 {
    (align - pos % align) % align
}

/// Checks the magic marker at the start of a buffer.
pub fn check_magic(buf: &[u8]) -> Result<()> {
    if buf.len() < MAGIC.len() || &buf[..MAGIC.len()] != MAGIC {
        return Err(Error::BadMagic);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_tag_layout() {
        // SHA-1 is bit 1, big-endian in the tag's last two bytes
        assert_eq!(column_tag(HashKind::Sha1), [b'H', b'H', 0x00, 0x01]);
        assert_eq!(column_tag(HashKind::Size), [b'H', b'H', 0x00, 0x0d]);
        assert_eq!(column_kind([b'H', b'H', 0x00, 0x01]).unwrap(), HashKind::Sha1);
    }

    #[test]
    fn column_tag_detection() {
        assert!(is_column_tag(column_tag(HashKind::Md5)));
        assert!(!is_column_tag(FHDR));
        assert!(!is_column_tag(HDAT));
    }

    #[test]
    fn hint_type_words() {
        assert_eq!(HintData::Radius(5).type_word(), 0x0001);
        assert_eq!(HintData::Range { left: -1, right: 1 }.type_word(), 0x0002);
        let block = HintData::Block {
            bits: 8,
            bounds: vec![(0, 0); 256],
        };
        assert_eq!(block.type_word(), 0x6208);
    }

    #[test]
    fn alignment_padding_values() {
        assert_eq!(alignment_padding(0, 4096), 0);
        assert_eq!(alignment_padding(1, 4096), 4095);
        assert_eq!(alignment_padding(4095, 4096), 1);
        assert_eq!(alignment_padding(4096, 4096), 0);
        assert_eq!(alignment_padding(8191, 4096), 1);
    }

    #[test]
    fn record_header_lengths() {
        let rhdr = RecordHeader::for_fields(
            vec![
                FieldDescriptor::for_kind(HashKind::Md5),
                FieldDescriptor::for_kind(HashKind::Sha1),
            ],
            3,
        );
        assert_eq!(rhdr.record_length, (1 + 16) + (1 + 20));
        assert_eq!(rhdr.field_offset(0), 0);
        assert_eq!(rhdr.field_offset(1), 17);
    }

    #[test]
    fn schema_match_ignores_names() {
        let mut a = RecordHeader::for_fields(vec![FieldDescriptor::for_kind(HashKind::Md5)], 0);
        let b = RecordHeader::for_fields(vec![FieldDescriptor::for_kind(HashKind::Md5)], 9);
        a.fields[0].name = "message-digest-5".into();
        assert!(a.schema_matches(&b));

        let c = RecordHeader::for_fields(vec![FieldDescriptor::for_kind(HashKind::Sha1)], 0);
        assert!(!a.schema_matches(&c));
    }

    #[test]
    fn magic_check() {
        assert!(check_magic(b"SetOHash\x01\x02").is_ok());
        assert!(matches!(check_magic(b"SetOHasX"), Err(Error::BadMagic)));
        assert!(matches!(check_magic(b"SetO"), Err(Error::BadMagic)));
    }
}
