//! Chunk deserialisation.
//!
//! [`decode_chunk`] reads one `[tag][len][payload]` envelope at a given
//! offset; the `parse_*` functions turn a decoded chunk's payload into the
//! structs of [`crate::format`]. Every parser checks that it consumes the
//! payload exactly — trailing bytes are a length mismatch, not slack.

use crate::error::{printable_tag, Error, Result};
use crate::format::{
    column_kind, ColumnHeader, FieldDescriptor, FileHeader, Filter, HintData, RecordHeader,
    TableOfContents, Tag, HINT_TYPE_BLOCK_TAG, HINT_TYPE_RADIUS, HINT_TYPE_RANGE,
};
use crate::hash::HashKind;
use crate::rw::Cursor;

/// One decoded chunk: its tag, where it sits in the file, and a borrowed
/// view of its payload.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub tag: Tag,
    /// Offset of the tag within the file buffer.
    pub offset: usize,
    /// Offset of the first payload byte within the file buffer.
    pub payload_offset: usize,
    pub payload: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Fails with [`Error::ChunkLengthMismatch`] unless the payload is
    /// exactly `expected` bytes.
    pub fn check_length(&self, expected: u64) -> Result<()> {
        if self.payload.len() as u64 != expected {
            return Err(Error::ChunkLengthMismatch {
                tag: printable_tag(self.tag),
                expected,
                found: self.payload.len() as u64,
            });
        }
        Ok(())
    }

    fn cursor(&self) -> Cursor<'a> {
        Cursor::new(self.payload)
    }

    fn check_consumed(&self, cur: &Cursor<'_>) -> Result<()> {
        if !cur.is_empty() {
            return Err(Error::ChunkLengthMismatch {
                tag: printable_tag(self.tag),
                expected: cur.offset() as u64,
                found: self.payload.len() as u64,
            });
        }
        Ok(())
    }
}

/// Decodes the chunk envelope at `offset`.
pub fn decode_chunk(buf: &[u8], offset: usize) -> Result<Chunk<'_>> {
    let mut cur = Cursor::at(buf, offset)?;
    let tag: Tag = cur.read_bytes(4)?.try_into().expect("4-byte slice");
    let len = cur.read_le_u64()?;
    let payload_offset = offset + 12;
    let len = usize::try_from(len).map_err(|_| Error::OutOfData {
        at: payload_offset,
        want: usize::MAX,
    })?;
    let payload = cur.read_bytes(len)?;
    Ok(Chunk {
        tag,
        offset,
        payload_offset,
        payload,
    })
}

pub fn parse_fhdr(ch: &Chunk<'_>) -> Result<FileHeader> {
    let mut cur = ch.cursor();
    let version = cur.read_le_u64()?;
    let name = cur.read_pstring_utf8()?;
    let timestamp = cur.read_pstring_utf8()?;
    let desc = cur.read_pstring_utf8()?;
    ch.check_consumed(&cur)?;
    Ok(FileHeader {
        version,
        name,
        timestamp,
        desc,
    })
}

/// Parses an `HHnn` payload; the hash kind comes from the tag itself.
pub fn parse_hhdr(ch: &Chunk<'_>) -> Result<ColumnHeader> {
    let kind = column_kind(ch.tag)?;
    let mut cur = ch.cursor();
    let hash_name = cur.read_pstring_utf8()?;
    let hash_length = cur.read_le_u64()?;
    let hash_count = cur.read_le_u64()?;
    ch.check_consumed(&cur)?;

    if kind != HashKind::Other && hash_length != kind.width() as u64 {
        return Err(Error::ChunkLengthMismatch {
            tag: printable_tag(ch.tag),
            expected: kind.width() as u64,
            found: hash_length,
        });
    }

    Ok(ColumnHeader {
        kind,
        hash_name,
        hash_length,
        hash_count,
    })
}

pub fn parse_hint(ch: &Chunk<'_>) -> Result<HintData> {
    let mut cur = ch.cursor();
    let type_word = cur.read_be_u16()?;

    let hint = match type_word {
        HINT_TYPE_RADIUS => HintData::Radius(cur.read_le_u32()?),
        HINT_TYPE_RANGE => HintData::Range {
            left: cur.read_le_i64()?,
            right: cur.read_le_i64()?,
        },
        _ if (type_word >> 8) as u8 == HINT_TYPE_BLOCK_TAG => {
            let bits = (type_word & 0xFF) as u8;
            if bits == 0 || bits > 8 {
                return Err(Error::UnknownChunk(format!("hint type {type_word:#06x}")));
            }
            let n = 1usize << bits;
            let mut bounds = Vec::with_capacity(n);
            for _ in 0..n {
                let l = cur.read_le_i64()?;
                let r = cur.read_le_i64()?;
                bounds.push((l, r));
            }
            HintData::Block { bits, bounds }
        }
        _ => return Err(Error::UnknownChunk(format!("hint type {type_word:#06x}"))),
    };

    ch.check_consumed(&cur)?;
    Ok(hint)
}

pub fn parse_fltr(ch: &Chunk<'_>) -> Result<Filter> {
    let mut cur = ch.cursor();
    let filter_type = cur.read_le_u16()?;
    let data = cur.read_bytes(cur.remaining())?.to_vec();
    Ok(Filter { filter_type, data })
}

pub fn parse_rhdr(ch: &Chunk<'_>) -> Result<RecordHeader> {
    let mut cur = ch.cursor();
    let record_length = cur.read_le_u64()?;
    let record_count = cur.read_le_u64()?;

    let mut fields = Vec::new();
    while !cur.is_empty() {
        let kind = HashKind::from_exponent(cur.read_le_u16()?)?;
        let name = cur.read_pstring_utf8()?;
        let width = cur.read_le_u64()?;

        if kind != HashKind::Other && width != kind.width() as u64 {
            return Err(Error::ChunkLengthMismatch {
                tag: printable_tag(ch.tag),
                expected: kind.width() as u64,
                found: width,
            });
        }

        fields.push(FieldDescriptor { kind, name, width });
    }

    let expected: u64 = fields.iter().map(FieldDescriptor::stored_width).sum();
    if record_length != expected {
        return Err(Error::ChunkLengthMismatch {
            tag: printable_tag(ch.tag),
            expected,
            found: record_length,
        });
    }

    Ok(RecordHeader {
        record_length,
        record_count,
        fields,
    })
}

pub fn parse_ftoc(ch: &Chunk<'_>) -> Result<TableOfContents> {
    let mut cur = ch.cursor();
    let mut toc = TableOfContents::default();
    while !cur.is_empty() {
        let offset = cur.read_le_u64()?;
        let tag: Tag = cur.read_bytes(4)?.try_into().expect("4-byte slice");
        toc.entries.push((offset, tag));
    }
    Ok(toc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::encode::{
        fhdr_data, hhnn_data, hint_data, rhdr_data, write_chunk_bytes,
    };
    use crate::format::{column_tag, FHDR, RHDR};
    use std::io::Cursor as IoCursor;

    fn framed(tag: Tag, payload: &[u8]) -> Vec<u8> {
        let mut out = IoCursor::new(Vec::new());
        write_chunk_bytes(&mut out, tag, payload).unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_chunk_envelope() {
        let bytes = framed(FHDR, b"xyz");
        let ch = decode_chunk(&bytes, 0).unwrap();
        assert_eq!(ch.tag, FHDR);
        assert_eq!(ch.offset, 0);
        assert_eq!(ch.payload_offset, 12);
        assert_eq!(ch.payload, b"xyz");
    }

    #[test]
    fn decode_chunk_truncated_payload() {
        let mut bytes = framed(FHDR, b"xyz");
        bytes.truncate(13); // length says 3, only 1 byte present
        assert!(matches!(
            decode_chunk(&bytes, 0).unwrap_err(),
            Error::OutOfData { .. }
        ));
    }

    #[test]
    fn fhdr_round_trip() {
        let mut payload = Vec::new();
        fhdr_data(&mut payload, 2, "tiny", "2026-08-01T00:00:00Z", "desc").unwrap();
        let bytes = framed(FHDR, &payload);
        let fhdr = parse_fhdr(&decode_chunk(&bytes, 0).unwrap()).unwrap();
        assert_eq!(fhdr.version, 2);
        assert_eq!(fhdr.name, "tiny");
        assert_eq!(fhdr.timestamp, "2026-08-01T00:00:00Z");
        assert_eq!(fhdr.desc, "desc");
    }

    #[test]
    fn fhdr_trailing_garbage_is_length_mismatch() {
        let mut payload = Vec::new();
        fhdr_data(&mut payload, 2, "a", "b", "c").unwrap();
        payload.push(0xFF);
        let bytes = framed(FHDR, &payload);
        assert!(matches!(
            parse_fhdr(&decode_chunk(&bytes, 0).unwrap()).unwrap_err(),
            Error::ChunkLengthMismatch { .. }
        ));
    }

    #[test]
    fn hhdr_round_trip() {
        let mut payload = Vec::new();
        hhnn_data(&mut payload, "sha1", 20, 12345).unwrap();
        let bytes = framed(column_tag(HashKind::Sha1), &payload);
        let hdr = parse_hhdr(&decode_chunk(&bytes, 0).unwrap()).unwrap();
        assert_eq!(hdr.kind, HashKind::Sha1);
        assert_eq!(hdr.hash_name, "sha1");
        assert_eq!(hdr.hash_length, 20);
        assert_eq!(hdr.hash_count, 12345);
    }

    #[test]
    fn hhdr_wrong_width_rejected() {
        let mut payload = Vec::new();
        hhnn_data(&mut payload, "sha1", 21, 1).unwrap();
        let bytes = framed(column_tag(HashKind::Sha1), &payload);
        assert!(parse_hhdr(&decode_chunk(&bytes, 0).unwrap()).is_err());
    }

    #[test]
    fn hint_round_trip_all_strategies() {
        for hint in [
            HintData::Radius(17),
            HintData::Range { left: -5, right: 9 },
            HintData::Block {
                bits: 2,
                bounds: vec![(-1, 1), (0, 0), (i64::MAX, i64::MIN), (-3, 7)],
            },
        ] {
            let mut payload = Vec::new();
            hint_data(&mut payload, &hint);
            let bytes = framed(crate::format::HINT, &payload);
            let parsed = parse_hint(&decode_chunk(&bytes, 0).unwrap()).unwrap();
            assert_eq!(parsed, hint);
        }
    }

    #[test]
    fn hint_unknown_type_rejected() {
        let payload = [0x7A, 0x01, 0, 0, 0, 0]; // 'z' is not a hint tag
        let bytes = framed(crate::format::HINT, &payload);
        assert!(matches!(
            parse_hint(&decode_chunk(&bytes, 0).unwrap()).unwrap_err(),
            Error::UnknownChunk(_)
        ));
    }

    #[test]
    fn hint_block_zero_bits_rejected() {
        let payload = [0x62, 0x00];
        let bytes = framed(crate::format::HINT, &payload);
        assert!(parse_hint(&decode_chunk(&bytes, 0).unwrap()).is_err());
    }

    #[test]
    fn rhdr_round_trip() {
        let fields = vec![
            FieldDescriptor::for_kind(HashKind::Md5),
            FieldDescriptor::for_kind(HashKind::Size),
        ];
        let mut payload = Vec::new();
        rhdr_data(&mut payload, &fields, 7).unwrap();
        let bytes = framed(RHDR, &payload);
        let rhdr = parse_rhdr(&decode_chunk(&bytes, 0).unwrap()).unwrap();
        assert_eq!(rhdr.record_count, 7);
        assert_eq!(rhdr.record_length, 17 + 9);
        assert_eq!(rhdr.fields, fields);
    }

    #[test]
    fn ftoc_round_trip() {
        let toc = TableOfContents {
            entries: vec![(8, FHDR), (4096, crate::format::HDAT)],
        };
        let mut payload = Vec::new();
        crate::format::encode::ftoc_data(&mut payload, &toc);
        let bytes = framed(crate::format::FTOC, &payload);
        let parsed = parse_ftoc(&decode_chunk(&bytes, 0).unwrap()).unwrap();
        assert_eq!(parsed, toc);
    }

    #[test]
    fn fltr_is_opaque() {
        let payload = [0x01, 0x00, 0xAA, 0xBB, 0xCC];
        let bytes = framed(crate::format::FLTR, &payload);
        let f = parse_fltr(&decode_chunk(&bytes, 0).unwrap()).unwrap();
        assert_eq!(f.filter_type, 1);
        assert_eq!(f.data, [0xAA, 0xBB, 0xCC]);
    }
}
