//! Chunk serialisation.
//!
//! Each chunk kind has a `length_*` function giving the exact payload size
//! for given logical inputs, and a payload builder. [`write_chunk`] frames
//! a payload: it writes the tag, reserves the eight length bytes, runs the
//! payload writer, then seeks back and patches the length with the byte
//! count actually produced. Size prediction uses the `length_*` functions;
//! the length field on disk always reflects observed bytes.

use std::io::{Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::format::{
    FieldDescriptor, HintData, TableOfContents, Tag, CHUNK_HEADER_LEN, MAGIC,
};
use crate::rw::{put_be_u16, put_le_i64, put_le_u16, put_le_u32, put_le_u64, put_pstring};

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

/// Writes one chunk: tag, length placeholder, payload, back-patched length.
///
/// Returns the total bytes written (header plus payload). The writer is
/// left positioned at the end of the chunk.
pub fn write_chunk<W, F>(out: &mut W, tag: Tag, payload: F) -> Result<u64>
where
    W: Write + Seek,
    F: FnOnce(&mut W) -> Result<()>,
{
    out.write_all(&tag)?;
    let len_pos = out.stream_position()?;
    out.write_all(&[0u8; 8])?;

    let data_beg = out.stream_position()?;
    payload(out)?;
    let data_end = out.stream_position()?;
    let len = data_end - data_beg;

    out.seek(SeekFrom::Start(len_pos))?;
    out.write_all(&len.to_le_bytes())?;
    out.seek(SeekFrom::Start(data_end))?;

    Ok(CHUNK_HEADER_LEN as u64 + len)
}

/// Writes a chunk whose payload is already materialised.
pub fn write_chunk_bytes<W: Write + Seek>(out: &mut W, tag: Tag, data: &[u8]) -> Result<u64> {
    write_chunk(out, tag, |w| {
        w.write_all(data)?;
        Ok(())
    })
}

pub fn write_magic<W: Write>(out: &mut W) -> Result<u64> {
    out.write_all(MAGIC)?;
    Ok(MAGIC.len() as u64)
}

/// Writes `pad` zero bytes; used to bring the next chunk's tag to a
/// 4096-byte boundary.
pub fn write_padding<W: Write>(out: &mut W, pad: u64) -> Result<u64> {
    const ZEROS: [u8; 4096] = [0u8; 4096];
    let mut left = pad;
    while left > 0 {
        let n = left.min(ZEROS.len() as u64) as usize;
        out.write_all(&ZEROS[..n])?;
        left -= n as u64;
    }
    Ok(pad)
}

/// The final 12 bytes of the file: the FTOC offset and the literal `FTOC`.
pub fn write_trailer<W: Write>(out: &mut W, ftoc_offset: u64) -> Result<u64> {
    out.write_all(&ftoc_offset.to_le_bytes())?;
    out.write_all(b"FTOC")?;
    Ok(12)
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload lengths
// ─────────────────────────────────────────────────────────────────────────────

pub fn length_chunk(data_len: u64) -> u64 {
    CHUNK_HEADER_LEN as u64 + data_len
}

pub fn length_fhdr_data(name: &str, timestamp: &str, desc: &str) -> u64 {
    8 + (2 + name.len() as u64) + (2 + timestamp.len() as u64) + (2 + desc.len() as u64)
}

pub fn length_hhnn_data(hash_name: &str) -> u64 {
    (2 + hash_name.len() as u64) + 8 + 8
}

pub fn length_hint_data(hint: &HintData) -> u64 {
    2 + match hint {
        HintData::Radius(_) => 4,
        HintData::Range { .. } => 16,
        HintData::Block { bounds, .. } => 16 * bounds.len() as u64,
    }
}

pub fn length_hdat_data(hash_count: u64, hash_length: u64) -> u64 {
    hash_count * hash_length
}

pub fn length_ridx_data(hash_count: u64) -> u64 {
    hash_count * 8
}

pub fn length_rhdr_data(fields: &[FieldDescriptor]) -> u64 {
    8 + 8
        + fields
            .iter()
            .map(|f| 2 + (2 + f.name.len() as u64) + 8)
            .sum::<u64>()
}

pub fn length_rdat_data(fields: &[FieldDescriptor], record_count: u64) -> u64 {
    record_count
        * fields
            .iter()
            .map(FieldDescriptor::stored_width)
            .sum::<u64>()
}

pub fn length_ftoc_data(chunk_count: u64) -> u64 {
    chunk_count * (8 + 4)
}

pub fn length_fend_data() -> u64 {
    0
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload builders
// ─────────────────────────────────────────────────────────────────────────────

pub fn fhdr_data(
    out: &mut Vec<u8>,
    version: u64,
    name: &str,
    timestamp: &str,
    desc: &str,
) -> Result<()> {
    put_le_u64(out, version);
    put_pstring(out, name)?;
    put_pstring(out, timestamp)?;
    put_pstring(out, desc)?;
    Ok(())
}

pub fn hhnn_data(
    out: &mut Vec<u8>,
    hash_name: &str,
    hash_length: u64,
    hash_count: u64,
) -> Result<()> {
    put_pstring(out, hash_name)?;
    put_le_u64(out, hash_length);
    put_le_u64(out, hash_count);
    Ok(())
}

/// The hint type word is big-endian; the window payload is little-endian.
pub fn hint_data(out: &mut Vec<u8>, hint: &HintData) {
    put_be_u16(out, hint.type_word());
    match hint {
        HintData::Radius(r) => put_le_u32(out, *r),
        HintData::Range { left, right } => {
            put_le_i64(out, *left);
            put_le_i64(out, *right);
        }
        HintData::Block { bounds, .. } => {
            for (l, r) in bounds {
                put_le_i64(out, *l);
                put_le_i64(out, *r);
            }
        }
    }
}

pub fn rhdr_data(out: &mut Vec<u8>, fields: &[FieldDescriptor], record_count: u64) -> Result<()> {
    let record_length: u64 = fields.iter().map(FieldDescriptor::stored_width).sum();
    put_le_u64(out, record_length);
    put_le_u64(out, record_count);
    for f in fields {
        put_le_u16(out, f.kind.exponent());
        put_pstring(out, &f.name)?;
        put_le_u64(out, f.width);
    }
    Ok(())
}

/// Appends one row: per field, a presence byte then the value bytes.
/// An absent field contributes a zero presence byte and `width` zeros.
pub fn record_row(
    out: &mut Vec<u8>,
    fields: &[FieldDescriptor],
    values: &[Option<&[u8]>],
) -> Result<()> {
    debug_assert_eq!(fields.len(), values.len());
    for (f, v) in fields.iter().zip(values) {
        match v {
            Some(bytes) => {
                if bytes.len() as u64 != f.width {
                    return Err(Error::BadRecord {
                        line: 0,
                        msg: format!(
                            "{} field is {} bytes, expected {}",
                            f.name,
                            bytes.len(),
                            f.width
                        ),
                    });
                }
                out.push(1);
                out.extend_from_slice(bytes);
            }
            None => {
                out.extend(std::iter::repeat(0u8).take(1 + f.width as usize));
            }
        }
    }
    Ok(())
}

pub fn ftoc_data(out: &mut Vec<u8>, toc: &TableOfContents) {
    for (offset, tag) in &toc.entries {
        put_le_u64(out, *offset);
        out.extend_from_slice(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{alignment_padding, column_tag, FHDR};
    use crate::hash::HashKind;
    use std::io::Cursor;

    #[test]
    fn chunk_framing_and_backpatch() {
        let mut out = Cursor::new(Vec::new());
        let n = write_chunk(&mut out, FHDR, |w| {
            w.write_all(b"abcde")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 12 + 5);

        let bytes = out.into_inner();
        assert_eq!(&bytes[0..4], b"FHDR");
        assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 5);
        assert_eq!(&bytes[12..], b"abcde");
    }

    #[test]
    fn chunk_length_is_observed_not_predicted() {
        // a payload writer that emits a different count than any prediction
        let mut out = Cursor::new(Vec::new());
        write_chunk(&mut out, *b"XXXX", |w| {
            w.write_all(&[0u8; 37])?;
            Ok(())
        })
        .unwrap();
        let bytes = out.into_inner();
        assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 37);
    }

    #[test]
    fn fhdr_length_matches_bytes() {
        let mut buf = Vec::new();
        fhdr_data(&mut buf, 2, "tiny", "2026-08-01T00:00:00Z", "a test set").unwrap();
        assert_eq!(
            buf.len() as u64,
            length_fhdr_data("tiny", "2026-08-01T00:00:00Z", "a test set")
        );
        // version is the first LE u64
        assert_eq!(u64::from_le_bytes(buf[..8].try_into().unwrap()), 2);
    }

    #[test]
    fn hhnn_length_matches_bytes() {
        let mut buf = Vec::new();
        hhnn_data(&mut buf, "md5", 16, 1000).unwrap();
        assert_eq!(buf.len() as u64, length_hhnn_data("md5"));
    }

    #[test]
    fn hint_payloads() {
        let mut buf = Vec::new();
        hint_data(&mut buf, &HintData::Radius(7));
        assert_eq!(buf, [0x00, 0x01, 7, 0, 0, 0]);
        assert_eq!(buf.len() as u64, length_hint_data(&HintData::Radius(7)));

        let mut buf = Vec::new();
        let block = HintData::Block {
            bits: 8,
            bounds: vec![(-1, 2); 256],
        };
        hint_data(&mut buf, &block);
        assert_eq!(&buf[..2], &[0x62, 0x08]);
        assert_eq!(buf.len() as u64, length_hint_data(&block));
        assert_eq!(buf.len(), 2 + 256 * 16);
    }

    #[test]
    fn rhdr_length_matches_bytes() {
        let fields = vec![
            FieldDescriptor::for_kind(HashKind::Md5),
            FieldDescriptor::for_kind(HashKind::Size),
        ];
        let mut buf = Vec::new();
        rhdr_data(&mut buf, &fields, 42).unwrap();
        assert_eq!(buf.len() as u64, length_rhdr_data(&fields));
        // record_length = (1+16) + (1+8)
        assert_eq!(u64::from_le_bytes(buf[..8].try_into().unwrap()), 26);
        assert_eq!(u64::from_le_bytes(buf[8..16].try_into().unwrap()), 42);
    }

    #[test]
    fn record_row_present_and_absent() {
        let fields = vec![
            FieldDescriptor::for_kind(HashKind::Size),
            FieldDescriptor::for_kind(HashKind::Md5),
        ];
        let size = 123u64.to_le_bytes();
        let mut buf = Vec::new();
        record_row(&mut buf, &fields, &[Some(&size), None]).unwrap();

        assert_eq!(buf.len() as u64, length_rdat_data(&fields, 1));
        assert_eq!(buf[0], 1);
        assert_eq!(&buf[1..9], &size);
        // absent MD5: presence 0 plus 16 zero bytes
        assert!(buf[9..].iter().all(|&b| b == 0));
        assert_eq!(buf[9..].len(), 17);
    }

    #[test]
    fn record_row_rejects_wrong_width() {
        let fields = vec![FieldDescriptor::for_kind(HashKind::Md5)];
        let mut buf = Vec::new();
        let short = [0u8; 15];
        assert!(record_row(&mut buf, &fields, &[Some(&short)]).is_err());
    }

    #[test]
    fn ftoc_entries_round_layout() {
        let toc = TableOfContents {
            entries: vec![(8, FHDR), (40, column_tag(HashKind::Sha1))],
        };
        let mut buf = Vec::new();
        ftoc_data(&mut buf, &toc);
        assert_eq!(buf.len() as u64, length_ftoc_data(2));
        assert_eq!(u64::from_le_bytes(buf[..8].try_into().unwrap()), 8);
        assert_eq!(&buf[8..12], b"FHDR");
        assert_eq!(&buf[20..24], &[b'H', b'H', 0x00, 0x01]);
    }

    #[test]
    fn trailer_layout() {
        let mut out = Vec::new();
        write_trailer(&mut out, 0x1234).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(u64::from_le_bytes(out[..8].try_into().unwrap()), 0x1234);
        assert_eq!(&out[8..], b"FTOC");
    }

    #[test]
    fn padding_writes_zeros() {
        let mut out = Vec::new();
        write_padding(&mut out, alignment_padding(8 + 17, 4096)).unwrap();
        assert_eq!(out.len(), 4096 - 25);
        assert!(out.iter().all(|&b| b == 0));
    }
}
