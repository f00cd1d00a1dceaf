//! Bounded byte-cursor reads and writes.
//!
//! Every scalar that crosses the container boundary goes through this
//! module, so endianness and bounds checking live in exactly one place.
//! Reads borrow from the underlying buffer; strings come back as slices
//! with no copy.

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Read cursor
// ─────────────────────────────────────────────────────────────────────────────

/// A read position within a byte buffer.
///
/// All reads advance the position; a read that would cross the end fails
/// with [`Error::OutOfData`] carrying the current offset.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    /// A cursor over `buf` starting at `pos`; fails if `pos` is past the end.
    pub fn at(buf: &'a [u8], pos: usize) -> Result<Cursor<'a>> {
        if pos > buf.len() {
            return Err(Error::OutOfData { at: pos, want: 0 });
        }
        Ok(Cursor { buf, pos })
    }

    /// Current offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::OutOfData {
                at: self.pos,
                want: len,
            });
        }
        let s = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let s = self.read_bytes(N)?;
        let mut a = [0u8; N];
        a.copy_from_slice(s);
        Ok(a)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_le_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_le_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_le_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_le_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_be_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_be_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_be_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Reads a `u16 LE` length prefix, then borrows that many bytes.
    pub fn read_pstring(&mut self) -> Result<&'a [u8]> {
        let len = self.read_le_u16()? as usize;
        self.read_bytes(len)
    }

    /// Like [`Cursor::read_pstring`] but validates UTF-8 and copies.
    pub fn read_pstring_utf8(&mut self) -> Result<String> {
        let at = self.pos;
        let s = self.read_pstring()?;
        String::from_utf8(s.to_vec()).map_err(|_| Error::BadRecord {
            line: 0,
            msg: format!("non-utf8 string at offset {at}"),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Growable sink
// ─────────────────────────────────────────────────────────────────────────────

/// Write helpers over `Vec<u8>`. Infallible; the vector grows as needed.
pub fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn put_le_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_le_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_le_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_le_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_be_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_bytes(out: &mut Vec<u8>, v: &[u8]) {
    out.extend_from_slice(v);
}

/// A `u16 LE` length prefix followed by the bytes. The length must fit in
/// sixteen bits; longer strings are a caller bug surfaced as `OutOfSpace`.
pub fn put_pstring(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| Error::OutOfSpace {
        at: out.len(),
        want: s.len(),
    })?;
    put_le_u16(out, len);
    put_bytes(out, s.as_bytes());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed write cursor
// ─────────────────────────────────────────────────────────────────────────────

/// A write position within a fixed-size buffer; fails with
/// [`Error::OutOfSpace`] instead of growing.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> WriteCursor<'a> {
        WriteCursor { buf, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        if v.len() > self.buf.len() - self.pos {
            return Err(Error::OutOfSpace {
                at: self.pos,
                want: v.len(),
            });
        }
        self.buf[self.pos..self.pos + v.len()].copy_from_slice(v);
        self.pos += v.len();
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_le_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── scalar round-trips ───────────────────────────────────────────────────

    #[test]
    fn le_round_trip() {
        let mut out = Vec::new();
        put_le_u16(&mut out, 0xBEEF);
        put_le_u32(&mut out, 0xDEAD_BEEF);
        put_le_u64(&mut out, 0x0102_0304_0506_0708);
        put_le_i64(&mut out, -42);

        let mut cur = Cursor::new(&out);
        assert_eq!(cur.read_le_u16().unwrap(), 0xBEEF);
        assert_eq!(cur.read_le_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cur.read_le_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(cur.read_le_i64().unwrap(), -42);
        assert!(cur.is_empty());
    }

    #[test]
    fn be_round_trip() {
        let mut out = Vec::new();
        put_be_u16(&mut out, 0x6208);
        assert_eq!(out, [0x62, 0x08]);
        let mut cur = Cursor::new(&out);
        assert_eq!(cur.read_be_u16().unwrap(), 0x6208);
    }

    #[test]
    fn le_byte_layout() {
        let mut out = Vec::new();
        put_le_u32(&mut out, 0xDEAD_BEEF);
        assert_eq!(out, [0xEF, 0xBE, 0xAD, 0xDE]);
    }

    // ── bounds ───────────────────────────────────────────────────────────────

    #[test]
    fn read_past_end_is_out_of_data() {
        let mut cur = Cursor::new(&[0u8; 3]);
        cur.read_le_u16().unwrap();
        let err = cur.read_le_u16().unwrap_err();
        assert!(matches!(err, Error::OutOfData { at: 2, want: 2 }));
    }

    #[test]
    fn cursor_at_rejects_out_of_range_start() {
        assert!(Cursor::at(&[0u8; 4], 5).is_err());
        assert!(Cursor::at(&[0u8; 4], 4).is_ok());
    }

    #[test]
    fn write_cursor_out_of_space() {
        let mut buf = [0u8; 4];
        let mut w = WriteCursor::new(&mut buf);
        w.write_bytes(&[1, 2, 3]).unwrap();
        let err = w.write_bytes(&[4, 5]).unwrap_err();
        assert!(matches!(err, Error::OutOfSpace { at: 3, want: 2 }));
    }

    // ── pstrings ─────────────────────────────────────────────────────────────

    #[test]
    fn pstring_round_trip() {
        let mut out = Vec::new();
        put_pstring(&mut out, "NSRL").unwrap();
        assert_eq!(out, [4, 0, b'N', b'S', b'R', b'L']);

        let mut cur = Cursor::new(&out);
        assert_eq!(cur.read_pstring().unwrap(), b"NSRL");
    }

    #[test]
    fn pstring_empty() {
        let mut out = Vec::new();
        put_pstring(&mut out, "").unwrap();
        let mut cur = Cursor::new(&out);
        assert_eq!(cur.read_pstring().unwrap(), b"");
    }

    #[test]
    fn pstring_truncated_payload_is_out_of_data() {
        // prefix says 10 bytes, only 2 present
        let buf = [10, 0, b'a', b'b'];
        let mut cur = Cursor::new(&buf);
        assert!(matches!(
            cur.read_pstring().unwrap_err(),
            Error::OutOfData { at: 2, want: 10 }
        ));
    }
}
