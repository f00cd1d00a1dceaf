//! Whole-file parsing, driven by the trailing table of contents.
//!
//! The decoder never scans: the file's last 12 bytes locate the `FTOC`,
//! whose entries are visited in order and fed through a state machine
//! enforcing the chunk grammar:
//!
//! ```text
//!   Init  --FHDR-->  Sbrk
//!   Sbrk  --HHnn-->  Hhdr     Sbrk  --RHDR-->  Rhdr     Sbrk --FEND--> Done
//!   Hhdr  --HINT-->  Hint     Hhdr  --FLTR-->  Fltr     Hhdr --HDAT--> Hdat
//!   Hint  --FLTR-->  Fltr     Hint  --HDAT-->  Hdat
//!   Fltr  --HDAT-->  Hdat
//!   Hdat  --RIDX-->  Sbrk     Hdat  (else, unconsumed)--> Sbrk
//!   Rhdr  --RDAT-->  Sbrk
//! ```
//!
//! Unknown tags are skipped only in the `Sbrk` state; anywhere else they
//! are grammar violations. The result is a [`Holder`]: plain data with
//! byte ranges into the underlying buffer instead of back-pointers, so a
//! reader can wrap it around an owned or memory-mapped image alike.

use std::ops::Range;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::format::decode::{
    decode_chunk, parse_fhdr, parse_fltr, parse_ftoc, parse_hhdr, parse_hint, parse_rhdr, Chunk,
};
use crate::format::{
    check_magic, is_column_tag, ColumnHeader, FileHeader, Filter, HintData, RecordHeader,
    FEND, FHDR, FLTR, FORMAT_VERSION, FTOC, HDAT, HDAT_ALIGN, HINT, MAGIC, RDAT, RHDR, RIDX,
    TRAILER_LEN,
};
use crate::lookup::LookupStrategy;

/// One fully parsed hash column: header, optional lookup-assist data, the
/// byte range of its sorted hashes, and the optional record-index range.
#[derive(Debug, Clone)]
pub struct ColumnData {
    pub header: ColumnHeader,
    pub hint: Option<HintData>,
    pub filter: Option<Filter>,
    pub strategy: LookupStrategy,
    /// `HDAT` payload range within the file image.
    pub hdat: Range<usize>,
    /// `RIDX` payload range within the file image, when records exist.
    pub ridx: Option<Range<usize>>,
}

/// Everything a parsed file contains, as plain data. Ranges index the
/// buffer that was parsed; the holder has no pointer back to it.
#[derive(Debug, Clone)]
pub struct Holder {
    pub fhdr: FileHeader,
    pub columns: Vec<ColumnData>,
    pub rhdr: Option<RecordHeader>,
    /// `RDAT` payload range within the file image.
    pub rdat: Option<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Sbrk,
    Hhdr,
    Hint,
    Fltr,
    Hdat,
    Rhdr,
    Done,
}

/// A column being assembled as its chunks arrive.
struct PendingColumn {
    header: ColumnHeader,
    hint: Option<HintData>,
    filter: Option<Filter>,
    hdat: Option<Range<usize>>,
}

impl PendingColumn {
    fn finish(self) -> ColumnData {
        let strategy = LookupStrategy::from_hint(self.hint.as_ref());
        ColumnData {
            header: self.header,
            hint: self.hint,
            filter: self.filter,
            strategy,
            hdat: self.hdat.expect("column closed before HDAT"),
            ridx: None,
        }
    }
}

/// Parses a complete hset image.
pub fn parse(buf: &[u8]) -> Result<Holder> {
    check_magic(buf)?;

    if buf.len() < MAGIC.len() + TRAILER_LEN {
        return Err(Error::OutOfData {
            at: buf.len(),
            want: TRAILER_LEN,
        });
    }

    // Trailer: [u64 LE ftoc_offset]["FTOC"], the last 12 bytes.
    let trailer_at = buf.len() - TRAILER_LEN;
    let ftoc_offset = u64::from_le_bytes(buf[trailer_at..trailer_at + 8].try_into().unwrap());
    let trailer_tag: [u8; 4] = buf[trailer_at + 8..].try_into().unwrap();
    if trailer_tag != FTOC {
        return Err(Error::unexpected_chunk(trailer_tag, trailer_at + 8));
    }

    let ftoc_offset = usize::try_from(ftoc_offset).map_err(|_| Error::OutOfData {
        at: trailer_at,
        want: usize::MAX,
    })?;
    let ftoc_chunk = decode_chunk(buf, ftoc_offset)?;
    if ftoc_chunk.tag != FTOC {
        return Err(Error::unexpected_chunk(ftoc_chunk.tag, ftoc_offset));
    }
    let toc = parse_ftoc(&ftoc_chunk)?;
    debug!(entries = toc.entries.len(), ftoc_offset, "parsed table of contents");

    // The FEND chunk is not listed in the FTOC; it sits directly after it.
    let fend_offset = ftoc_offset + 12 + ftoc_chunk.payload.len();
    let fend = decode_chunk(buf, fend_offset)?;
    if fend.tag != FEND {
        return Err(Error::unexpected_chunk(fend.tag, fend_offset));
    }
    fend.check_length(0)?;

    let mut holder = Holder {
        fhdr: FileHeader {
            version: 0,
            name: String::new(),
            timestamp: String::new(),
            desc: String::new(),
        },
        columns: Vec::new(),
        rhdr: None,
        rdat: None,
    };

    let mut state = State::Init;
    let mut pending: Option<PendingColumn> = None;
    let mut i = 0usize;

    while state != State::Done {
        // Exhausting the FTOC puts us at the end marker, legal only at a
        // section break.
        let ch = if i < toc.entries.len() {
            let (offset, tag) = toc.entries[i];
            let offset = usize::try_from(offset).map_err(|_| Error::OutOfData {
                at: buf.len(),
                want: usize::MAX,
            })?;
            let ch = decode_chunk(buf, offset)?;
            if ch.tag != tag {
                return Err(Error::unexpected_chunk(ch.tag, offset));
            }
            ch
        } else {
            fend
        };
        trace!(tag = %crate::error::printable_tag(ch.tag), offset = ch.offset, ?state, "chunk");

        match state {
            State::Init => {
                if ch.tag == FHDR {
                    let fhdr = parse_fhdr(&ch)?;
                    if fhdr.version != FORMAT_VERSION {
                        return Err(Error::UnsupportedVersion(fhdr.version));
                    }
                    holder.fhdr = fhdr;
                    state = State::Sbrk;
                    i += 1;
                } else {
                    return Err(Error::unexpected_chunk(ch.tag, ch.offset));
                }
            }

            State::Sbrk => {
                if is_column_tag(ch.tag) {
                    pending = Some(PendingColumn {
                        header: parse_hhdr(&ch)?,
                        hint: None,
                        filter: None,
                        hdat: None,
                    });
                    state = State::Hhdr;
                    i += 1;
                } else if ch.tag == RHDR {
                    if holder.rhdr.is_some() {
                        return Err(Error::unexpected_chunk(ch.tag, ch.offset));
                    }
                    holder.rhdr = Some(parse_rhdr(&ch)?);
                    state = State::Rhdr;
                    i += 1;
                } else if ch.tag == FEND {
                    state = State::Done;
                } else if matches!(ch.tag, HINT | FLTR | HDAT | RIDX | RDAT | FHDR | FTOC) {
                    return Err(Error::unexpected_chunk(ch.tag, ch.offset));
                } else {
                    // Unrecognised chunks are tolerated between sections.
                    debug!(offset = ch.offset, "skipping unrecognised chunk");
                    i += 1;
                }
            }

            State::Hhdr | State::Hint | State::Fltr => {
                let col = pending.as_mut().expect("column states have a pending column");
                match ch.tag {
                    HINT if state == State::Hhdr => {
                        col.hint = Some(parse_hint(&ch)?);
                        state = State::Hint;
                        i += 1;
                    }
                    FLTR if state != State::Fltr => {
                        col.filter = Some(parse_fltr(&ch)?);
                        state = State::Fltr;
                        i += 1;
                    }
                    HDAT => {
                        handle_hdat(&ch, col)?;
                        state = State::Hdat;
                        i += 1;
                    }
                    _ => return Err(Error::unexpected_chunk(ch.tag, ch.offset)),
                }
            }

            State::Hdat => {
                if ch.tag == RIDX {
                    let col = pending.take().expect("Hdat state has a pending column");
                    let mut col = col.finish();
                    ch.check_length(col.header.hash_count.saturating_mul(8))?;
                    col.ridx = Some(ch.payload_offset..ch.payload_offset + ch.payload.len());
                    holder.columns.push(col);
                    i += 1;
                } else {
                    // Anything else closes the column; reprocess the chunk
                    // at the section break.
                    let col = pending.take().expect("Hdat state has a pending column");
                    holder.columns.push(col.finish());
                }
                state = State::Sbrk;
            }

            State::Rhdr => {
                if ch.tag == RDAT {
                    let rhdr = holder.rhdr.as_ref().expect("Rhdr state has a header");
                    ch.check_length(rhdr.record_length.saturating_mul(rhdr.record_count))?;
                    holder.rdat = Some(ch.payload_offset..ch.payload_offset + ch.payload.len());
                    state = State::Sbrk;
                    i += 1;
                } else {
                    return Err(Error::unexpected_chunk(ch.tag, ch.offset));
                }
            }

            State::Done => unreachable!("loop exits on Done"),
        }
    }

    debug!(
        columns = holder.columns.len(),
        records = holder.rhdr.as_ref().map(|r| r.record_count).unwrap_or(0),
        "parsed hset"
    );
    Ok(holder)
}

fn handle_hdat(ch: &Chunk<'_>, col: &mut PendingColumn) -> Result<()> {
    // mmap-friendly: the tag must start on a page boundary
    if ch.offset as u64 % HDAT_ALIGN != 0 {
        return Err(Error::unexpected_chunk(ch.tag, ch.offset));
    }
    ch.check_length(col.header.hash_count.saturating_mul(col.header.hash_length))?;
    col.hdat = Some(ch.payload_offset..ch.payload_offset + ch.payload.len());
    Ok(())
}
