//! Error type shared by the codec, parser, lookup construction, and builders.
//!
//! Parse-time variants carry the byte offset at which the violation was
//! detected so a truncated or corrupt file can be reported precisely.
//! Build-time I/O failures wrap [`std::io::Error`]; on any error path the
//! builders unlink their partially-written output before returning.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A bounded read would have crossed the end of the input.
    #[error("out of data reading {want} bytes at offset {at}")]
    OutOfData { at: usize, want: usize },

    /// A bounded write would have crossed the end of the output cursor.
    #[error("out of space writing {want} bytes at offset {at}")]
    OutOfSpace { at: usize, want: usize },

    /// The file does not start with the 8-byte `"SetOHash"` marker.
    #[error("bad magic")]
    BadMagic,

    /// The FHDR chunk names a format version this implementation cannot read.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u64),

    /// A chunk tag, hash kind, or hint type outside the recognised set.
    #[error("unknown chunk: {0}")]
    UnknownChunk(String),

    /// A recognised chunk appeared where the chunk-order grammar forbids it.
    #[error("unexpected chunk {tag} at offset {at}")]
    UnexpectedChunk { tag: String, at: usize },

    /// A chunk's observed payload length disagrees with the length its
    /// header metadata implies (e.g. `HDAT` vs. `count * width`).
    #[error("expected {expected} bytes in {tag}, found {found}")]
    ChunkLengthMismatch {
        tag: String,
        expected: u64,
        found: u64,
    },

    /// Two hash sets with differing field descriptors were composed.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A record failed validation (bad hex, bad size integer, wrong width).
    #[error("bad record at line {line}: {msg}")]
    BadRecord { line: u64, msg: String },

    /// The caller's cancellation flag was observed set between records.
    #[error("build cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unexpected_chunk(tag: [u8; 4], at: usize) -> Error {
        Error::UnexpectedChunk {
            tag: printable_tag(tag),
            at,
        }
    }
}

/// Renders a 4-byte chunk tag for error messages. Column tags print as
/// `HH` plus the hex exponent; anything else prints as ASCII with
/// non-printable bytes escaped.
pub(crate) fn printable_tag(tag: [u8; 4]) -> String {
    if tag[0] == b'H' && tag[1] == b'H' {
        format!("HH {:02x}{:02x}", tag[2], tag[3])
    } else {
        tag.iter()
            .map(|&b| {
                if b.is_ascii_graphic() {
                    (b as char).to_string()
                } else {
                    format!("\\x{b:02x}")
                }
            })
            .collect()
    }
}
