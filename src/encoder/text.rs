//! Text input for the builder: one record per line, one
//! whitespace-separated column per schema field.
//!
//! Digest columns are hex; the size column is unsigned decimal; the
//! entropy column is a decimal float; the fuzzy column is the raw string,
//! null-padded to its fixed width. A bare `-` marks an absent field.
//!
//! Malformed lines fail the build with their 1-based line number. In
//! lenient mode the line is skipped instead and the error is collected
//! for return, so a mostly-good reference corpus can still be encoded.

use std::io::BufRead;

use tracing::debug;

use crate::encoder::HashsetBuilder;
use crate::error::{Error, Result};
use crate::hash::HashKind;

/// Feeds `input` to `builder` line by line. Returns the per-line errors
/// skipped in lenient mode (always empty when `lenient` is false).
pub fn add_text_records<R: BufRead>(
    builder: &mut HashsetBuilder,
    input: R,
    lenient: bool,
) -> Result<Vec<Error>> {
    let mut skipped = Vec::new();
    let mut values: Vec<Option<Vec<u8>>> = Vec::new();

    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let lineno = i as u64 + 1;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        match parse_line(builder, line, lineno, &mut values) {
            Ok(()) => {
                let refs: Vec<Option<&[u8]>> =
                    values.iter().map(|v| v.as_deref()).collect();
                builder.add_record(&refs)?;
            }
            Err(e @ Error::BadRecord { .. }) if lenient => skipped.push(e),
            Err(e) => return Err(e),
        }
    }

    if !skipped.is_empty() {
        debug!(skipped = skipped.len(), "lenient text parse skipped lines");
    }
    Ok(skipped)
}

fn parse_line(
    builder: &HashsetBuilder,
    line: &str,
    lineno: u64,
    values: &mut Vec<Option<Vec<u8>>>,
) -> Result<()> {
    let fields = builder.fields();
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() != fields.len() {
        return Err(Error::BadRecord {
            line: lineno,
            msg: format!("{} columns, schema has {}", cols.len(), fields.len()),
        });
    }

    values.clear();
    for (f, col) in fields.iter().zip(&cols) {
        if *col == "-" {
            values.push(None);
            continue;
        }
        values.push(Some(parse_field(f.kind, f.width as usize, col, lineno)?));
    }
    Ok(())
}

fn parse_field(kind: HashKind, width: usize, col: &str, lineno: u64) -> Result<Vec<u8>> {
    match kind {
        HashKind::Size => {
            let v: u64 = col.parse().map_err(|_| Error::BadRecord {
                line: lineno,
                msg: format!("bad size '{col}'"),
            })?;
            Ok(v.to_le_bytes().to_vec())
        }
        HashKind::Entropy => {
            let v: f64 = col.parse().map_err(|_| Error::BadRecord {
                line: lineno,
                msg: format!("bad entropy '{col}'"),
            })?;
            Ok(v.to_le_bytes().to_vec())
        }
        HashKind::Fuzzy => {
            if col.len() > width {
                return Err(Error::BadRecord {
                    line: lineno,
                    msg: format!("fuzzy hash longer than {width} bytes"),
                });
            }
            let mut v = col.as_bytes().to_vec();
            v.resize(width, 0);
            Ok(v)
        }
        _ => {
            let mut v = vec![0u8; width];
            if col.len() != 2 * width || hex::decode_to_slice(col, &mut v).is_err() {
                return Err(Error::BadRecord {
                    line: lineno,
                    msg: format!("bad {} hex '{col}'", kind.name()),
                });
            }
            Ok(v)
        }
    }
}
