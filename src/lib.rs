//! Hash set containers for forensic triage: an on-disk format for large,
//! append-only collections of digests, fast membership lookup, and set
//! algebra across collections.
//!
//! A *hashset* file (`.hset`) holds one or more sorted hash columns —
//! MD5, SHA-1/2/3, BLAKE3, file sizes — plus optional per-object records
//! tying the columns together. Columns carry interpolation hints so a
//! membership query binary-searches a few dozen entries of a
//! hundred-million-entry corpus instead of the whole column.
//!
//! # Reading and querying
//!
//! ```no_run
//! use hset::{HashKind, Reader};
//!
//! let reader = Reader::open_path(std::path::Path::new("nsrl.hset"))?;
//! let md5 = reader.column_index(HashKind::Md5).expect("has an MD5 column");
//! let query = [0u8; 16];
//! if reader.contains(md5, &query) {
//!     for pos in reader.records_for(md5, &query) {
//!         let ridx = reader.record_index_at(md5, pos).unwrap();
//!         let record = reader.record(ridx).unwrap();
//!         println!("matched record {ridx}: {:?}", record.field(0));
//!     }
//! }
//! # Ok::<(), hset::Error>(())
//! ```
//!
//! # Building
//!
//! ```no_run
//! use hset::{HashKind, HashsetBuilder};
//! use std::path::Path;
//!
//! let mut builder = HashsetBuilder::open(
//!     "example", "three hashes",
//!     &[HashKind::Md5],
//!     Path::new("out.hset"), Path::new("/tmp"),
//!     true, true,
//! )?;
//! for hash in [[0u8; 16], [1u8; 16], [2u8; 16]] {
//!     builder.add_record(&[Some(&hash)])?;
//! }
//! builder.finalize()?;
//! # Ok::<(), hset::Error>(())
//! ```
//!
//! Files are immutable once finalised. Readers are safe to share across
//! threads; builders are single-owner.

pub mod digest;
pub mod encoder;
pub mod error;
pub mod format;
pub mod hash;
pub mod hint;
pub mod lookup;
pub mod ops;
pub mod reader;
pub mod rw;

pub use encoder::text::add_text_records;
pub use encoder::{HashsetBuilder, DEFAULT_BUCKET_BITS};
pub use error::{Error, Result};
pub use format::{FORMAT_VERSION, MAGIC};
pub use hash::HashKind;
pub use lookup::{expected_index, LookupStrategy};
pub use ops::{compose, difference_open, intersect_open, union_open, SetOp};
pub use reader::{Reader, Record};
