//! ZIP archive parsing and extraction.
//!
//! - `structures`: ZIP format records (EOCD, ZIP64 records, entries)
//! - `parser`: reads the Central Directory from any [`ReadAt`](crate::io::ReadAt) source
//! - `extractor`: the streaming unpack pipeline
//! - `sanitize`: keeps entry paths inside the destination
//!
//! Supported: standard ZIP and ZIP64, STORED and DEFLATE entries.
//! Not supported: encryption, multi-disk archives, other compression methods.

mod extractor;
mod parser;
mod sanitize;
mod structures;

pub use extractor::{ExtractOptions, ZipExtractor};
pub use parser::ZipParser;
pub use sanitize::sanitize_entry_name;
pub use structures::*;
