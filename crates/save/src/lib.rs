//! Durable storage for the island grid.
//!
//! `FileCellStore` keeps every cell record in one file: a fixed header
//! (magic, version, flags, record count, checksum) followed by the bitcode
//! payload, lz4-compressed once it grows past a few hundred bytes. Every
//! write replaces the file through a write-rename.

mod atomic_write;
pub mod file_header;
mod file_store;

pub use file_header::{FileHeader, HeaderError};
pub use file_store::{decode_records, encode_records, FileCellStore};
