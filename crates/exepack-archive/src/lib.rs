//! Project-archive codec: streaming ZIP extraction with zip-slip
//! rejection, and a writable archive handle with scratch buffering.
//!
//! # Architecture
//!
//! - `format.rs` - Container detection by magic bytes
//! - `sanitize.rs` - Entry path sanitization (zip-slip prevention)
//! - `options.rs` - Buffer sizes, hashing and compression settings
//! - `extract.rs` - Streaming extraction into a storage backend
//! - `writer.rs` - Archive handle lifecycle (open, add, close, store)
//! - `entry.rs` - Extraction report types

pub use entry::{ArchiveReport, Entry, EntryKind};
pub use error::{Error, Result};
pub use extract::extract;
pub use format::{ArchiveFormat, detect_format, detect_from_reader};
pub use options::{
    Compression, DEFAULT_BUFFER_SIZE, ExtractOptions, HashStrategy, WriteOptions, sha256_hex,
};
pub use sanitize::{SanitizedPath, entry_name, sanitize_entry_path};
pub use writer::{ArchiveHandle, HandleState, create_archive};

pub mod entry;
mod error;
pub mod extract;
pub mod format;
pub mod options;
pub mod sanitize;
pub mod writer;
