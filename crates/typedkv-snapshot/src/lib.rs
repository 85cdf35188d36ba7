//! # typedkv Snapshot
//!
//! Backup stream format for typedkv databases.
//!
//! **This crate is an internal implementation detail of typedkv.** Depend on
//! the main `typedkv` crate instead; this API may change without notice.
//!
//! ---
//!
//! A backup is a self-contained byte stream holding every key/value pair of
//! one consistent snapshot. It does not depend on the engine's file layout,
//! so a backup taken from one backend can be loaded into another.
//!
//! ```text
//! header : "TKVB" | version (u32 LE)
//! frame* : len (u32 LE) | crc32 (u32 LE) | bincode(BackupFrame)
//! ```
//!
//! The last frame is always [`BackupFrame::End`], carrying the number of
//! entries written; a stream without it is treated as truncated.
//!
//! ## Usage
//!
//! ```
//! use typedkv_snapshot::{BackupReader, BackupWriter};
//!
//! let mut writer = BackupWriter::new(Vec::new())?;
//! writer.write_entry(b"key", b"value")?;
//! let bytes = writer.finish()?;
//!
//! let reader = BackupReader::new(bytes.as_slice())?;
//! let entries = reader.collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(entries, vec![(b"key".to_vec(), b"value".to_vec())]);
//! # Ok::<(), typedkv_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

pub mod reader;
pub mod writer;

pub use reader::BackupReader;
pub use writer::BackupWriter;

/// Magic bytes opening every backup stream
pub const BACKUP_MAGIC: [u8; 4] = *b"TKVB";

/// Current backup format version
pub const BACKUP_VERSION: u32 = 1;

/// Upper bound on a single frame payload (64MB)
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// One record of a backup stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFrame {
    /// A stored key/value pair
    Entry {
        /// Raw engine key
        key: Vec<u8>,
        /// Raw engine value
        value: Vec<u8>,
    },
    /// Terminates the stream
    End {
        /// Number of entries that precede this frame
        entries: u64,
    },
}

/// Borrowed twin of [`BackupFrame`]; encodes to identical bytes.
#[derive(Serialize)]
enum FrameRef<'a> {
    Entry { key: &'a [u8], value: &'a [u8] },
    End { entries: u64 },
}
