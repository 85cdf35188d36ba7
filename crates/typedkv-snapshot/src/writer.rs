//! Backup stream writer

use crate::{FrameRef, BACKUP_MAGIC, BACKUP_VERSION, MAX_FRAME_LEN};
use std::io::Write;
use typedkv_core::{Error, Result};

/// Writes key/value pairs into a backup stream.
///
/// Call [`BackupWriter::finish`] once every entry is written; a stream that
/// is never finished lacks its end marker and will be rejected on load.
pub struct BackupWriter<W: Write> {
    inner: W,
    entries: u64,
}

impl<W: Write> BackupWriter<W> {
    /// Writes the stream header and returns the writer.
    pub fn new(mut inner: W) -> Result<Self> {
        inner.write_all(&BACKUP_MAGIC)?;
        inner.write_all(&BACKUP_VERSION.to_le_bytes())?;
        Ok(Self { inner, entries: 0 })
    }

    /// Appends one entry.
    pub fn write_entry(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_frame(&FrameRef::Entry { key, value })?;
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Writes the end marker, flushes and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        let entries = self.entries;
        self.write_frame(&FrameRef::End { entries })?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_frame(&mut self, frame: &FrameRef<'_>) -> Result<()> {
        let payload = bincode::serialize(frame).map_err(|e| Error::Encoding(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                Error::Encoding(format!(
                    "backup frame of {} bytes exceeds the {} byte limit",
                    payload.len(),
                    MAX_FRAME_LEN
                ))
            })?;

        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
        self.inner.write_all(&payload)?;
        Ok(())
    }
}
