//! Backup stream reader

use crate::{BackupFrame, BACKUP_MAGIC, BACKUP_VERSION, MAX_FRAME_LEN};
use std::io::{ErrorKind, Read};
use typedkv_core::{Error, Result};

/// Reads key/value pairs back out of a backup stream.
///
/// Iterating yields every entry in stream order. Any damage (bad checksum,
/// oversized frame, missing end marker, entry count mismatch, data after the
/// end marker) is reported as [`Error::Corruption`] and ends the iteration.
pub struct BackupReader<R: Read> {
    inner: R,
    entries: u64,
    done: bool,
}

impl<R: Read> BackupReader<R> {
    /// Validates the stream header and returns the reader.
    pub fn new(mut inner: R) -> Result<Self> {
        let mut header = [0u8; 8];
        read_exact_or(&mut inner, &mut header, "backup header is incomplete")?;

        if header[..4] != BACKUP_MAGIC {
            return Err(Error::Corruption(
                "not a typedkv backup (bad magic)".to_string(),
            ));
        }

        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != BACKUP_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported backup version {} (expected {})",
                version, BACKUP_VERSION
            )));
        }

        Ok(Self {
            inner,
            entries: 0,
            done: false,
        })
    }

    /// Number of entries read so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    fn read_frame(&mut self) -> Result<BackupFrame> {
        let mut prefix = [0u8; 8];
        read_exact_or(
            &mut self.inner,
            &mut prefix,
            "backup stream is truncated (missing end marker)",
        )?;

        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        let expected_crc = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
        if len > MAX_FRAME_LEN {
            return Err(Error::Corruption(format!(
                "backup frame length {} exceeds limit",
                len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact_or(&mut self.inner, &mut payload, "backup frame is truncated")?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(Error::Corruption(format!(
                "backup frame checksum mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }

        bincode::deserialize(&payload).map_err(|e| Error::Corruption(e.to_string()))
    }

    /// Checks that nothing follows the end marker.
    fn expect_eof(&mut self) -> Result<()> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(Error::Corruption(
                        "trailing data after backup end marker".to_string(),
                    ))
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }
}

impl<R: Read> Iterator for BackupReader<R> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_frame() {
            Ok(BackupFrame::Entry { key, value }) => {
                self.entries += 1;
                Some(Ok((key, value)))
            }
            Ok(BackupFrame::End { entries }) => {
                self.done = true;
                if entries != self.entries {
                    return Some(Err(Error::Corruption(format!(
                        "backup end marker announces {} entries, read {}",
                        entries, self.entries
                    ))));
                }
                self.expect_eof().err().map(Err)
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::Corruption(what.to_string()),
        _ => Error::Io(err),
    })
}
