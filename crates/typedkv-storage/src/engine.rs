//! The contract every storage backend satisfies.
//!
//! Backends only deal in raw bytes. Namespaces, typed values and the
//! per-transaction write overlay live above this layer.

use typedkv_core::Result;

/// Number of deletions grouped into one batch by the default drop helpers.
const DROP_BATCH_SIZE: usize = 1024;

/// Raw key/value pair as returned by scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Put(Vec<u8>, Vec<u8>),
    /// Remove a key; removing an absent key is a no-op
    Delete(Vec<u8>),
}

/// Group of mutations applied atomically by [`Engine::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an insert.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put(key, value));
    }

    /// Queues a removal.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete(key));
    }

    /// Number of queued mutations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates over the queued mutations in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, BatchOp> {
        self.ops.iter()
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Point-in-time, read-only view of the engine.
pub trait Snapshot {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Lazily yields every pair whose key starts with `prefix`, in ascending
    /// byte order of the key.
    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KvPair>> + 'a>;
}

/// Transactional, ordered key-value engine.
pub trait Engine: Send + Sync {
    /// Short backend name used in log output.
    fn kind(&self) -> &'static str;

    /// Takes a consistent snapshot for reading.
    fn snapshot(&self) -> Result<Box<dyn Snapshot>>;

    /// Applies every mutation in `batch` atomically.
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Removes every key starting with `prefix` and returns how many were
    /// removed. The removal is chunked, so it is not atomic as a whole.
    fn drop_prefix(&self, prefix: &[u8]) -> Result<u64> {
        let snapshot = self.snapshot()?;
        let mut batch = WriteBatch::new();
        let mut dropped = 0u64;

        for entry in snapshot.scan_prefix(prefix) {
            let (key, _) = entry?;
            batch.delete(key);
            dropped += 1;

            if batch.len() >= DROP_BATCH_SIZE {
                self.write(std::mem::take(&mut batch))?;
            }
        }

        if !batch.is_empty() {
            self.write(batch)?;
        }

        Ok(dropped)
    }

    /// Removes all data.
    fn drop_all(&self) -> Result<u64> {
        self.drop_prefix(&[])
    }

    /// Reclaims space held by obsolete log segments whose stale fraction is
    /// at least `discard_ratio`.
    fn reclaim_space(&self, discard_ratio: f32) -> Result<()>;

    /// Merges the on-disk structure down as far as possible.
    fn compact(&self) -> Result<()>;

    /// Flushes buffered writes to durable storage.
    fn persist(&self) -> Result<()>;
}
