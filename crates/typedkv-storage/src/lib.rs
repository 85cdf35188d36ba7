//! # typedkv Storage
//!
//! Engine binding for typedkv.
//!
//! **This crate is an internal implementation detail of typedkv.** Depend on
//! the main `typedkv` crate instead; this API may change without notice.
//!
//! ---
//!
//! The storage engine itself is an external collaborator. This crate
//! describes what typedkv needs from it ([`Engine`], [`Snapshot`]) and
//! provides two backends:
//!
//! - [`LsmEngine`]: persistent, on top of the `fjall` LSM-tree
//! - [`MemoryEngine`]: volatile, for tests and scratch data
//!
//! On top of any backend, [`Transaction`] adds snapshot reads and a private
//! write overlay committed as one atomic batch.
//!
//! ```text
//! Transaction ── reads ──> Snapshot (point in time)
//!      │
//!      └─ commit ──> WriteBatch ──> Engine::write (atomic)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod lsm;
pub mod memory;
pub mod transaction;

pub use engine::{BatchOp, Engine, KvPair, Snapshot, WriteBatch};
pub use lsm::LsmEngine;
pub use memory::MemoryEngine;
pub use transaction::{PrefixScan, Transaction, TxnMode};

/// Default block cache size (32MB)
const DEFAULT_CACHE_SIZE: u64 = 32 * 1024 * 1024;

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Block cache size in bytes
    pub cache_size: u64,
    /// Store large values in separate blob files so they can be reclaimed
    /// by value-log garbage collection
    pub kv_separation: bool,
    /// Fsync the journal when persisting (otherwise only flush OS buffers)
    pub sync_on_persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            kv_separation: true,
            sync_on_persist: true,
        }
    }
}

impl StorageConfig {
    /// Set the block cache size
    pub fn with_cache_size(mut self, bytes: u64) -> Self {
        self.cache_size = bytes;
        self
    }

    /// Enable or disable key-value separation
    pub fn with_kv_separation(mut self, enabled: bool) -> Self {
        self.kv_separation = enabled;
        self
    }

    /// Choose whether persisting fsyncs the journal
    pub fn with_sync_on_persist(mut self, enabled: bool) -> Self {
        self.sync_on_persist = enabled;
        self
    }
}
