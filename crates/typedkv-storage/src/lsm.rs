//! Persistent backend on top of the `fjall` LSM-tree.
//!
//! All data lives in a single partition. With key-value separation enabled
//! large values go to blob files (the value log), and
//! [`Engine::reclaim_space`] maps onto fjall's blob garbage collection.
//!
//! fjall fixes a partition's kind when it is created, so the kind chosen on
//! first open is recorded next to the keyspace and wins over the
//! configuration on every later open.

use crate::engine::{BatchOp, Engine, KvPair, Snapshot, WriteBatch};
use crate::StorageConfig;
use fjall::{
    Config, GarbageCollection, Keyspace, KvSeparationOptions, PartitionCreateOptions,
    PartitionHandle, PersistMode,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use typedkv_core::{Error, Result};

/// Name of the partition holding the flat keyspace.
const PARTITION_NAME: &str = "data";

/// Present in the engine directory iff the partition was created with
/// key-value separation.
const KV_SEPARATION_MARKER: &str = "KV_SEPARATED";

// Snapshot reads surface `lsm_tree::Error`, everything else `fjall::Error`.
fn storage_err(err: impl Into<fjall::Error>) -> Error {
    Error::Storage(err.into().to_string())
}

/// Engine backed by an on-disk fjall keyspace.
pub struct LsmEngine {
    dir: PathBuf,
    config: StorageConfig,
    kv_separated: bool,
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl LsmEngine {
    /// Opens or creates the engine in `path`.
    pub fn open(path: impl AsRef<Path>, config: StorageConfig) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let keyspace = Config::new(&dir)
            .cache_size(config.cache_size)
            .open()
            .map_err(storage_err)?;

        let marker = dir.join(KV_SEPARATION_MARKER);
        let kv_separated = if keyspace.partition_exists(PARTITION_NAME) {
            marker.exists()
        } else {
            config.kv_separation
        };
        if kv_separated != config.kv_separation {
            warn!(
                requested = config.kv_separation,
                existing = kv_separated,
                "kv separation is fixed at creation, keeping the existing layout"
            );
        }

        let mut options = PartitionCreateOptions::default();
        if kv_separated {
            options = options.with_kv_separation(KvSeparationOptions::default());
        }
        let partition = keyspace
            .open_partition(PARTITION_NAME, options)
            .map_err(storage_err)?;

        // A crash before this point leaves a separated partition without the
        // marker, which only disables reclamation.
        if kv_separated && !marker.exists() {
            std::fs::write(&marker, b"")?;
        }

        info!(
            path = %dir.display(),
            kv_separation = kv_separated,
            "opened lsm engine"
        );

        Ok(Self {
            dir,
            config,
            kv_separated,
            keyspace,
            partition,
        })
    }

    /// Directory the engine stores its files in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the partition stores values in blob files.
    ///
    /// This is the layout the partition was created with, which may differ
    /// from [`StorageConfig::kv_separation`] on reopen.
    pub fn kv_separated(&self) -> bool {
        self.kv_separated
    }
}

impl Engine for LsmEngine {
    fn kind(&self) -> &'static str {
        "lsm"
    }

    fn snapshot(&self) -> Result<Box<dyn Snapshot>> {
        Ok(Box::new(LsmSnapshot {
            inner: self.partition.snapshot(),
        }))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut pending = self.keyspace.batch();
        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    pending.insert(&self.partition, key, value);
                }
                BatchOp::Delete(key) => {
                    pending.remove(&self.partition, key);
                }
            }
        }
        pending.commit().map_err(storage_err)
    }

    fn reclaim_space(&self, discard_ratio: f32) -> Result<()> {
        if !self.kv_separated {
            debug!("kv separation disabled, nothing to reclaim");
            return Ok(());
        }

        self.partition.gc_scan().map_err(storage_err)?;
        self.partition
            .gc_with_staleness_threshold(discard_ratio)
            .map_err(storage_err)?;
        self.partition
            .gc_drop_stale_segments()
            .map_err(storage_err)?;

        debug!(discard_ratio, "reclaimed stale blob segments");
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        self.partition.major_compact().map_err(storage_err)
    }

    fn persist(&self) -> Result<()> {
        let mode = if self.config.sync_on_persist {
            PersistMode::SyncAll
        } else {
            PersistMode::Buffer
        };
        self.keyspace.persist(mode).map_err(storage_err)
    }
}

struct LsmSnapshot {
    inner: fjall::Snapshot,
}

impl Snapshot for LsmSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.inner.get(key).map_err(storage_err)?;
        Ok(value.map(|value| value.to_vec()))
    }

    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KvPair>> + 'a> {
        let iter = self.inner.prefix(prefix.to_vec()).map(|item| {
            item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(storage_err)
        });
        Box::new(iter)
    }
}
