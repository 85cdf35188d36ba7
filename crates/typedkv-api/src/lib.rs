//! # typedkv
//!
//! Typed, namespaced tables on top of an embedded LSM key-value store.
//!
//! An application describes its "tables" once, as a bundle of namespace
//! accessors, and typedkv builds that bundle for every transaction:
//!
//! - [`NamespaceSingle`]: one typed value under a name
//! - [`NamespaceMultiple`]: a typed map under a name
//!
//! Every namespace lives in the same physical keyspace, separated by key
//! prefixes. Keys and values are encoded with `serde` + `bincode`, so any
//! type deriving `Serialize` and `Deserialize` can be stored.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use serde::{Deserialize, Serialize};
//! use typedkv::{Database, NamespaceMultiple, NamespaceSingle, Txn};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Record {
//!     a: String,
//!     b: BTreeMap<String, String>,
//! }
//!
//! struct Tables {
//!     counter: NamespaceSingle<u64>,
//!     records: NamespaceMultiple<String, Record>,
//! }
//!
//! fn tables(txn: Txn) -> Tables {
//!     Tables {
//!         counter: NamespaceSingle::new(txn.clone(), "counter"),
//!         records: NamespaceMultiple::new(txn, "records"),
//!     }
//! }
//!
//! fn main() -> Result<(), typedkv::Error> {
//!     let db = Database::open("./my_database", tables)?;
//!
//!     db.update(|t| {
//!         t.counter.set(&1)?;
//!         t.records.set(&"1234".to_string(), &Record::default())
//!     })?;
//!
//!     let record = db.view(|t| t.records.get(&"1234".to_string()))?;
//!     println!("{:?}", record);
//!
//!     db.close()
//! }
//! ```
//!
//! ## Transactions
//!
//! [`Database::update`] runs its closure in a read-write transaction that
//! commits atomically when the closure returns `Ok` and is discarded when it
//! returns `Err`. [`Database::view`] runs in a read-only snapshot. Writers are
//! serialized; readers run concurrently with each other and with a writer.
//!
//! ## Database Modes
//!
//! ```rust,no_run
//! use typedkv::{Database, NamespaceSingle};
//!
//! // Persistent, backed by the fjall LSM-tree
//! let persistent = Database::open("./data", |txn| NamespaceSingle::<u32>::new(txn, "n"))?;
//!
//! // Volatile, data is lost on drop
//! let scratch = Database::in_memory(|txn| NamespaceSingle::<u32>::new(txn, "n"))?;
//! # Ok::<(), typedkv::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub mod config;
pub mod logging;
mod maintenance;
mod namespace;
mod txn;

// Re-export core types
pub use typedkv_core::{codec, Error, Result};

// Engine layer
pub use typedkv_storage::{
    Engine, KvPair, LsmEngine, MemoryEngine, Snapshot, StorageConfig, WriteBatch,
};

// Backup stream format
pub use typedkv_snapshot::{BackupReader, BackupWriter};

pub use config::{DatabaseConfig, MaintenanceConfig};
pub use namespace::{NamespaceMultiple, NamespaceSingle};
pub use txn::Txn;

use maintenance::MaintenanceWorker;
use typedkv_storage::{Transaction, TxnMode};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the accessor bundle for one transaction
type Builder<A> = Box<dyn Fn(Txn) -> A + Send + Sync>;

/// The main database handle.
///
/// `A` is the accessor bundle produced by the constructor given at open
/// time. The handle is `Send + Sync`; share it across threads with an
/// `Arc` to run views concurrently.
///
/// # Examples
///
/// ```rust
/// use typedkv::{Database, NamespaceSingle};
///
/// let db = Database::in_memory(|txn| NamespaceSingle::<String>::new(txn, "motd"))?;
/// db.update(|motd| motd.set(&"hello".to_string()))?;
/// assert_eq!(db.view(|motd| motd.get())?, "hello");
/// # Ok::<(), typedkv::Error>(())
/// ```
pub struct Database<A> {
    engine: Arc<dyn Engine>,
    builder: Builder<A>,
    config: DatabaseConfig,
    write_lock: Mutex<()>,
    maintenance: Option<MaintenanceWorker>,
    closed: bool,
}

impl<A> Database<A> {
    /// Opens (or creates) a persistent database at `path` with the default
    /// configuration.
    ///
    /// `builder` is called at the start of every transaction to bind the
    /// namespace accessors to it.
    pub fn open<P, F>(path: P, builder: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(Txn) -> A + Send + Sync + 'static,
    {
        Self::open_with_config(path, DatabaseConfig::default(), builder)
    }

    /// Opens (or creates) a persistent database with a custom configuration.
    pub fn open_with_config<P, F>(path: P, config: DatabaseConfig, builder: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(Txn) -> A + Send + Sync + 'static,
    {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let engine = LsmEngine::open(path, config.storage.clone()).map_err(|e| e.in_op("open"))?;
        Self::with_engine(Arc::new(engine), config, builder)
    }

    /// Creates a volatile database. Background maintenance is disabled.
    pub fn in_memory<F>(builder: F) -> Result<Self>
    where
        F: Fn(Txn) -> A + Send + Sync + 'static,
    {
        let config = DatabaseConfig::default()
            .with_maintenance(MaintenanceConfig::disabled())
            .with_compact_on_open(false);
        Self::with_engine(Arc::new(MemoryEngine::new()), config, builder)
    }

    /// Wraps an already opened engine.
    ///
    /// Runs the opening sequence: one reclamation pass with
    /// `initial_discard_ratio` (failures are only logged), an optional
    /// major compaction, then the maintenance worker.
    pub fn with_engine<F>(engine: Arc<dyn Engine>, config: DatabaseConfig, builder: F) -> Result<Self>
    where
        F: Fn(Txn) -> A + Send + Sync + 'static,
    {
        let initial_ratio = config.maintenance.initial_discard_ratio;
        if let Err(err) = engine.reclaim_space(initial_ratio) {
            warn!(error = %err, "initial space reclamation failed");
        }

        if config.compact_on_open {
            engine.compact().map_err(|e| e.in_op("open"))?;
        }

        let maintenance = if config.maintenance.enabled {
            let worker = MaintenanceWorker::start(Arc::clone(&engine), config.maintenance.clone())
                .map_err(|e| e.in_op("open"))?;
            Some(worker)
        } else {
            None
        };

        info!(backend = engine.kind(), "database ready");
        Ok(Self {
            engine,
            builder: Box::new(builder),
            config,
            write_lock: Mutex::new(()),
            maintenance,
            closed: false,
        })
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// Returning `Ok` commits every write made through the bundle as one
    /// atomic batch; returning `Err` discards them all. Calls are serialized.
    pub fn update<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&A) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let _guard = self.lock_writer();
        let (outcome, transaction) = self.run(TxnMode::ReadWrite, f, "update")?;

        match outcome {
            Ok(value) => {
                let batch = transaction.into_batch();
                let writes = batch.len();
                if !batch.is_empty() {
                    self.engine.write(batch).map_err(|e| e.in_op("update"))?;
                }
                debug!(writes, "update committed");
                Ok(value)
            }
            Err(err) => {
                debug!(discarded = transaction.pending_len(), "update rolled back");
                Err(err)
            }
        }
    }

    /// Runs `f` in a read-only snapshot transaction.
    ///
    /// Writes through the bundle fail with [`Error::Transaction`].
    pub fn view<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&A) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let (outcome, _) = self.run(TxnMode::ReadOnly, f, "view")?;
        outcome
    }

    fn run<T, E, F>(
        &self,
        mode: TxnMode,
        f: F,
        op: &'static str,
    ) -> Result<(std::result::Result<T, E>, Transaction)>
    where
        F: FnOnce(&A) -> std::result::Result<T, E>,
    {
        let transaction =
            Transaction::begin(self.engine.as_ref(), mode).map_err(|e| e.in_op(op))?;
        let txn = Txn::new(transaction);

        let bundle = (self.builder)(txn.clone());
        let outcome = f(&bundle);
        drop(bundle);

        let transaction = txn.finish().map_err(|e| e.in_op(op))?;
        Ok((outcome, transaction))
    }

    /// Erases every key in the database.
    pub fn drop_all(&self) -> Result<()> {
        let _guard = self.lock_writer();
        let dropped = self.engine.drop_all().map_err(|e| e.in_op("drop_all"))?;
        info!(dropped, "dropped all data");
        Ok(())
    }

    /// Erases one namespace: the single value stored under `name` and every
    /// entry of the map stored under `name`.
    ///
    /// Namespaces whose names merely start with `name` are left alone.
    pub fn drop_namespace(&self, name: &str) -> Result<()> {
        let op = "drop_namespace";
        codec::validate_namespace_name(name).map_err(|e| e.in_op(op))?;

        let _guard = self.lock_writer();
        let mut batch = WriteBatch::new();
        batch.delete(name.as_bytes().to_vec());
        self.engine.write(batch).map_err(|e| e.in_namespace(op, name))?;

        let dropped = self
            .engine
            .drop_prefix(&codec::namespace_prefix(name))
            .map_err(|e| e.in_namespace(op, name))?;
        info!(namespace = name, dropped, "dropped namespace");
        Ok(())
    }

    /// Streams a consistent snapshot of every key/value pair into `sink`.
    ///
    /// Returns the number of entries written.
    pub fn backup<W: Write>(&self, sink: W) -> Result<u64> {
        let op = "backup";
        let snapshot = self.engine.snapshot().map_err(|e| e.in_op(op))?;
        let mut writer = BackupWriter::new(sink).map_err(|e| e.in_op(op))?;

        for entry in snapshot.scan_prefix(&[]) {
            let (key, value) = entry.map_err(|e| e.in_op(op))?;
            writer.write_entry(&key, &value).map_err(|e| e.in_op(op))?;
        }

        let entries = writer.entries();
        writer.finish().map_err(|e| e.in_op(op))?;
        info!(entries, "backup written");
        Ok(entries)
    }

    /// Replaces the whole database with the contents of a backup stream.
    ///
    /// The caller must make sure no other transaction runs meanwhile. The
    /// stream header is checked before anything is erased; damage found
    /// later leaves the entries loaded so far in place.
    pub fn load_backup<R: Read>(&self, source: R) -> Result<u64> {
        let op = "load_backup";
        let _guard = self.lock_writer();
        let mut reader = BackupReader::new(source).map_err(|e| e.in_op(op))?;

        self.engine.drop_all().map_err(|e| e.in_op(op))?;

        let batch_size = self.config.restore_batch_size.max(1);
        let mut batch = WriteBatch::new();
        for entry in reader.by_ref() {
            let (key, value) = entry.map_err(|e| e.in_op(op))?;
            batch.put(key, value);

            if batch.len() >= batch_size {
                self.engine
                    .write(std::mem::take(&mut batch))
                    .map_err(|e| e.in_op(op))?;
            }
        }
        if !batch.is_empty() {
            self.engine.write(batch).map_err(|e| e.in_op(op))?;
        }

        self.engine.compact().map_err(|e| e.in_op(op))?;

        let entries = reader.entries();
        info!(entries, "backup loaded");
        Ok(entries)
    }

    /// Runs one space reclamation pass now.
    pub fn reclaim_space(&self, discard_ratio: f32) -> Result<()> {
        self.engine
            .reclaim_space(discard_ratio)
            .map_err(|e| e.in_op("reclaim_space"))
    }

    /// Flushes pending engine writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.engine.persist().map_err(|e| e.in_op("sync"))
    }

    /// Configuration the database was opened with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Stops background maintenance and flushes the engine.
    pub fn close(mut self) -> Result<()> {
        self.shutdown().map_err(|e| e.in_op("close"))
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut worker) = self.maintenance.take() {
            worker.stop()?;
        }
        self.engine.persist()?;
        info!(backend = self.engine.kind(), "database closed");
        Ok(())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        // The mutex guards no data, so a panicked writer leaves nothing to repair
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A> Drop for Database<A> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to close database cleanly");
        }
    }
}

impl<A> fmt::Debug for Database<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.engine.kind())
            .field("config", &self.config)
            .field("maintenance", &self.maintenance.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use tempfile::tempdir;

    #[derive(Clone)]
    struct Bundle {
        single: NamespaceSingle<u64>,
        multi: NamespaceMultiple<String, String>,
    }

    fn bundle(txn: Txn) -> Bundle {
        Bundle {
            single: NamespaceSingle::new(txn.clone(), "DataA"),
            multi: NamespaceMultiple::new(txn, "DataB"),
        }
    }

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.3.0");
    }

    #[test]
    fn test_update_commits() {
        let db = Database::in_memory(bundle).unwrap();
        db.update(|b| {
            b.single.set(&7)?;
            b.multi.set(&"k".to_string(), &"v".to_string())
        })
        .unwrap();

        let (single, multi) = db
            .view(|b| Ok::<_, Error>((b.single.get()?, b.multi.get(&"k".to_string())?)))
            .unwrap();
        assert_eq!(single, 7);
        assert_eq!(multi.as_deref(), Some("v"));
    }

    #[test]
    fn test_read_your_own_writes() {
        let db = Database::in_memory(bundle).unwrap();
        db.update(|b| {
            b.multi.set(&"1234".to_string(), &"x".to_string())?;
            assert_eq!(b.multi.get(&"1234".to_string())?.as_deref(), Some("x"));

            let mut seen = 0;
            b.multi.iterate(|_, _| {
                seen += 1;
                Ok::<_, Error>(ControlFlow::Continue(()))
            })?;
            assert_eq!(seen, 1);
            Ok::<_, Error>(())
        })
        .unwrap();
    }

    #[test]
    fn test_error_discards_writes() {
        let db = Database::in_memory(bundle).unwrap();
        let result = db.update(|b| {
            b.single.set(&1)?;
            Err::<(), _>(Error::Transaction("abort".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(db.view(|b| b.single.get()).unwrap(), 0);
    }

    #[test]
    fn test_view_is_read_only() {
        let db = Database::in_memory(bundle).unwrap();
        let err = db.view(|b| b.single.set(&1)).unwrap_err();
        assert!(matches!(err.root(), Error::Transaction(_)));
    }

    #[test]
    fn test_leaked_bundle_fails_fast() {
        let db = Database::in_memory(bundle).unwrap();
        let leaked = db.update(|b| Ok::<_, Error>(b.clone())).unwrap();

        let err = leaked.single.get().unwrap_err();
        assert!(matches!(err.root(), Error::Transaction(_)));
    }

    #[test]
    fn test_drop_namespace_rejects_invalid_name() {
        let db = Database::in_memory(bundle).unwrap();
        let err = db.drop_namespace("").unwrap_err();
        assert!(matches!(err.root(), Error::InvalidNamespace(_)));
    }

    #[test]
    fn test_persistent_database() {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::default().with_maintenance(MaintenanceConfig::disabled());

        {
            let db = Database::open_with_config(dir.path(), config.clone(), bundle).unwrap();
            db.update(|b| b.single.set(&42)).unwrap();
            db.close().unwrap();
        }

        let db = Database::open_with_config(dir.path(), config, bundle).unwrap();
        assert_eq!(db.view(|b| b.single.get()).unwrap(), 42);
    }
}
