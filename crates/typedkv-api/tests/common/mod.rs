// Common fixtures for typedkv integration tests

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use typedkv::{
    Database, DatabaseConfig, MaintenanceConfig, NamespaceMultiple, NamespaceSingle, Txn,
};

/// Record stored in the multi-value namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub a: String,
    pub b: BTreeMap<String, String>,
}

/// Accessor bundle used by most tests
#[derive(Clone)]
pub struct Tables {
    pub data_a: NamespaceSingle<u64>,
    pub data_b: NamespaceMultiple<String, Record>,
}

pub fn tables(txn: Txn) -> Tables {
    Tables {
        data_a: NamespaceSingle::new(txn.clone(), "DataA"),
        data_b: NamespaceMultiple::new(txn, "DataB"),
    }
}

#[allow(dead_code)]
pub fn sample_record() -> Record {
    let mut b = BTreeMap::new();
    b.insert("test_key".to_string(), "test_value".to_string());
    Record {
        a: "5678".to_string(),
        b,
    }
}

/// Test fixture owning a temporary database directory
pub struct DbTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
}

impl DbTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("db");
        Self { temp_dir, db_path }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Config without the background worker, so tests stay deterministic
    #[allow(dead_code)]
    pub fn quiet_config(&self) -> DatabaseConfig {
        DatabaseConfig::default().with_maintenance(MaintenanceConfig::disabled())
    }
}

impl Default for DbTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A database on one backend, plus the directory it lives in (if any)
#[allow(dead_code)]
pub struct TestDb<A> {
    pub backend: &'static str,
    pub db: Database<A>,
    // declared after `db` so the engine closes before the directory goes away
    _dir: Option<TempDir>,
}

/// The same accessor bundle opened on every backend: the persistent LSM
/// engine in a fresh temp dir and the in-memory engine
#[allow(dead_code)]
pub fn all_backends<A, F>(builder: F) -> Vec<TestDb<A>>
where
    F: Fn(Txn) -> A + Clone + Send + Sync + 'static,
{
    let fixture = DbTestFixture::new();
    let lsm = Database::open_with_config(fixture.path(), fixture.quiet_config(), builder.clone())
        .expect("Failed to open lsm database");
    let memory = Database::in_memory(builder).expect("Failed to create memory database");

    vec![
        TestDb {
            backend: "lsm",
            db: lsm,
            _dir: Some(fixture.temp_dir),
        },
        TestDb {
            backend: "memory",
            db: memory,
            _dir: None,
        },
    ]
}
