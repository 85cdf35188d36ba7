//! In-memory backend.
//!
//! Data lives in a `BTreeMap` behind an `Arc`. Snapshots share the map and
//! writers copy it on first write while a snapshot is alive, so readers
//! never observe a half-applied batch.

use crate::engine::{BatchOp, Engine, KvPair, Snapshot, WriteBatch};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};
use typedkv_core::{Error, Result};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile engine; everything is lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<Arc<Tree>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize> {
        let data = self.data.read().map_err(|_| Error::LockPoisoned)?;
        Ok(data.len())
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Engine for MemoryEngine {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn snapshot(&self) -> Result<Box<dyn Snapshot>> {
        let data = self.data.read().map_err(|_| Error::LockPoisoned)?;
        Ok(Box::new(MemorySnapshot {
            data: Arc::clone(&data),
        }))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Error::LockPoisoned)?;
        let tree = Arc::make_mut(&mut data);
        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    tree.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    tree.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn drop_prefix(&self, prefix: &[u8]) -> Result<u64> {
        let mut data = self.data.write().map_err(|_| Error::LockPoisoned)?;
        let tree = Arc::make_mut(&mut data);
        let before = tree.len();
        tree.retain(|key, _| !key.starts_with(prefix));
        Ok((before - tree.len()) as u64)
    }

    fn reclaim_space(&self, _discard_ratio: f32) -> Result<()> {
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        Ok(())
    }
}

struct MemorySnapshot {
    data: Arc<Tree>,
}

impl Snapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan_prefix<'a>(&'a self, prefix: &[u8]) -> Box<dyn Iterator<Item = Result<KvPair>> + 'a> {
        let prefix = prefix.to_vec();
        let iter = self
            .data
            .range::<[u8], _>((Bound::Included(prefix.as_slice()), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| Ok::<_, Error>((key.clone(), value.clone())));
        Box::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ops: &[(&[u8], Option<&[u8]>)]) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, value) in ops {
            match value {
                Some(value) => batch.put(key.to_vec(), value.to_vec()),
                None => batch.delete(key.to_vec()),
            }
        }
        batch
    }

    #[test]
    fn test_write_and_get() {
        let engine = MemoryEngine::new();
        engine
            .write(batch(&[(b"a", Some(b"1")), (b"b", Some(b"2"))]))
            .unwrap();

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(snapshot.get(b"missing").unwrap(), None);
        assert_eq!(engine.len().unwrap(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let engine = MemoryEngine::new();
        engine.write(batch(&[(b"k", Some(b"old"))])).unwrap();

        let snapshot = engine.snapshot().unwrap();
        engine
            .write(batch(&[(b"k", Some(b"new")), (b"other", Some(b"x"))]))
            .unwrap();

        assert_eq!(snapshot.get(b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(snapshot.get(b"other").unwrap(), None);
        assert_eq!(
            engine.snapshot().unwrap().get(b"k").unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[test]
    fn test_scan_prefix_is_bounded_and_ordered() {
        let engine = MemoryEngine::new();
        engine
            .write(batch(&[
                (b"A\x00b", Some(b"2")),
                (b"A\x00a", Some(b"1")),
                (b"AB\x00a", Some(b"3")),
                (b"B", Some(b"4")),
            ]))
            .unwrap();

        let snapshot = engine.snapshot().unwrap();
        let keys: Vec<Vec<u8>> = snapshot
            .scan_prefix(b"A\x00")
            .map(|entry| entry.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"A\x00a".to_vec(), b"A\x00b".to_vec()]);
    }

    #[test]
    fn test_drop_prefix_and_drop_all() {
        let engine = MemoryEngine::new();
        engine
            .write(batch(&[
                (b"A\x00a", Some(b"1")),
                (b"AB\x00a", Some(b"2")),
                (b"C", Some(b"3")),
            ]))
            .unwrap();

        assert_eq!(engine.drop_prefix(b"A\x00").unwrap(), 1);
        assert_eq!(engine.len().unwrap(), 2);

        assert_eq!(engine.drop_all().unwrap(), 2);
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let engine = MemoryEngine::new();
        engine.write(batch(&[(b"missing", None)])).unwrap();
        assert!(engine.is_empty().unwrap());
    }
}
