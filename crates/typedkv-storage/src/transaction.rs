//! Snapshot transactions with a private write overlay.
//!
//! A [`Transaction`] reads from an engine snapshot taken when it begins and
//! buffers its own writes in an ordered overlay. Reads consult the overlay
//! first, so a transaction always observes its own writes while other
//! transactions keep seeing their snapshots. Committing turns the overlay
//! into one atomic [`WriteBatch`].

use crate::engine::{Engine, KvPair, Snapshot, WriteBatch};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Bound;
use std::rc::Rc;
use typedkv_core::{Error, Result};

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    /// Reads and writes; committed by the caller
    ReadWrite,
    /// Reads only; writes are rejected
    ReadOnly,
}

/// Pending mutation: `Some` is a put, `None` a tombstone.
type Pending = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// One engine transaction.
pub struct Transaction {
    mode: TxnMode,
    snapshot: Rc<dyn Snapshot>,
    pending: Pending,
}

impl Transaction {
    /// Begins a transaction over a fresh snapshot of `engine`.
    pub fn begin(engine: &dyn Engine, mode: TxnMode) -> Result<Self> {
        let snapshot = engine.snapshot()?;
        Ok(Self {
            mode,
            snapshot: Rc::from(snapshot),
            pending: BTreeMap::new(),
        })
    }

    /// Mode the transaction was started with.
    pub fn mode(&self) -> TxnMode {
        self.mode
    }

    /// True for read-only transactions.
    pub fn is_read_only(&self) -> bool {
        self.mode == TxnMode::ReadOnly
    }

    /// Number of buffered mutations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Reads `key`, preferring this transaction's own writes.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.pending.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.snapshot.get(key),
        }
    }

    /// Buffers a put.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        self.pending.insert(key, Some(value));
        Ok(())
    }

    /// Buffers a removal. Removing an absent key is not an error.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        self.pending.insert(key, None);
        Ok(())
    }

    /// Captures everything needed to scan `prefix` as seen by this
    /// transaction right now. The returned scan does not borrow the
    /// transaction, so writes made while scanning are not observed by it.
    pub fn scan_prefix(&self, prefix: &[u8]) -> PrefixScan {
        let overlay = self
            .pending
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        PrefixScan {
            snapshot: Rc::clone(&self.snapshot),
            prefix: prefix.to_vec(),
            overlay,
        }
    }

    /// Converts the buffered writes into a batch for the engine.
    pub fn into_batch(self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, value) in self.pending {
            match value {
                Some(value) => batch.put(key, value),
                None => batch.delete(key),
            }
        }
        batch
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::Transaction(
                "write attempted in a read-only transaction".to_string(),
            ));
        }
        Ok(())
    }
}

/// Prefix scan state detached from its transaction.
pub struct PrefixScan {
    snapshot: Rc<dyn Snapshot>,
    prefix: Vec<u8>,
    overlay: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl PrefixScan {
    /// Lazily yields the merged view of snapshot and overlay in key order.
    pub fn iter(&self) -> impl Iterator<Item = Result<KvPair>> + '_ {
        MergeIter {
            base: self.snapshot.scan_prefix(&self.prefix).peekable(),
            overlay: self.overlay.iter().peekable(),
        }
    }
}

/// Merges snapshot entries with overlay entries; the overlay wins on equal
/// keys and tombstones hide snapshot entries.
struct MergeIter<'a, B: Iterator<Item = Result<KvPair>>> {
    base: Peekable<B>,
    overlay: Peekable<std::slice::Iter<'a, (Vec<u8>, Option<Vec<u8>>)>>,
}

impl<B: Iterator<Item = Result<KvPair>>> Iterator for MergeIter<'_, B> {
    type Item = Result<KvPair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let order = match (self.base.peek(), self.overlay.peek()) {
                (None, None) => return None,
                (Some(Err(_)), _) => return self.base.next(),
                (Some(Ok(_)), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(Ok((base_key, _))), Some((overlay_key, _))) => base_key.cmp(overlay_key),
            };

            match order {
                Ordering::Less => return self.base.next(),
                Ordering::Equal => {
                    self.base.next();
                }
                Ordering::Greater => {}
            }

            if let Some((key, Some(value))) = self.overlay.next() {
                return Some(Ok((key.clone(), value.clone())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryEngine;

    fn seeded_engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        let mut batch = WriteBatch::new();
        batch.put(b"ns\x00a".to_vec(), b"1".to_vec());
        batch.put(b"ns\x00c".to_vec(), b"3".to_vec());
        batch.put(b"ns\x00e".to_vec(), b"5".to_vec());
        batch.put(b"other".to_vec(), b"x".to_vec());
        engine.write(batch).unwrap();
        engine
    }

    fn collect(scan: &PrefixScan) -> Vec<(String, String)> {
        scan.iter()
            .map(|entry| {
                let (key, value) = entry.unwrap();
                (
                    String::from_utf8(key).unwrap(),
                    String::from_utf8(value).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_read_your_own_writes() {
        let engine = seeded_engine();
        let mut txn = Transaction::begin(&engine, TxnMode::ReadWrite).unwrap();

        txn.set(b"ns\x00a".to_vec(), b"10".to_vec()).unwrap();
        txn.delete(b"ns\x00c".to_vec()).unwrap();

        assert_eq!(txn.get(b"ns\x00a").unwrap(), Some(b"10".to_vec()));
        assert_eq!(txn.get(b"ns\x00c").unwrap(), None);
        assert_eq!(txn.get(b"ns\x00e").unwrap(), Some(b"5".to_vec()));

        // Nothing reaches the engine before commit
        let outside = engine.snapshot().unwrap();
        assert_eq!(outside.get(b"ns\x00a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_scan_merges_overlay() {
        let engine = seeded_engine();
        let mut txn = Transaction::begin(&engine, TxnMode::ReadWrite).unwrap();

        txn.set(b"ns\x00b".to_vec(), b"2".to_vec()).unwrap();
        txn.set(b"ns\x00e".to_vec(), b"50".to_vec()).unwrap();
        txn.delete(b"ns\x00a".to_vec()).unwrap();
        txn.set(b"ns\x00z".to_vec(), b"26".to_vec()).unwrap();
        txn.set(b"nt".to_vec(), b"outside".to_vec()).unwrap();

        let scan = txn.scan_prefix(b"ns\x00");
        assert_eq!(
            collect(&scan),
            vec![
                ("ns\0b".to_string(), "2".to_string()),
                ("ns\0c".to_string(), "3".to_string()),
                ("ns\0e".to_string(), "50".to_string()),
                ("ns\0z".to_string(), "26".to_string()),
            ]
        );
    }

    #[test]
    fn test_scan_is_detached_from_later_writes() {
        let engine = seeded_engine();
        let mut txn = Transaction::begin(&engine, TxnMode::ReadWrite).unwrap();

        let scan = txn.scan_prefix(b"ns\x00");
        txn.set(b"ns\x00b".to_vec(), b"2".to_vec()).unwrap();

        assert_eq!(collect(&scan).len(), 3);
        assert_eq!(collect(&txn.scan_prefix(b"ns\x00")).len(), 4);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let engine = seeded_engine();
        let mut txn = Transaction::begin(&engine, TxnMode::ReadOnly).unwrap();

        assert!(txn.is_read_only());
        assert!(matches!(
            txn.set(b"k".to_vec(), b"v".to_vec()),
            Err(Error::Transaction(_))
        ));
        assert!(matches!(txn.delete(b"k".to_vec()), Err(Error::Transaction(_))));
        assert_eq!(txn.pending_len(), 0);
    }

    #[test]
    fn test_into_batch_commits_atomically() {
        let engine = seeded_engine();
        let mut txn = Transaction::begin(&engine, TxnMode::ReadWrite).unwrap();
        txn.set(b"ns\x00a".to_vec(), b"10".to_vec()).unwrap();
        txn.delete(b"other".to_vec()).unwrap();

        let batch = txn.into_batch();
        assert_eq!(batch.len(), 2);
        engine.write(batch).unwrap();

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.get(b"ns\x00a").unwrap(), Some(b"10".to_vec()));
        assert_eq!(snapshot.get(b"other").unwrap(), None);
    }
}
