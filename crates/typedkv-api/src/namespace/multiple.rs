use crate::namespace::assert_valid_name;
use crate::Txn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::ops::ControlFlow;
use typedkv_core::{codec, Error, Result};

/// A typed map stored under `name ++ 0x00 ++ encode(key)`.
///
/// Iteration follows the byte order of the *encoded* keys, which is not the
/// natural order of most key types (integers encode little-endian).
///
/// # Examples
///
/// ```rust
/// use std::ops::ControlFlow;
/// use typedkv::{Database, NamespaceMultiple};
///
/// let db = Database::in_memory(|txn| NamespaceMultiple::<String, u32>::new(txn, "ages"))?;
///
/// db.update(|ages| {
///     ages.set(&"ada".to_string(), &36)?;
///     ages.set(&"alan".to_string(), &41)
/// })?;
///
/// let total = db.view(|ages| {
///     let mut total = 0;
///     ages.iterate(|_, age| {
///         total += age;
///         Ok::<_, typedkv::Error>(ControlFlow::Continue(()))
///     })?;
///     Ok::<_, typedkv::Error>(total)
/// })?;
/// assert_eq!(total, 77);
/// # Ok::<(), typedkv::Error>(())
/// ```
pub struct NamespaceMultiple<K, V> {
    txn: Txn,
    name: String,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> NamespaceMultiple<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Binds the accessor to `txn`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or contains a `\0` byte.
    #[track_caller]
    pub fn new(txn: Txn, name: impl Into<String>) -> Self {
        let name = name.into();
        assert_valid_name(&name);
        Self {
            txn,
            name,
            _types: PhantomData,
        }
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &K, value: &V) -> Result<()> {
        let op = "set";
        let full_key = self.full_key(key).map_err(|e| self.context(op, e))?;
        let encoded = codec::encode(value).map_err(|e| self.context(op, e))?;
        self.txn
            .write(|t| t.set(full_key, encoded))
            .map_err(|e| self.context(op, e))
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let op = "get";
        let full_key = self.full_key(key).map_err(|e| self.context(op, e))?;
        let raw = self
            .txn
            .read(|t| t.get(&full_key))
            .map_err(|e| self.context(op, e))?;

        raw.map(|bytes| codec::decode(&bytes))
            .transpose()
            .map_err(|e| self.context(op, e))
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &K) -> Result<()> {
        let op = "delete";
        let full_key = self.full_key(key).map_err(|e| self.context(op, e))?;
        self.txn
            .write(|t| t.delete(full_key))
            .map_err(|e| self.context(op, e))
    }

    /// Visits every pair of the namespace in encoded-key order.
    ///
    /// Entries are pulled from the engine one at a time. The traversal sees
    /// this transaction's writes made before the call. Return
    /// `ControlFlow::Break(())` to stop early; an `Err` from the visitor, or
    /// a decode failure, aborts the traversal and is returned.
    pub fn iterate<F, E>(&self, mut visitor: F) -> std::result::Result<(), E>
    where
        F: FnMut(K, V) -> std::result::Result<ControlFlow<()>, E>,
        E: From<Error>,
    {
        let op = "iterate";
        let prefix = codec::namespace_prefix(&self.name);
        let scan = self
            .txn
            .read(|t| Ok(t.scan_prefix(&prefix)))
            .map_err(|e| self.context(op, e))?;

        for entry in scan.iter() {
            let (full_key, raw_value) = entry.map_err(|e| self.context(op, e))?;
            let key = self.decode_key(&full_key).map_err(|e| self.context(op, e))?;
            let value = codec::decode(&raw_value).map_err(|e| self.context(op, e))?;

            if visitor(key, value)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Returns the first key, in iteration order, whose stored value equals
    /// `value` byte for byte once encoded.
    pub fn find_key_by_value(&self, value: &V) -> Result<Option<K>> {
        let op = "find_key_by_value";
        let target = codec::encode(value).map_err(|e| self.context(op, e))?;
        let prefix = codec::namespace_prefix(&self.name);
        let scan = self
            .txn
            .read(|t| Ok(t.scan_prefix(&prefix)))
            .map_err(|e| self.context(op, e))?;

        for entry in scan.iter() {
            let (full_key, raw_value) = entry.map_err(|e| self.context(op, e))?;
            if raw_value == target {
                return self
                    .decode_key(&full_key)
                    .map(Some)
                    .map_err(|e| self.context(op, e));
            }
        }
        Ok(None)
    }

    fn full_key(&self, key: &K) -> Result<Vec<u8>> {
        Ok(codec::prefix_key(self.name.as_bytes(), &codec::encode(key)?))
    }

    fn decode_key(&self, full_key: &[u8]) -> Result<K> {
        let encoded = codec::strip_prefix(self.name.as_bytes(), full_key).ok_or_else(|| {
            Error::Corruption(format!(
                "scanned key {:?} lies outside the namespace",
                full_key
            ))
        })?;
        codec::decode(encoded)
    }

    fn context(&self, op: &'static str, err: Error) -> Error {
        err.in_namespace(op, &self.name)
    }
}

impl<K, V> Clone for NamespaceMultiple<K, V> {
    fn clone(&self) -> Self {
        Self {
            txn: self.txn.clone(),
            name: self.name.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for NamespaceMultiple<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceMultiple")
            .field("name", &self.name)
            .field("txn", &self.txn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamespaceSingle;
    use typedkv_storage::{MemoryEngine, Transaction, TxnMode};

    fn txn(engine: &MemoryEngine) -> Txn {
        Txn::new(Transaction::begin(engine, TxnMode::ReadWrite).unwrap())
    }

    fn keys_of(ns: &NamespaceMultiple<String, String>) -> Vec<String> {
        let mut keys = Vec::new();
        ns.iterate(|k, _| {
            keys.push(k);
            Ok::<_, Error>(ControlFlow::Continue(()))
        })
        .unwrap();
        keys
    }

    #[test]
    fn test_absent_present_delete_cycle() {
        let engine = MemoryEngine::new();
        let ns = NamespaceMultiple::<String, u32>::new(txn(&engine), "DataB");
        let key = "1234".to_string();

        assert_eq!(ns.get(&key).unwrap(), None);
        ns.set(&key, &7).unwrap();
        assert_eq!(ns.get(&key).unwrap(), Some(7));
        ns.delete(&key).unwrap();
        assert_eq!(ns.get(&key).unwrap(), None);
        ns.delete(&key).unwrap();
    }

    #[test]
    fn test_iterate_visits_all_and_breaks() {
        let engine = MemoryEngine::new();
        let ns = NamespaceMultiple::<String, String>::new(txn(&engine), "DataB");
        ns.set(&"1234".to_string(), &"first".to_string()).unwrap();
        ns.set(&"abcd".to_string(), &"second".to_string()).unwrap();

        let mut all = keys_of(&ns);
        all.sort();
        assert_eq!(all, vec!["1234".to_string(), "abcd".to_string()]);

        let mut visited = 0;
        ns.iterate(|_, _| {
            visited += 1;
            Ok::<_, Error>(ControlFlow::Break(()))
        })
        .unwrap();
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_iterate_propagates_visitor_error() {
        #[derive(Debug)]
        #[allow(dead_code)]
        enum AppError {
            Db(Error),
            Stop,
        }
        impl From<Error> for AppError {
            fn from(err: Error) -> Self {
                AppError::Db(err)
            }
        }

        let engine = MemoryEngine::new();
        let ns = NamespaceMultiple::<u8, u8>::new(txn(&engine), "n");
        ns.set(&1, &1).unwrap();
        ns.set(&2, &2).unwrap();

        let mut calls = 0;
        let result = ns.iterate(|_, _| {
            calls += 1;
            Err(AppError::Stop)
        });
        assert!(matches!(result, Err(AppError::Stop)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_keys_with_nul_bytes_round_trip() {
        let engine = MemoryEngine::new();
        let ns = NamespaceMultiple::<Vec<u8>, u8>::new(txn(&engine), "bin");
        let key = vec![0u8, 0, 1, 0];
        ns.set(&key, &5).unwrap();

        let mut seen = Vec::new();
        ns.iterate(|k, v| {
            seen.push((k, v));
            Ok::<_, Error>(ControlFlow::Continue(()))
        })
        .unwrap();
        assert_eq!(seen, vec![(key, 5)]);
    }

    #[test]
    fn test_find_key_by_value() {
        let engine = MemoryEngine::new();
        let ns = NamespaceMultiple::<String, String>::new(txn(&engine), "users");
        ns.set(&"u1".to_string(), &"ada".to_string()).unwrap();
        ns.set(&"u2".to_string(), &"alan".to_string()).unwrap();

        assert_eq!(
            ns.find_key_by_value(&"alan".to_string()).unwrap(),
            Some("u2".to_string())
        );
        assert_eq!(ns.find_key_by_value(&"grace".to_string()).unwrap(), None);
    }

    #[test]
    fn test_prefix_isolation() {
        let engine = MemoryEngine::new();
        let handle = txn(&engine);
        let a = NamespaceMultiple::<String, String>::new(handle.clone(), "A");
        let ab = NamespaceMultiple::<String, String>::new(handle.clone(), "AB");
        let single_a = NamespaceSingle::<String>::new(handle, "A");

        a.set(&"k".to_string(), &"from A".to_string()).unwrap();
        ab.set(&"k".to_string(), &"from AB".to_string()).unwrap();
        single_a.set(&"single".to_string()).unwrap();

        assert_eq!(keys_of(&a), vec!["k".to_string()]);
        assert_eq!(keys_of(&ab), vec!["k".to_string()]);
        assert_eq!(a.get(&"k".to_string()).unwrap().unwrap(), "from A");
        assert_eq!(single_a.get().unwrap(), "single");
    }

    #[test]
    fn test_decode_error_in_iterate() {
        let engine = MemoryEngine::new();
        let handle = txn(&engine);
        handle
            .write(|t| t.set(codec::prefix_key(b"nums", &codec::encode(&1u8).unwrap()), vec![]))
            .unwrap();

        let ns = NamespaceMultiple::<u8, u64>::new(handle, "nums");
        let err = ns
            .iterate(|_, _| Ok::<_, Error>(ControlFlow::Continue(())))
            .unwrap_err();
        assert!(err.is_decoding());
    }
}
