use crate::namespace::assert_valid_name;
use crate::Txn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use typedkv_core::{codec, Result};

/// One typed value stored under the namespace name itself.
///
/// # Examples
///
/// ```rust
/// use typedkv::{Database, NamespaceSingle};
///
/// let db = Database::in_memory(|txn| NamespaceSingle::<u64>::new(txn, "counter"))?;
///
/// db.update(|counter| {
///     let next = counter.get()? + 1;
///     counter.set(&next)
/// })?;
///
/// assert_eq!(db.view(|counter| counter.get())?, 1);
/// # Ok::<(), typedkv::Error>(())
/// ```
pub struct NamespaceSingle<V> {
    txn: Txn,
    name: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> NamespaceSingle<V>
where
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
            _value: PhantomData,
        }
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `value`, replacing any previous one.
    pub fn set(&self, value: &V) -> Result<()> {
        let encoded = codec::encode(value).map_err(|e| e.in_namespace("set", &self.name))?;
        self.txn
            .write(|t| t.set(self.key(), encoded))
            .map_err(|e| e.in_namespace("set", &self.name))
    }

    /// Returns the stored value, or `None` when nothing is stored.
    pub fn get_opt(&self) -> Result<Option<V>> {
        let raw = self
            .txn
            .read(|t| t.get(self.name.as_bytes()))
            .map_err(|e| e.in_namespace("get", &self.name))?;

        raw.map(|bytes| codec::decode(&bytes))
            .transpose()
            .map_err(|e| e.in_namespace("get", &self.name))
    }

    /// Removes the stored value. Removing nothing is not an error.
    pub fn delete(&self) -> Result<()> {
        self.txn
            .write(|t| t.delete(self.key()))
            .map_err(|e| e.in_namespace("delete", &self.name))
    }

    fn key(&self) -> Vec<u8> {
        self.name.as_bytes().to_vec()
    }
}

impl<V> NamespaceSingle<V>
where
    V: Serialize + DeserializeOwned + Default,
{
    /// Returns the stored value, or `V::default()` when nothing is stored.
    pub fn get(&self) -> Result<V> {
        Ok(self.get_opt()?.unwrap_or_default())
    }
}

impl<V> Clone for NamespaceSingle<V> {
    fn clone(&self) -> Self {
        Self {
            txn: self.txn.clone(),
            name: self.name.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> fmt::Debug for NamespaceSingle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceSingle")
            .field("name", &self.name)
            .field("txn", &self.txn)
            .finish()
    }
}
