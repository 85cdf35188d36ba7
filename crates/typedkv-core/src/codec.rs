//! Value codec and key-prefix helpers.
//!
//! Values and keys are serialized structurally with `bincode`, so anything
//! deriving `Serialize`/`Deserialize` can be stored without registering it
//! first. Encoded bytes are opaque to the engine. Decoding must consume the
//! whole input, so a value written under a different type shape is reported
//! instead of being read back as a shorter prefix.
//!
//! Multi-value namespaces store entries under `name ++ 0x00 ++ key`. Names
//! can never contain `0x00`, which makes `name ++ 0x00` a unique boundary:
//! prefixes are stripped by position, so encoded keys may contain any byte.

use crate::{Error, Result};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Byte placed between a namespace name and an encoded key.
pub const SEPARATOR: u8 = 0x00;

// Fixed-width integers keep the layout of `bincode::serialize`.
fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Serializes `value` into an opaque byte vector.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| Error::Encoding(e.to_string()))
}

/// Deserializes a value previously produced by [`encode`].
///
/// Trailing bytes after the value are a decoding error.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    options()
        .deserialize(bytes)
        .map_err(|e| Error::Decoding(e.to_string()))
}

/// Returns `prefix ++ 0x00 ++ key`.
pub fn prefix_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + 1 + key.len());
    full.extend_from_slice(prefix);
    full.push(SEPARATOR);
    full.extend_from_slice(key);
    full
}

/// Returns the bytes of `full_key` after `prefix ++ 0x00`.
///
/// Returns `None` if `full_key` does not start with that boundary.
pub fn strip_prefix<'a>(prefix: &[u8], full_key: &'a [u8]) -> Option<&'a [u8]> {
    full_key
        .strip_prefix(prefix)?
        .strip_prefix(&[SEPARATOR][..])
}

/// Returns the scan prefix (`name ++ 0x00`) shared by every entry of a
/// multi-value namespace.
pub fn namespace_prefix(name: &str) -> Vec<u8> {
    prefix_key(name.as_bytes(), &[])
}

/// Checks that `name` can be used as a namespace name.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidNamespace(
            "name must not be empty".to_string(),
        ));
    }
    if name.as_bytes().contains(&SEPARATOR) {
        return Err(Error::InvalidNamespace(format!(
            "name {:?} must not contain the \\0 byte",
            name
        )));
    }
    Ok(())
}
