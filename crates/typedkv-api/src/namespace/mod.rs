//! Typed accessors over a key prefix.
//!
//! A namespace is nothing more than a naming convention on engine keys:
//!
//! ```text
//! NamespaceSingle   "config"             -> encode(value)
//! NamespaceMultiple "users" 0x00 enc(k)  -> encode(value)
//! ```
//!
//! Accessors are cheap and built fresh for every transaction by the
//! constructor passed to [`Database::open`](crate::Database::open).

mod multiple;
mod single;

pub use multiple::NamespaceMultiple;
pub use single::NamespaceSingle;

use typedkv_core::codec;

/// Panics with the validation message when `name` cannot be a namespace.
#[track_caller]
pub(crate) fn assert_valid_name(name: &str) {
    if let Err(err) = codec::validate_namespace_name(name) {
        panic!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names_pass() {
        assert_valid_name("users");
        assert_valid_name("A");
    }

    #[test]
    #[should_panic(expected = "Invalid namespace")]
    fn test_empty_name_panics() {
        assert_valid_name("");
    }

    #[test]
    #[should_panic]
    fn test_nul_name_panics() {
        assert_valid_name("a\0b");
    }
}
