//! # typedkv Core
//!
//! Core types shared by every typedkv crate: the error type, the value
//! codec and the namespace key conventions.
//!
//! **This crate is an internal implementation detail of typedkv.** Depend on
//! the main `typedkv` crate instead.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;

pub use codec::{decode, encode, namespace_prefix, prefix_key, strip_prefix, validate_namespace_name};
pub use error::{Error, Result};
