//! Error types for typedkv.

use std::fmt;

/// The main error type for typedkv operations.
#[derive(Debug)]
pub enum Error {
    /// A lock was poisoned (internal error)
    LockPoisoned,

    /// I/O error
    Io(std::io::Error),

    /// A value or key could not be serialized
    Encoding(String),

    /// Stored bytes could not be deserialized into the requested type
    Decoding(String),

    /// Failure reported by the storage engine
    Storage(String),

    /// Data read back from the engine or a backup stream is damaged
    Corruption(String),

    /// Misuse of a transaction (finished, read-only, ...)
    Transaction(String),

    /// Namespace name is empty or contains a null byte
    InvalidNamespace(String),

    /// Invalid configuration or process-wide setup (e.g. logging)
    Config(String),

    /// Another error annotated with the operation (and namespace) it came from
    Context {
        /// Operation name, e.g. `get` or `update`
        op: &'static str,
        /// Namespace the operation ran against, if any
        namespace: Option<String>,
        /// Underlying error
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `self` with the name of a database-level operation.
    pub fn in_op(self, op: &'static str) -> Self {
        Error::Context {
            op,
            namespace: None,
            source: Box::new(self),
        }
    }

    /// Wraps `self` with the operation and the namespace it ran against.
    pub fn in_namespace(self, op: &'static str, namespace: &str) -> Self {
        Error::Context {
            op,
            namespace: Some(namespace.to_string()),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any context layers.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when the root cause is a decoding failure.
    pub fn is_decoding(&self) -> bool {
        matches!(self.root(), Error::Decoding(_))
    }

    /// True when the root cause is an encoding failure.
    pub fn is_encoding(&self) -> bool {
        matches!(self.root(), Error::Encoding(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::Decoding(msg) => write!(f, "Decoding error: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Corruption(msg) => write!(f, "Corruption: {}", msg),
            Error::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            Error::InvalidNamespace(msg) => write!(f, "Invalid namespace: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Context {
                op,
                namespace: Some(namespace),
                source,
            } => write!(f, "{} `{}`: {}", op, namespace, source),
            Error::Context {
                op,
                namespace: None,
                source,
            } => write!(f, "{}: {}", op, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A specialized `Result` type for typedkv operations.
pub type Result<T> = std::result::Result<T, Error>;
