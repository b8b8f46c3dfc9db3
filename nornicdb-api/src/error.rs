use std::error::Error as StdError;
use std::fmt;

/// Errors a [`crate::StorageEngine`] implementation can report back to the
/// query engine.
#[derive(Debug)]
pub enum Error {
    /// The caller tried to create a node/edge id that already exists.
    AlreadyExists(String),
    /// A lookup by id found nothing.
    NotFound(String),
    /// The requested operation conflicts with an in-flight transaction
    /// (e.g. committing twice).
    InvalidTransaction(String),
    /// An I/O failure from a durable backing store.
    Io(std::io::Error),
    /// Anything else, carrying a human-readable description.
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyExists(id) => write!(f, "already exists: {id}"),
            Error::NotFound(id) => write!(f, "not found: {id}"),
            Error::InvalidTransaction(msg) => write!(f, "invalid transaction: {msg}"),
            Error::Io(e) => write!(f, "storage io error: {e}"),
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
