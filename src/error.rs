use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Crate-wide error type.
///
/// `Db` is deliberately *not* how SQLite-layer failures reach a client: those
/// are encoded as a `DbError` payload inside a well-formed response (see
/// `crate::gateway::response`), per the rule that a storage-engine failure is
/// a result, not an API error. This enum covers failures in the core itself:
/// malformed wire input, registry misses, and poisoned locks.
#[derive(Debug, Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a lock was poisoned by a panicking holder")]
    Poisoned,

    #[error("bad configuration: {0}")]
    BadConfig(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Poisoned
    }
}
