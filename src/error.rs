//! Unified error type for all shelf operations.

/// Things that can go wrong when using a shelf.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The key is not in the shelf.
    #[error("key not found: {0}")]
    NotFound(String),
    /// The value has no representation in the shelf's data model.
    #[error("value cannot be serialized: {0}")]
    Unserializable(String),
    /// Stored bytes (a file, a row, or a value of the wrong shape) failed to
    /// decode.
    #[error("corrupt data: {0}")]
    CorruptData(String),
    /// File system or connection problem.
    #[error("i/o error: {0}")]
    Io(String),
    /// The handle was disposed before this call.
    #[error("shelf used after dispose")]
    UseAfterDispose,
    /// Bad configuration (table name, backend name, etc.).
    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
            {
                Error::CorruptData(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => Error::CorruptData(err.to_string()),
            _ => Error::Io(err.to_string()),
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
