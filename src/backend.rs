//! The mapping contract every backend satisfies.
//!
//! Implement [`MapBackend`] to bring your own store. Backends deal in raw
//! [`serde_json::Value`]s; the typed [`Shelf`](crate::Shelf) front end does
//! the conversion to and from caller types.

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

/// Operations a persistence strategy must provide to back a
/// [`Shelf`](crate::Shelf).
///
/// Mutating methods take `&mut self`, reads take `&self`. Any iterator a
/// backend hands out borrows the backend, so no mutation can happen while one
/// is alive.
///
/// Once [`dispose`](Self::dispose) has run, every method other than
/// `dispose`, `path` and `kind` must fail with [`Error::UseAfterDispose`].
pub trait MapBackend: Send {
    /// Look up a value. Absent keys are [`Error::NotFound`].
    fn get(&self, key: &str) -> Result<Value>;

    /// Insert or overwrite a value.
    fn set(&mut self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Absent keys are [`Error::NotFound`].
    fn delete(&mut self, key: &str) -> Result<()>;

    /// `true` if the key exists. A missing key is `Ok(false)`, never
    /// `NotFound`.
    fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lazy, finite sequence of all current keys. Order is backend-defined.
    fn iter_keys(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>>;

    /// All current keys, eagerly collected.
    fn keys(&self) -> Result<Vec<String>> {
        self.iter_keys()?.collect()
    }

    /// Number of entries.
    fn len(&self) -> Result<usize>;

    /// `true` when there are no entries.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop all entries. The default deletes key by key; override with
    /// something native when available.
    fn clear(&mut self) -> Result<()> {
        for key in self.keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }

    /// Make the current state durable. Calling it twice in a row is the same
    /// as calling it once.
    fn persist(&mut self) -> Result<()>;

    /// Release the file or connection. Safe to call more than once. Does not
    /// persist.
    fn dispose(&mut self) -> Result<()>;

    /// `true` once [`dispose`](Self::dispose) has run.
    fn is_disposed(&self) -> bool;

    /// Path identifying the backing file.
    fn path(&self) -> &Path;

    /// Which backend family this is.
    fn kind(&self) -> Backend;
}

impl<B: MapBackend + ?Sized> MapBackend for Box<B> {
    fn get(&self, key: &str) -> Result<Value> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }

    fn iter_keys(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        (**self).iter_keys()
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }

    fn is_empty(&self) -> Result<bool> {
        (**self).is_empty()
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn persist(&mut self) -> Result<()> {
        (**self).persist()
    }

    fn dispose(&mut self) -> Result<()> {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }

    fn path(&self) -> &Path {
        (**self).path()
    }

    fn kind(&self) -> Backend {
        (**self).kind()
    }
}

/// Selects a backend at runtime.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// In-memory snapshot written as one JSON document.
    Json,
    /// In-memory snapshot written as an opaque bincode blob.
    Bincode,
    /// One SQLite row per entry.
    Sqlite,
}

impl Backend {
    /// Guess the backend from a file extension. `None` when the extension is
    /// missing or unknown.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Backend::Json),
            "bin" | "bincode" | "pickle" | "pkl" => Some(Backend::Bincode),
            "db" | "sqlite" | "sqlite3" => Some(Backend::Sqlite),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Bincode => "bincode",
            Backend::Sqlite => "sqlite",
        }
    }

    /// `true` for backends that keep everything in memory until persist.
    pub fn is_buffered(self) -> bool {
        matches!(self, Backend::Json | Backend::Bincode)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "bincode" | "blob" | "pickle" => Ok(Backend::Bincode),
            "sqlite" | "sqlite3" | "db" => Ok(Backend::Sqlite),
            other => Err(Error::Config(format!("unknown backend `{other}`"))),
        }
    }
}
