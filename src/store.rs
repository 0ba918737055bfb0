//! Typed shelf front end and its builder.

use crate::backend::{Backend, MapBackend};
use crate::buffered::{BincodeBackend, JsonBackend};
use crate::error::{Error, Result};
use crate::flush::FlushPolicy;
use crate::sqlite::{validate_table_name, KeyCursor, SqliteBackend, DEFAULT_TABLE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A backend picked at runtime.
pub type AnyBackend = Box<dyn MapBackend>;

/// Persistent key-value shelf.
///
/// Generic over the value type `V` and the backend `B`. Use
/// [`open`](Shelf::open) or [`builder`](Shelf::builder) to pick a backend at
/// runtime, or [`from_backend`](Shelf::from_backend) to keep the concrete
/// backend type (needed for backend-specific calls such as
/// [`stream_keys`](Shelf::stream_keys)).
///
/// Values go through the JSON data model, so any `Serialize +
/// DeserializeOwned` type works as long as it encodes to null, bools,
/// numbers, strings, arrays and string-keyed maps.
///
/// A shelf is single-owner: mutations take `&mut self`, and sharing one across
/// threads needs your own lock.
pub struct Shelf<V, B = AnyBackend> {
    pub(crate) backend: B,
    pub(crate) policy: FlushPolicy,
    pub(crate) _marker: PhantomData<fn() -> V>,
}

impl<V> Shelf<V, AnyBackend>
where
    V: Serialize + DeserializeOwned,
{
    /// Open (or create) a shelf at `path` with the given backend and default
    /// settings.
    pub fn open(backend: Backend, path: impl AsRef<Path>) -> Result<Self> {
        Self::builder(path).backend(backend).build()
    }

    /// Start configuring a new shelf. Call [`.build()`](ShelfBuilder::build)
    /// when ready.
    pub fn builder(path: impl AsRef<Path>) -> ShelfBuilder<V> {
        ShelfBuilder::new(path)
    }
}

impl<V, B: MapBackend> Shelf<V, B> {
    /// Wrap an already opened backend with manual flushing.
    pub fn from_backend(backend: B) -> Self {
        Self::with_policy(backend, FlushPolicy::Manual)
    }

    /// Wrap an already opened backend with the given flush policy.
    pub fn with_policy(backend: B, policy: FlushPolicy) -> Self {
        Self {
            backend,
            policy,
            _marker: PhantomData,
        }
    }

    /// Path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    /// Which backend this shelf uses.
    #[must_use]
    pub fn kind(&self) -> Backend {
        self.backend.kind()
    }

    /// Active flush policy.
    #[must_use]
    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Borrow the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutably borrow the backend. Writes made through it bypass the flush
    /// policy.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Unwrap into the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    // ---- keys ----

    /// `true` if the key exists.
    pub fn contains(&self, key: &str) -> Result<bool> {
        self.backend.contains(key)
    }

    /// Iterate over all keys. See [`MapBackend::iter_keys`] for ordering.
    pub fn iter_keys(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        self.backend.iter_keys()
    }

    /// All keys, collected.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.backend.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> Result<usize> {
        self.backend.len()
    }

    /// `true` when the shelf has no entries.
    pub fn is_empty(&self) -> Result<bool> {
        self.backend.is_empty()
    }

    /// Delete a key. Fails with [`Error::NotFound`] if it wasn't there.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.backend.delete(key)?;
        self.after_mutation()
    }

    /// Drop all entries.
    pub fn clear(&mut self) -> Result<()> {
        self.backend.clear()?;
        self.after_mutation()
    }

    // ---- lifecycle ----

    /// Make the current state durable: rewrite the file (buffered) or commit
    /// the open transaction (SQLite). Idempotent.
    ///
    /// On failure the in-memory state of a buffered shelf is unchanged. For
    /// SQLite the transaction state depends on the store; treat durable state
    /// as unknown and re-check.
    pub fn persist(&mut self) -> Result<()> {
        self.backend.persist()
    }

    /// Release the file or connection without persisting. Safe to call more
    /// than once; everything else fails with [`Error::UseAfterDispose`]
    /// afterwards.
    pub fn dispose(&mut self) -> Result<()> {
        self.backend.dispose()
    }

    /// `true` once [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.backend.is_disposed()
    }

    /// Persist, then dispose.
    pub fn close(mut self) -> Result<()> {
        self.persist()?;
        self.dispose()
    }

    fn after_mutation(&mut self) -> Result<()> {
        if self.policy.persists_on_write() {
            self.backend.persist()?;
        }
        Ok(())
    }
}

impl<V, B> Shelf<V, B>
where
    V: Serialize + DeserializeOwned,
    B: MapBackend,
{
    // ---- reads ----

    /// Get the value for `key`. Fails with [`Error::NotFound`] if absent.
    pub fn get(&self, key: &str) -> Result<V> {
        decode(key, self.backend.get(key)?)
    }

    /// Get the value for `key`, or `None` if absent.
    pub fn get_opt(&self, key: &str) -> Result<Option<V>> {
        match self.get(key) {
            Ok(v) => Ok(Some(v)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Snapshot of all key-value pairs, in key iteration order.
    pub fn items(&self) -> Result<Vec<(String, V)>> {
        self.keys()?
            .into_iter()
            .map(|k| {
                let v = self.get(&k)?;
                Ok((k, v))
            })
            .collect()
    }

    // ---- writes ----

    /// Insert or overwrite `key`. Fails with [`Error::Unserializable`] if the
    /// value has no JSON data model representation; nothing is written then.
    pub fn set(&mut self, key: &str, value: &V) -> Result<()> {
        let raw = encode(value)?;
        self.backend.set(key, raw)?;
        self.after_mutation()
    }

    /// Delete `key` and return its value.
    pub fn remove(&mut self, key: &str) -> Result<V> {
        let value = self.get(key)?;
        self.delete(key)?;
        Ok(value)
    }

    /// Bulk set from an iterator. Only persists once at the end under
    /// [`FlushPolicy::Immediate`], not once per entry. Stops at the first
    /// value that can't be encoded; earlier entries stay set.
    pub fn extend<K, I>(&mut self, iter: I) -> Result<()>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            let raw = encode(&v)?;
            self.backend.set(k.as_ref(), raw)?;
        }
        self.after_mutation()
    }

    /// Mutate the value at `key` in place. Returns `false` if the key doesn't
    /// exist (nothing happens in that case).
    pub fn update<F>(&mut self, key: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut V),
    {
        match self.get_opt(key)? {
            Some(mut v) => {
                f(&mut v);
                self.set(key, &v)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Return the existing value for `key`, or insert the result of `f` and
    /// return that. `f` only runs when the key is missing.
    pub fn get_or_insert_with<F>(&mut self, key: &str, f: F) -> Result<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get_opt(key)? {
            return Ok(v);
        }
        let val = f();
        self.set(key, &val)?;
        Ok(val)
    }
}

impl<V> Shelf<V, SqliteBackend> {
    /// Lazily stream keys over a live SQLite cursor. See
    /// [`SqliteBackend::stream_keys`].
    pub fn stream_keys(&self) -> Result<KeyCursor<'_>> {
        self.backend.stream_keys()
    }
}

fn encode<V: Serialize>(value: &V) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Unserializable(e.to_string()))
}

fn decode<V: DeserializeOwned>(key: &str, raw: serde_json::Value) -> Result<V> {
    serde_json::from_value(raw)
        .map_err(|e| Error::CorruptData(format!("value for key `{key}`: {e}")))
}

impl<V, B> std::fmt::Debug for Shelf<V, B>
where
    B: MapBackend,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shelf")
            .field("path", &self.backend.path())
            .field("kind", &self.backend.kind())
            .field("policy", &self.policy)
            .field("disposed", &self.backend.is_disposed())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and opens a [`Shelf`] with a runtime-selected backend.
///
/// ```rust,no_run
/// use json_shelf::{Backend, Shelf};
///
/// let db = Shelf::<i32>::builder("db.json")
///     .backend(Backend::Json)
///     .pretty(true)
///     .build()
///     .unwrap();
/// ```
pub struct ShelfBuilder<V> {
    path: PathBuf,
    backend: Option<Backend>,
    policy: FlushPolicy,
    pretty: bool,
    table: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V> ShelfBuilder<V>
where
    V: Serialize + DeserializeOwned,
{
    fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            backend: None,
            policy: FlushPolicy::Manual,
            pretty: false,
            table: DEFAULT_TABLE.to_string(),
            _marker: PhantomData,
        }
    }

    /// Pick the backend (default: inferred from the file extension, JSON when
    /// unknown).
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the flush policy (default: [`FlushPolicy::Manual`]).
    pub fn policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write human-readable JSON with indentation (default: compact). Only
    /// affects [`Backend::Json`].
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// SQLite table name (default: `shelf`). Only affects
    /// [`Backend::Sqlite`].
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    /// The backend `build` would open.
    pub fn resolved_backend(&self) -> Backend {
        self.backend
            .or_else(|| Backend::from_path(&self.path))
            .unwrap_or(Backend::Json)
    }

    /// Open (or create) the shelf.
    pub fn build(self) -> Result<Shelf<V>> {
        validate_table_name(&self.table)?;
        let backend: AnyBackend = match self.resolved_backend() {
            Backend::Json if self.pretty => Box::new(JsonBackend::open_pretty(&self.path)?),
            Backend::Json => Box::new(JsonBackend::open(&self.path)?),
            Backend::Bincode => Box::new(BincodeBackend::open(&self.path)?),
            Backend::Sqlite => Box::new(SqliteBackend::open_with_table(&self.path, &self.table)?),
        };
        Ok(Shelf::with_policy(backend, self.policy))
    }
}

impl<V> std::fmt::Debug for ShelfBuilder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfBuilder")
            .field("path", &self.path)
            .field("backend", &self.backend)
            .field("policy", &self.policy)
            .field("pretty", &self.pretty)
            .field("table", &self.table)
            .finish()
    }
}
