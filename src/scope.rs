//! Scoped use: persist when a block of work finishes normally.
//!
//! Both helpers persist only on a normal exit. An `Err` from the closure or a
//! panic unwinding through a guard leaves durable state as it was at the last
//! persist, so half-applied changes are never written by the scope itself.

use crate::backend::MapBackend;
use crate::error::Error;
use crate::store::Shelf;
use std::ops::{Deref, DerefMut};
use tracing::warn;

impl<V, B: MapBackend> Shelf<V, B> {
    /// Run `f` against this shelf and persist if it returns `Ok`.
    ///
    /// If `f` fails its error is returned and nothing is persisted (the
    /// in-memory state of a buffered shelf still reflects whatever `f` did).
    /// If the persist itself fails, that error is returned instead of `f`'s
    /// output.
    ///
    /// ```rust,no_run
    /// use json_shelf::{Backend, Shelf};
    ///
    /// let mut db = Shelf::<String>::open(Backend::Json, "foo.json")?;
    /// db.scoped(|db| {
    ///     db.set("key", &"value".to_string())?;
    ///     db.contains("key")
    /// })?;
    /// # Ok::<(), json_shelf::Error>(())
    /// ```
    pub fn scoped<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let out = f(self)?;
        self.persist()?;
        Ok(out)
    }

    /// Borrow the shelf behind a guard that persists when dropped.
    ///
    /// Prefer [`ShelfGuard::finish`] to see persist errors; a failure during
    /// drop can only be logged.
    pub fn guard(&mut self) -> ShelfGuard<'_, V, B> {
        ShelfGuard {
            shelf: self,
            armed: true,
        }
    }
}

/// Persists its shelf when it goes out of scope, unless the thread is
/// panicking or [`abandon`](Self::abandon) was called.
///
/// Derefs to [`Shelf`] so you can call shelf methods directly on it.
pub struct ShelfGuard<'a, V, B: MapBackend> {
    shelf: &'a mut Shelf<V, B>,
    armed: bool,
}

impl<V, B: MapBackend> ShelfGuard<'_, V, B> {
    /// Persist now and disarm the guard, reporting any error.
    pub fn finish(mut self) -> crate::Result<()> {
        self.armed = false;
        self.shelf.persist()
    }

    /// Disarm the guard without persisting.
    pub fn abandon(mut self) {
        self.armed = false;
    }
}

impl<V, B: MapBackend> Deref for ShelfGuard<'_, V, B> {
    type Target = Shelf<V, B>;

    fn deref(&self) -> &Self::Target {
        self.shelf
    }
}

impl<V, B: MapBackend> DerefMut for ShelfGuard<'_, V, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.shelf
    }
}

impl<V, B: MapBackend> Drop for ShelfGuard<'_, V, B> {
    fn drop(&mut self) {
        if !self.armed || self.shelf.is_disposed() {
            return;
        }
        if std::thread::panicking() {
            warn!(path = %self.shelf.path().display(), "scope unwound by panic, not persisting");
            return;
        }
        if let Err(e) = self.shelf.persist() {
            warn!(path = %self.shelf.path().display(), error = %e, "persist on scope exit failed");
        }
    }
}

impl<V, B: MapBackend> std::fmt::Debug for ShelfGuard<'_, V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfGuard")
            .field("shelf", &*self.shelf)
            .field("armed", &self.armed)
            .finish()
    }
}
