//! Buffered backends: the whole shelf lives in memory and is written out in
//! one go on [`persist`](crate::MapBackend::persist).

use crate::backend::{Backend, MapBackend};
use crate::error::{Error, Result};
use crate::persist::{atomic_write, load};
use crate::serializer::{BincodeSerializer, JsonSerializer, Serializer, Snapshot};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Buffered backend writing one JSON document.
pub type JsonBackend = BufferedBackend<JsonSerializer>;

/// Buffered backend writing an opaque bincode blob.
pub type BincodeBackend = BufferedBackend<BincodeSerializer>;

/// In-memory snapshot flushed wholesale to a single file.
///
/// The snapshot is the only source of truth between loads and persists: reads
/// and writes never touch the disk, and anything written after the last
/// successful [`persist`](MapBackend::persist) is lost if the handle is
/// dropped or disposed.
pub struct BufferedBackend<S> {
    path: PathBuf,
    serializer: S,
    kind: Backend,
    // `None` once disposed.
    snapshot: Option<Snapshot>,
    dirty: bool,
}

impl BufferedBackend<JsonSerializer> {
    /// Open (or create) a compact JSON shelf at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_serializer(path, JsonSerializer::new(), Backend::Json)
    }

    /// Open (or create) a pretty-printed JSON shelf at `path`.
    pub fn open_pretty(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_serializer(path, JsonSerializer::pretty(), Backend::Json)
    }
}

impl BufferedBackend<BincodeSerializer> {
    /// Open (or create) a bincode shelf at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_serializer(path, BincodeSerializer::new(), Backend::Bincode)
    }
}

impl<S: Serializer> BufferedBackend<S> {
    /// Open with an arbitrary serializer. `kind` is reported by
    /// [`MapBackend::kind`].
    ///
    /// A missing file is created right away with an empty snapshot, so a
    /// freshly opened shelf always has a reloadable backing file.
    pub fn with_serializer(path: impl AsRef<Path>, serializer: S, kind: Backend) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut backend = Self {
            path,
            serializer,
            kind,
            snapshot: None,
            dirty: false,
        };

        match load(&backend.path, &backend.serializer)? {
            Some(snapshot) => {
                debug!(path = %backend.path.display(), backend = %kind, entries = snapshot.len(), "loaded snapshot");
                backend.snapshot = Some(snapshot);
            }
            None => {
                debug!(path = %backend.path.display(), backend = %kind, "no backing file, creating empty shelf");
                backend.snapshot = Some(Snapshot::new());
                backend.write_out()?;
            }
        }
        Ok(backend)
    }

    /// `true` when there are changes that the next persist would write.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn live(&self) -> Result<&Snapshot> {
        self.snapshot.as_ref().ok_or(Error::UseAfterDispose)
    }

    fn live_mut(&mut self) -> Result<&mut Snapshot> {
        self.snapshot.as_mut().ok_or(Error::UseAfterDispose)
    }

    fn write_out(&mut self) -> Result<()> {
        let snapshot = self.live()?;
        let bytes = self.serializer.serialize(snapshot)?;
        atomic_write(&self.path, &bytes)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), bytes = bytes.len(), "persisted snapshot");
        self.dirty = false;
        Ok(())
    }
}

impl<S: Serializer> MapBackend for BufferedBackend<S> {
    fn get(&self, key: &str) -> Result<Value> {
        self.live()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.live_mut()?.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        match self.live_mut()?.shift_remove(key) {
            Some(_) => {
                self.dirty = true;
                Ok(())
            }
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.live()?.contains_key(key))
    }

    fn iter_keys(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        Ok(Box::new(self.live()?.keys().map(|k| Ok(k.clone()))))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.live()?.len())
    }

    fn clear(&mut self) -> Result<()> {
        let snapshot = self.live_mut()?;
        if !snapshot.is_empty() {
            snapshot.clear();
            self.dirty = true;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        self.write_out()
    }

    fn dispose(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            if self.dirty {
                warn!(path = %self.path.display(), entries = snapshot.len(), "disposing shelf with unsaved changes");
            }
            debug!(path = %self.path.display(), "disposed");
        }
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.snapshot.is_none()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> Backend {
        self.kind
    }
}

impl<S> Drop for BufferedBackend<S> {
    fn drop(&mut self) {
        if self.dirty && self.snapshot.is_some() {
            warn!(path = %self.path.display(), "dropping shelf with unsaved changes");
        }
    }
}

impl<S> std::fmt::Debug for BufferedBackend<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedBackend")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("entries", &self.snapshot.as_ref().map(|s| s.len()))
            .field("dirty", &self.dirty)
            .finish()
    }
}
