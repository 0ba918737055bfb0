//! Persistent key-value shelf with interchangeable backends.
//!
//! One mapping contract ([`MapBackend`]: get / set / delete / contains /
//! keys / len / persist / dispose), three ways to store it:
//!
//! * [`Backend::Json`]: everything in memory, written as one JSON document
//!   on persist.
//! * [`Backend::Bincode`]: same, written as an opaque binary blob.
//! * [`Backend::Sqlite`]: one row per entry, each write sent to SQLite right
//!   away and committed on persist.
//!
//! ```rust,no_run
//! use json_shelf::{Backend, Shelf};
//!
//! let mut db = Shelf::<String>::open(Backend::Json, "foo.json").unwrap();
//! db.scoped(|db| db.set("key", &"value".to_string())).unwrap();
//! db.dispose().unwrap();
//!
//! let db = Shelf::<String>::open(Backend::Json, "foo.json").unwrap();
//! assert_eq!(db.get("key").unwrap(), "value");
//! ```
//!
//! **Single-process only.** If multiple processes open the same file the
//! flat-file backends will clobber each other. Nothing here locks across
//! processes.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod buffered;
pub mod error;
pub mod flush;
pub mod persist;
pub mod scope;
pub mod serializer;
pub mod sqlite;
pub mod store;

pub use backend::{Backend, MapBackend};
pub use buffered::{BincodeBackend, BufferedBackend, JsonBackend};
pub use error::{Error, Result};
pub use flush::FlushPolicy;
pub use scope::ShelfGuard;
pub use serializer::{BincodeSerializer, JsonSerializer, Serializer, Snapshot};
pub use sqlite::{KeyCursor, KeyStream, SqliteBackend};
pub use store::{AnyBackend, Shelf, ShelfBuilder};
