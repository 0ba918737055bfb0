//! Transactional backend: one SQLite row per entry.
//!
//! Every mutation goes straight to the database inside an implicit
//! transaction that [`persist`](MapBackend::persist) commits. Values are
//! stored as compact JSON text.

use crate::backend::{Backend, MapBackend};
use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Rows, Statement};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "shelf";

/// Shelf backend delegating each operation to an embedded SQLite database.
pub struct SqliteBackend {
    path: PathBuf,
    // `None` once disposed.
    conn: Option<Connection>,
    sql: Queries,
}

// SQL text is built once per table name; table names are validated before
// they get here, so interpolation is safe.
struct Queries {
    select: String,
    exists: String,
    upsert: String,
    delete: String,
    count: String,
    keys: String,
    clear: String,
}

impl Queries {
    fn for_table(table: &str) -> Self {
        Self {
            select: format!("SELECT value FROM {table} WHERE key = ?1 LIMIT 1"),
            exists: format!("SELECT 1 FROM {table} WHERE key = ?1 LIMIT 1"),
            upsert: format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ),
            delete: format!("DELETE FROM {table} WHERE key = ?1"),
            count: format!("SELECT COUNT(*) FROM {table}"),
            keys: format!("SELECT key FROM {table} ORDER BY rowid"),
            clear: format!("DELETE FROM {table}"),
        }
    }
}

/// Check that `table` is a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid table name `{table}`")))
    }
}

impl SqliteBackend {
    /// Open (or create) the database at `path` using the default table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_table(path, DEFAULT_TABLE)
    }

    /// Open (or create) the database at `path`, storing entries in `table`.
    /// The table is created if it doesn't exist yet.
    pub fn open_with_table(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let path = path.as_ref().to_path_buf();

        let conn = Connection::open(&path)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ))?;
        // Tables created elsewhere may lack the primary key the upsert needs.
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {table}_key ON {table} (key)"
        ))
        .map_err(|e| match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                Error::CorruptData(format!("table `{table}` has duplicate keys: {e}"))
            }
            _ => Error::from(e),
        })?;
        debug!(path = %path.display(), table, "opened sqlite shelf");

        Ok(Self {
            path,
            conn: Some(conn),
            sql: Queries::for_table(table),
        })
    }

    /// `true` while mutations are waiting for the next persist.
    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(|c| !c.is_autocommit())
    }

    /// Lazily stream keys over a live cursor.
    ///
    /// Unlike [`MapBackend::iter_keys`], which materializes every key before
    /// returning, this keeps the statement open for as long as the returned
    /// [`KeyCursor`] lives. The cursor borrows the backend, so no mutation is
    /// possible on this handle until it is dropped:
    ///
    /// ```compile_fail
    /// use json_shelf::{MapBackend, SqliteBackend};
    ///
    /// let mut db = SqliteBackend::open("cursor.db").unwrap();
    /// let mut cursor = db.stream_keys().unwrap();
    /// for key in cursor.keys().unwrap() {
    ///     db.delete(&key.unwrap()).unwrap(); // cannot borrow `db` as mutable
    /// }
    /// ```
    pub fn stream_keys(&self) -> Result<KeyCursor<'_>> {
        let stmt = self.conn()?.prepare(&self.sql.keys)?;
        Ok(KeyCursor { stmt })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::UseAfterDispose)
    }

    // Open a transaction if the connection is in autocommit mode.
    fn begin(&self) -> Result<&Connection> {
        let conn = self.conn()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(conn)
    }
}

impl MapBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Value> {
        let mut stmt = self.conn()?.prepare_cached(&self.sql.select)?;
        let raw: Option<String> = stmt
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        let raw = raw.ok_or_else(|| Error::NotFound(key.to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::CorruptData(format!("value for key `{key}`: {e}")))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let encoded =
            serde_json::to_string(&value).map_err(|e| Error::Unserializable(e.to_string()))?;
        let conn = self.begin()?;
        conn.prepare_cached(&self.sql.upsert)?
            .execute(params![key, encoded])?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let conn = self.begin()?;
        let removed = conn.prepare_cached(&self.sql.delete)?.execute(params![key])?;
        if removed == 0 {
            return Err(Error::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let mut stmt = self.conn()?.prepare_cached(&self.sql.exists)?;
        Ok(stmt.exists(params![key])?)
    }

    // Materialized up front so no cursor is left open across caller code.
    // Use `stream_keys` for the lazy variant.
    fn iter_keys(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + '_>> {
        let keys = self.keys()?;
        Ok(Box::new(keys.into_iter().map(Ok)))
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare_cached(&self.sql.keys)?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn len(&self) -> Result<usize> {
        let mut stmt = self.conn()?.prepare_cached(&self.sql.count)?;
        let n: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    fn clear(&mut self) -> Result<()> {
        let conn = self.begin()?;
        conn.execute(&self.sql.clear, [])?;
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let conn = self.conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
            debug!(path = %self.path.display(), "committed");
        }
        Ok(())
    }

    fn dispose(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if !conn.is_autocommit() {
            warn!(path = %self.path.display(), "disposing sqlite shelf with uncommitted changes, rolling back");
        }
        conn.close().map_err(|(_, e)| Error::from(e))?;
        debug!(path = %self.path.display(), "disposed");
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.conn.is_none()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> Backend {
        Backend::Sqlite
    }
}

impl Drop for SqliteBackend {
    fn drop(&mut self) {
        if self.in_transaction() {
            warn!(path = %self.path.display(), "dropping sqlite shelf with uncommitted changes");
        }
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

/// A prepared key query that stays open while it lives.
///
/// Obtained from [`SqliteBackend::stream_keys`]. Call [`keys`](Self::keys) to
/// walk the result set; dropping the cursor finalizes the statement.
pub struct KeyCursor<'conn> {
    stmt: Statement<'conn>,
}

impl KeyCursor<'_> {
    /// Run the query and stream keys in storage order.
    pub fn keys(&mut self) -> Result<KeyStream<'_>> {
        let rows = self.stmt.query([])?;
        Ok(KeyStream { rows })
    }
}

impl std::fmt::Debug for KeyCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCursor").finish_non_exhaustive()
    }
}

/// Iterator over a live key result set.
pub struct KeyStream<'stmt> {
    rows: Rows<'stmt>,
}

impl Iterator for KeyStream<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rows.next() {
            Ok(Some(row)) => Some(row.get(0).map_err(Error::from)),
            Ok(None) => None,
            Err(e) => Some(Err(Error::from(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        assert!(validate_table_name("shelf").is_ok());
        assert!(validate_table_name("_kv_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2kv").is_err());
        assert!(validate_table_name("kv; DROP TABLE x").is_err());
    }

    #[test]
    fn mutations_open_a_transaction_and_persist_closes_it() {
        let path = std::env::temp_dir().join("json_shelf_unit_sqlite_tx.db");
        let _ = std::fs::remove_file(&path);
        let mut db = SqliteBackend::open(&path).unwrap();
        assert!(!db.in_transaction());
        db.set("a", serde_json::json!(1)).unwrap();
        assert!(db.in_transaction());
        db.persist().unwrap();
        assert!(!db.in_transaction());
        db.persist().unwrap();
        db.dispose().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
