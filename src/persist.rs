//! Disk I/O helpers for the buffered backends: whole-file load and atomic
//! write.
//!
//! The rename-over approach is close to atomic on most platforms. On FAT32 or
//! network shares there are no hard guarantees. If that matters to you, keep
//! backups or use the SQLite backend.

use crate::error::{Error, Result};
use crate::serializer::{Serializer, Snapshot};
use std::io::Write;
use std::path::Path;

/// Reads and decodes the file at `path`. Returns `None` if the file does not
/// exist and an empty snapshot if it exists but is empty.
pub fn load<S: Serializer>(path: &Path, serializer: &S) -> Result<Option<Snapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e.to_string())),
    };
    if bytes.is_empty() {
        return Ok(Some(Snapshot::new()));
    }
    serializer.deserialize(&bytes).map(Some)
}

/// Write `bytes` to `<path>.tmp`, sync it, and rename over `path`. This avoids
/// leaving a half-written file if the process crashes mid-write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    let written = write_synced(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Io(e.to_string()));
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.tmp")),
        None => path.with_extension("tmp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::JsonSerializer;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(tmp_path(Path::new("db.json")), Path::new("db.json.tmp"));
        assert_eq!(tmp_path(Path::new("shelf")), Path::new("shelf.tmp"));
    }

    #[test]
    fn load_missing_is_none() {
        let path = std::env::temp_dir().join("json_shelf_unit_load_missing.json");
        let _ = std::fs::remove_file(&path);
        assert!(load(&path, &JsonSerializer::new()).unwrap().is_none());
    }

    #[test]
    fn atomic_write_leaves_no_tmp() {
        let path = std::env::temp_dir().join("json_shelf_unit_atomic.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!tmp_path(&path).exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn failed_write_removes_tmp() {
        // a non-empty directory at the target makes the final step fail
        let path = std::env::temp_dir().join("json_shelf_unit_atomic_dir.json");
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(matches!(atomic_write(&path, b"{}").unwrap_err(), Error::Io(_)));
        assert!(!tmp_path(&path).exists());
        assert!(path.join("occupied").is_dir());

        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn uncreatable_tmp_is_io() {
        let path = std::env::temp_dir()
            .join("json_shelf_unit_no_such_dir")
            .join("db.json");
        assert!(matches!(atomic_write(&path, b"{}").unwrap_err(), Error::Io(_)));
        assert!(!tmp_path(&path).exists());
    }
}
