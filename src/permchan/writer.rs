//! Crash-safe snapshot writes.
//!
//! The snapshot is written to `<path>.new.<unix-time>`, synced, then renamed
//! over `path`. A crash or error at any point leaves the old snapshot intact.

use crate::error::PersistError;
use chrono::Utc;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Destination for encoded snapshots.
pub trait SnapshotWriter: Send {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), PersistError>;
}

/// Temp file + fsync + rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicFileWriter;

impl SnapshotWriter for AtomicFileWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), PersistError> {
        write_atomic(path, contents, Utc::now().timestamp())
    }
}

/// Sibling temporary path for a snapshot write.
pub fn temp_path_for(path: &Path, token: i64) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".new.{token}"));
    PathBuf::from(name)
}

/// Write `contents` to `path` atomically. An empty path is a no-op.
pub fn write_atomic(path: &Path, contents: &[u8], token: i64) -> Result<(), PersistError> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    let temp = stage(path, contents, token)?;
    commit(&temp, path)?;
    debug!(path = %path.display(), bytes = contents.len(), "Snapshot written");
    Ok(())
}

/// Write and sync the temporary file. `path` itself is not touched.
pub(crate) fn stage(path: &Path, contents: &[u8], token: i64) -> Result<PathBuf, PersistError> {
    let temp = temp_path_for(path, token);
    let file = File::create(&temp).map_err(|source| PersistError::Open {
        path: temp.clone(),
        source,
    })?;

    let write_err = |source| PersistError::Write {
        path: temp.clone(),
        source,
    };
    let mut writer = BufWriter::new(file);
    writer.write_all(contents).map_err(write_err)?;
    writer.flush().map_err(write_err)?;
    writer.get_ref().sync_all().map_err(write_err)?;
    Ok(temp)
}

/// Move a staged file over the destination.
pub(crate) fn commit(temp: &Path, path: &Path) -> Result<(), PersistError> {
    // Windows cannot rename over an existing file.
    #[cfg(windows)]
    let _ = fs::remove_file(path);

    fs::rename(temp, path).map_err(|source| PersistError::Rename {
        from: temp.to_path_buf(),
        to: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/etc/slircd/perm.conf"), 42),
            PathBuf::from("/etc/slircd/perm.conf.new.42")
        );
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("perm.conf");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new contents", 7).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new contents");
        assert!(!temp_path_for(&path, 7).exists());
    }

    #[test]
    fn empty_path_is_disabled() {
        assert!(write_atomic(Path::new(""), b"ignored", 1).is_ok());
    }

    #[test]
    fn open_failure_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("perm.conf");
        let err = write_atomic(&path, b"data", 1).unwrap_err();
        assert_eq!(err.error_code(), "open_failed");
        assert!(!path.exists());
    }

    #[test]
    fn crash_before_rename_keeps_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("perm.conf");
        fs::write(&path, "original snapshot\n").unwrap();

        let temp = stage(&path, b"half-finished replacement", 9).unwrap();
        // Simulated crash: commit never runs.
        assert_eq!(fs::read(&path).unwrap(), b"original snapshot\n");
        assert_eq!(fs::read(&temp).unwrap(), b"half-finished replacement");
    }

    #[test]
    fn rename_failure_keeps_original() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = dir.path().join("perm.conf");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "original").unwrap();

        let err = write_atomic(&path, b"data", 3).unwrap_err();
        assert_eq!(err.error_code(), "rename_failed");
        assert_eq!(fs::read_to_string(path.join("keep")).unwrap(), "original");
        assert!(temp_path_for(&path, 3).exists());
    }
}
