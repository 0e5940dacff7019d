//! Crash-safe file primitives used by the file-backed store.
//!
//! Records are replaced with write-to-temp-then-rename so readers never see a
//! torn record. Lock files are created with `create_new`, which the kernel
//! guarantees succeeds for exactly one caller; the same holds for renaming a
//! file away and for hard-linking onto a missing name.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{PersistenceError, Result};

/// Creates `path` and its missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|source| PersistenceError::DirectoryError {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Replaces the contents of `path` atomically.
///
/// The data is written and synced to a temporary file in the same directory,
/// then renamed over the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) => {
            ensure_dir(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let write_err = |source: std::io::Error| PersistenceError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp_file.write_all(data).map_err(write_err)?;
    temp_file.as_file().sync_all().map_err(write_err)?;
    temp_file.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

/// Creates `path` holding `data` only if it does not exist yet.
///
/// Returns `Ok(false)` when the file already exists; nothing is written then.
pub fn create_exclusive(path: &Path, data: &[u8]) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(source) => {
            return Err(PersistenceError::WriteError {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|source| PersistenceError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(true)
}

/// Renames `from` to `to`. Returns `Ok(false)` if `from` no longer exists.
///
/// Of several callers renaming the same file away, only one succeeds.
pub fn rename_if_exists(from: &Path, to: &Path) -> Result<bool> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PersistenceError::WriteError {
            path: from.to_path_buf(),
            source,
        }),
    }
}

/// Hard-links `existing` at `link` unless `link` already exists.
///
/// Returns `Ok(false)` when `link` exists; it is never replaced.
pub fn link_exclusive(existing: &Path, link: &Path) -> Result<bool> {
    match fs::hard_link(existing, link) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(source) => Err(PersistenceError::WriteError {
            path: link.to_path_buf(),
            source,
        }),
    }
}

/// Reads a file to a string, returning `None` if it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::ReadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads and deserializes JSON, returning `None` if the file does not exist.
pub fn read_json_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_optional(path)? {
        Some(data) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

/// Removes a file; a file that is already gone is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PersistenceError::WriteError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
