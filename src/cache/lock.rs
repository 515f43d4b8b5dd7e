//! Cross-process lock around index builds

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::{CharFinderError, Result};

/// Exclusive advisory lock on a lock file, released when dropped.
///
/// Only one process rebuilds and stores the index at a time; the others wait
/// and then find the freshly stored index.
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    /// Block until the lock at `path` is acquired, creating the file if needed
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CharFinderError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CharFinderError::io(path, e))?;

        tracing::debug!("Waiting for build lock {}", path.display());
        FileExt::lock_exclusive(&file).map_err(|e| CharFinderError::io(path, e))?;
        tracing::debug!("Acquired build lock {}", path.display());

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
