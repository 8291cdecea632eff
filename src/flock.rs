use std::{
    fs::File,
    path::{Path, PathBuf},
};

use fs4::fs_std::FileExt;
use log::debug;
use thiserror::Error;

/// An exclusive advisory lock held until the value is dropped.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

#[derive(Error, Debug)]
#[error("Could not lock {}: {source}", path.display())]
pub struct Error {
    path: PathBuf,
    source: std::io::Error,
}

impl FileLock {
    /// Blocks until the lock on `path` is acquired, creating the file if needed.
    pub fn new(path: &Path) -> Result<Self, Error> {
        let error = |source| Error {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(error)?;
        debug!("Acquiring a lock on {}", path.display());
        FileExt::lock_exclusive(&file).map_err(error)?;
        debug!("Acquired a lock on {}", path.display());
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
