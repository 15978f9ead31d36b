//! Request-scoped scratch directories for the document flows.
//!
//! The directory is removed when the guard drops, whether the conversion
//! succeeded, failed, or panicked.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(label: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("media-ops-{label}-"))
            .tempdir()?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created scratch directory");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.path.join(name);
        fs::write(&target, bytes)?;
        Ok(target)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path.join(name))?)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "removed scratch directory"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory"),
            }
        }
    }
}
