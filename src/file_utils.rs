use chrono::Utc;
use log::{debug, warn};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::CleanupFailure;

// @module: Temp directory and run-scoped temp artifacts

// @struct: Process-wide temp directory
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    // @field: Directory every run allocates into
    dir: PathBuf,
}

impl TempWorkspace {
    /// Workspace rooted at `dir`, made absolute against the current directory.
    ///
    /// ffmpeg resolves relative concat entries against the list's directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            dir: std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf()),
        }
    }

    // @returns: Workspace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // @creates: Directory and parents if needed
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Unique path `<prefix>-<unix millis>-<random hex>.<ext>` inside the workspace
    pub fn unique_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::random();
        let extension = extension.trim_start_matches('.');
        self.dir
            .join(format!("{}-{}-{:08x}.{}", prefix, millis, suffix, extension))
    }

    /// Start a run scope that owns every temp file it allocates
    pub fn scope(&self) -> RunScope {
        RunScope {
            workspace: self.clone(),
            artifacts: Mutex::new(Vec::new()),
        }
    }
}

/// A temp file removed when the guard is released or dropped
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    released: bool,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now. A file that never got created is not a failure.
    pub fn release(mut self) -> Result<(), CleanupFailure> {
        self.released = true;
        remove_if_present(&self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(failure) = remove_if_present(&self.path) {
            warn!("Cleanup failure: {}", failure);
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), CleanupFailure> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted temp file {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(CleanupFailure {
            path: path.to_path_buf(),
            error,
        }),
    }
}

/// Owner of all temp artifacts of one pipeline invocation.
///
/// Everything allocated through the scope is deleted by `release`, or on drop
/// if the run unwinds before reaching it.
#[derive(Debug)]
pub struct RunScope {
    workspace: TempWorkspace,
    artifacts: Mutex<Vec<TempArtifact>>,
}

impl RunScope {
    /// Reserve a unique temp path owned by this scope
    pub fn allocate(&self, prefix: &str, extension: &str) -> PathBuf {
        let path = self.workspace.unique_path(prefix, extension);
        self.artifacts.lock().push(TempArtifact::new(path.clone()));
        path
    }

    /// Number of paths allocated so far
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every artifact, logging failures. Returns the number of failures.
    pub fn release(self) -> usize {
        self.release_all()
    }

    fn release_all(&self) -> usize {
        let artifacts = std::mem::take(&mut *self.artifacts.lock());
        let mut failures = 0;
        for artifact in artifacts {
            if let Err(failure) = artifact.release() {
                warn!("Cleanup failure: {}", failure);
                failures += 1;
            }
        }
        failures
    }
}

impl Drop for RunScope {
    fn drop(&mut self) {
        self.release_all();
    }
}
