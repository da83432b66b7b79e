//! Scratch directory that holds the repository clone for one operation.
//!
//! The directory is wiped before use, in case an earlier run crashed, and
//! removed again when the [`WorkspaceGuard`] returned by
//! [`Workspace::acquire`] goes out of scope. Two operations must not share a
//! fixed path; use [`Workspace::unique`] when they might run concurrently.

use crate::error::{AppConfigError, Result};
use aes_gcm::aead::OsRng;
use rand::RngCore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Directory name used by [`Workspace::in_project`].
pub const LEGACY_SCRATCH_DIR: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Use a fixed scratch path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The `.tmp` directory inside a project, as older releases used
    pub fn in_project(project_root: impl AsRef<Path>) -> Self {
        Self::at(project_root.as_ref().join(LEGACY_SCRATCH_DIR))
    }

    /// A fresh, randomly named directory under `base`
    pub fn unique(base: impl AsRef<Path>) -> Self {
        let mut suffix = [0u8; 6];
        OsRng.fill_bytes(&mut suffix);
        let name = format!(".appconfig-{}-{}", std::process::id(), hex::encode(suffix));
        Self::at(base.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail when the scratch path is `project_root` or one of its ancestors.
    ///
    /// [`acquire`](Self::acquire) wipes the scratch path, which would take the
    /// project with it. Both paths are compared after resolving symlinks on
    /// the part that exists.
    pub fn ensure_outside(&self, project_root: &Path) -> Result<()> {
        let scratch = resolve(&self.path)?;
        let project = resolve(project_root)?;
        if project.starts_with(&scratch) {
            return Err(AppConfigError::InvalidInput(format!(
                "scratch directory '{}' contains the project root '{}'",
                self.path.display(),
                project_root.display()
            )));
        }
        Ok(())
    }

    /// Wipe any leftover directory and create an empty one.
    pub fn acquire(&self) -> Result<WorkspaceGuard<'_>> {
        if self.path.exists() {
            debug!(path = %self.path.display(), "removing stale workspace");
            self.release()?;
        }
        fs::create_dir_all(&self.path).map_err(|e| AppConfigError::fs(&self.path, e))?;
        debug!(path = %self.path.display(), "workspace acquired");
        Ok(WorkspaceGuard { workspace: self })
    }

    /// Remove the directory. Succeeds when it is already gone.
    pub fn release(&self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "workspace released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppConfigError::fs(&self.path, e)),
        }
    }
}

/// Absolute form of `path`: `.` and `..` folded, the longest existing prefix
/// canonicalized, the rest appended as written.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| AppConfigError::fs(path, e))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            let mut resolved = real;
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }
}

/// Releases its workspace when dropped.
#[derive(Debug)]
pub struct WorkspaceGuard<'a> {
    workspace: &'a Workspace,
}

impl WorkspaceGuard<'_> {
    pub fn path(&self) -> &Path {
        self.workspace.path()
    }
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.workspace.release() {
            warn!(error = %e, "failed to clean up workspace");
        }
    }
}
