//! # Bundles
//!
//! A bundle is the set of configuration files one app pulls from, or pushes
//! to, the configuration repository. Files live in two subtrees:
//!
//! ```text
//! <repo>/<bundle_id>/...   files specific to one app
//! <repo>/common/...        files shared by every app
//! ```
//!
//! Each subtree mirrors the relative paths given in the file lists, and the
//! same relative path is used under the local project root.

use crate::error::{AppConfigError, Result};
use std::path::{Component, Path, PathBuf};

pub const COMMON_DIR: &str = "common";
pub const DEFAULT_REF: &str = "master";

/// Everything needed to run one pull or push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSpec {
    pub bundle_id: String,
    pub bundled_files: Vec<PathBuf>,
    pub bundled_encrypted_files: Vec<PathBuf>,
    pub common_files: Vec<PathBuf>,
    pub common_encrypted_files: Vec<PathBuf>,
    pub repository_url: String,
    pub git_ref: String,
    pub passphrase: String,
    pub project_root: PathBuf,
}

impl BundleSpec {
    pub fn new(bundle_id: impl Into<String>, repository_url: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            bundled_files: Vec::new(),
            bundled_encrypted_files: Vec::new(),
            common_files: Vec::new(),
            common_encrypted_files: Vec::new(),
            repository_url: repository_url.into(),
            git_ref: DEFAULT_REF.to_string(),
            passphrase: String::new(),
            project_root: PathBuf::from("."),
        }
    }

    pub fn has_encrypted_files(&self) -> bool {
        !self.bundled_encrypted_files.is_empty() || !self.common_encrypted_files.is_empty()
    }

    /// File lists in transfer order, with their category.
    pub fn categories(&self) -> [(FileCategory, &[PathBuf]); 4] {
        [
            (FileCategory::Bundled, self.bundled_files.as_slice()),
            (FileCategory::BundledEncrypted, self.bundled_encrypted_files.as_slice()),
            (FileCategory::Common, self.common_files.as_slice()),
            (FileCategory::CommonEncrypted, self.common_encrypted_files.as_slice()),
        ]
    }

    /// Check the invariants that must hold before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.repository_url.trim().is_empty() {
            return Err(AppConfigError::InvalidInput(
                "git repository URL is required".into(),
            ));
        }
        if self.git_ref.trim().is_empty() {
            return Err(AppConfigError::InvalidInput("git ref must not be empty".into()));
        }

        let bundle = Path::new(&self.bundle_id);
        let mut components = bundle.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(AppConfigError::InvalidInput(format!(
                    "bundle id '{}' must be a single path segment",
                    self.bundle_id
                )))
            }
        }

        if self.has_encrypted_files() && self.passphrase.is_empty() {
            return Err(AppConfigError::InvalidInput(
                "a passphrase is required when encrypted files are listed".into(),
            ));
        }

        for (category, files) in self.categories() {
            for file in files {
                validate_relative(file).map_err(|reason| {
                    AppConfigError::InvalidInput(format!(
                        "{} entry '{}' {reason}",
                        category.label(),
                        file.display()
                    ))
                })?;
            }
        }

        Ok(())
    }
}

fn validate_relative(path: &Path) -> std::result::Result<(), &'static str> {
    if path.as_os_str().is_empty() {
        return Err("is empty");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("must not contain '..'"),
            Component::RootDir | Component::Prefix(_) => return Err("must be relative"),
        }
    }
    Ok(())
}

/// The four file lists of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Bundled,
    BundledEncrypted,
    Common,
    CommonEncrypted,
}

impl FileCategory {
    pub fn is_encrypted(self) -> bool {
        matches!(self, Self::BundledEncrypted | Self::CommonEncrypted)
    }

    pub fn is_common(self) -> bool {
        matches!(self, Self::Common | Self::CommonEncrypted)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bundled => "bundled_files",
            Self::BundledEncrypted => "bundled_encrypted_files",
            Self::Common => "common_files",
            Self::CommonEncrypted => "common_encrypted_files",
        }
    }
}

/// Which way files flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Repository to project
    Pull,
    /// Project to repository
    Push,
}

/// One planned file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub encrypted: bool,
}

pub fn bundle_root(repo_root: &Path, bundle_id: &str) -> PathBuf {
    repo_root.join(bundle_id)
}

pub fn common_root(repo_root: &Path) -> PathBuf {
    repo_root.join(COMMON_DIR)
}

/// Compute every copy a pull or push performs, in transfer order.
pub fn plan_transfers(spec: &BundleSpec, repo_root: &Path, direction: Direction) -> Vec<FileTransfer> {
    let bundled = bundle_root(repo_root, &spec.bundle_id);
    let common = common_root(repo_root);

    let mut plan = Vec::new();
    for (category, files) in spec.categories() {
        let root = if category.is_common() { &common } else { &bundled };
        for file in files {
            let repo_side = root.join(file);
            let project_side = spec.project_root.join(file);
            let (source, destination) = match direction {
                Direction::Pull => (repo_side, project_side),
                Direction::Push => (project_side, repo_side),
            };
            plan.push(FileTransfer {
                source,
                destination,
                encrypted: category.is_encrypted(),
            });
        }
    }
    plan
}
