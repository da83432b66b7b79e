//! # Sync Engine
//!
//! Drives a pull or push from start to finish:
//!
//! ```text
//! Init -> Cloned -> Transferred -> [Committed] -> Done
//!   \________\___________\______________\-----> Aborted
//! ```
//!
//! `Committed` only happens on a push that created a commit. Any error moves
//! the run to `Aborted`.
//! The workspace is released on the way into either terminal state. Files
//! already written to the project are not rolled back.

use crate::bundle::{plan_transfers, BundleSpec, Direction, FileTransfer};
use crate::crypto::{ContainerFormat, Passphrase};
use crate::error::{AppConfigError, Result};
use crate::git::{repo_name, Checkout, GitClient};
use crate::report::{ConsoleReporter, Operation, Reporter};
use crate::workspace::Workspace;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const ORIGIN: &str = "origin";

/// Commit message used by push
pub fn commit_message(bundle_id: &str) -> String {
    format!("[AppConfig] Updating files for {bundle_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    Cloned,
    Transferred,
    Committed,
    Done,
    Aborted,
}

/// What a finished operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub operation: Operation,
    pub state: SyncState,
    pub files: usize,
    pub branch_created: bool,
    pub committed: bool,
    /// States entered after `Init`, in order
    pub transitions: Vec<SyncState>,
}

impl SyncOutcome {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            state: SyncState::Init,
            files: 0,
            branch_created: false,
            committed: false,
            transitions: Vec::new(),
        }
    }

    fn advance(&mut self, next: SyncState) {
        debug!(operation = ?self.operation, from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.transitions.push(next);
    }
}

pub struct SyncEngine<G: GitClient> {
    git: G,
    workspace: Workspace,
    reporter: Box<dyn Reporter>,
    format: ContainerFormat,
}

impl<G: GitClient> SyncEngine<G> {
    pub fn new(git: G, workspace: Workspace) -> Self {
        Self {
            git,
            workspace,
            reporter: Box::new(ConsoleReporter),
            format: ContainerFormat::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Container format for files encrypted by push
    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Fetch the bundle from the repository into the project.
    pub fn pull(&self, spec: &BundleSpec) -> Result<SyncOutcome> {
        spec.validate()?;
        self.workspace.ensure_outside(&spec.project_root)?;
        self.reporter.report(Operation::Pull, spec);

        let mut outcome = SyncOutcome::new(Operation::Pull);
        let result = self.run_pull(spec, &mut outcome);
        finish(outcome, result)
    }

    /// Publish the project's files to the repository.
    pub fn push(&self, spec: &BundleSpec) -> Result<SyncOutcome> {
        spec.validate()?;
        self.workspace.ensure_outside(&spec.project_root)?;
        self.reporter.report(Operation::Push, spec);

        let mut outcome = SyncOutcome::new(Operation::Push);
        let result = self.run_push(spec, &mut outcome);
        finish(outcome, result)
    }

    fn run_pull(&self, spec: &BundleSpec, outcome: &mut SyncOutcome) -> Result<()> {
        let passphrase = passphrase_for(spec)?;
        let guard = self.workspace.acquire()?;

        let dest = guard.path().join(repo_name(&spec.repository_url));
        let checkout = self.git.clone_repo(&spec.repository_url, &dest)?;
        checkout.checkout(&spec.git_ref)?;
        outcome.advance(SyncState::Cloned);

        for transfer in plan_transfers(spec, checkout.root(), Direction::Pull) {
            if transfer.encrypted {
                decrypt_file(&transfer, require(passphrase.as_ref())?)?;
            } else {
                copy_file(&transfer)?;
            }
            outcome.files += 1;
        }
        outcome.advance(SyncState::Transferred);
        Ok(())
    }

    fn run_push(&self, spec: &BundleSpec, outcome: &mut SyncOutcome) -> Result<()> {
        let passphrase = passphrase_for(spec)?;
        let guard = self.workspace.acquire()?;

        let dest = guard.path().join(repo_name(&spec.repository_url));
        let checkout = self.git.clone_repo(&spec.repository_url, &dest)?;
        match checkout.checkout_branch(&spec.git_ref) {
            Ok(()) => {}
            Err(AppConfigError::RefNotFound(_)) => {
                info!(branch = %spec.git_ref, "branch not found on remote, creating it");
                checkout.create_branch(&spec.git_ref)?;
                outcome.branch_created = true;
            }
            Err(e) => return Err(e),
        }
        outcome.advance(SyncState::Cloned);

        for transfer in plan_transfers(spec, checkout.root(), Direction::Push) {
            copy_file(&transfer)?;
            if transfer.encrypted {
                encrypt_in_place(&transfer.destination, require(passphrase.as_ref())?, self.format)?;
            }
            outcome.files += 1;
        }
        outcome.advance(SyncState::Transferred);

        checkout.stage_all()?;
        outcome.committed = checkout.commit(&commit_message(&spec.bundle_id))?;
        if outcome.committed {
            outcome.advance(SyncState::Committed);
        } else {
            info!("repository already up to date, nothing to commit");
        }

        checkout.push(ORIGIN, &spec.git_ref)?;
        Ok(())
    }
}

fn finish(mut outcome: SyncOutcome, result: Result<()>) -> Result<SyncOutcome> {
    match result {
        Ok(()) => {
            outcome.advance(SyncState::Done);
            info!(operation = ?outcome.operation, files = outcome.files, "sync complete");
            Ok(outcome)
        }
        Err(e) => {
            outcome.advance(SyncState::Aborted);
            warn!(operation = ?outcome.operation, error = %e, "sync aborted");
            Err(e)
        }
    }
}

fn passphrase_for(spec: &BundleSpec) -> Result<Option<Passphrase>> {
    if spec.has_encrypted_files() {
        Passphrase::new(spec.passphrase.as_str()).map(Some)
    } else {
        Ok(None)
    }
}

fn require(passphrase: Option<&Passphrase>) -> Result<&Passphrase> {
    passphrase.ok_or_else(|| {
        AppConfigError::InvalidInput("a passphrase is required for encrypted files".into())
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppConfigError::fs(parent, e))?;
    }
    Ok(())
}

fn copy_file(transfer: &FileTransfer) -> Result<()> {
    debug!(
        source = %transfer.source.display(),
        destination = %transfer.destination.display(),
        "copying"
    );
    if !transfer.source.is_file() {
        return Err(AppConfigError::fs(
            &transfer.source,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    ensure_parent(&transfer.destination)?;
    fs::copy(&transfer.source, &transfer.destination)
        .map_err(|e| AppConfigError::fs(&transfer.destination, e))?;
    Ok(())
}

fn decrypt_file(transfer: &FileTransfer, passphrase: &Passphrase) -> Result<()> {
    debug!(
        source = %transfer.source.display(),
        destination = %transfer.destination.display(),
        "decrypting"
    );
    let container = fs::read(&transfer.source).map_err(|e| AppConfigError::fs(&transfer.source, e))?;
    let plaintext = passphrase
        .decrypt(&container)
        .map_err(|e| e.for_target(transfer.source.display().to_string()))?;

    ensure_parent(&transfer.destination)?;
    fs::write(&transfer.destination, plaintext)
        .map_err(|e| AppConfigError::fs(&transfer.destination, e))?;
    Ok(())
}

fn encrypt_in_place(path: &Path, passphrase: &Passphrase, format: ContainerFormat) -> Result<()> {
    let plaintext = fs::read(path).map_err(|e| AppConfigError::fs(path, e))?;
    if Passphrase::is_encrypted(&plaintext) {
        warn!(path = %path.display(), "file already looks encrypted, encrypting again");
    }
    let container = passphrase
        .encrypt_with(&plaintext, format)
        .map_err(|e| e.for_target(path.display().to_string()))?;
    fs::write(path, container).map_err(|e| AppConfigError::fs(path, e))?;
    debug!(path = %path.display(), %format, "encrypted");
    Ok(())
}
