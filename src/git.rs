//! Git plumbing used by the sync engine.
//!
//! The engine only talks to [`GitClient`] and [`Checkout`]; [`Git2Client`]
//! is the libgit2-backed implementation used by the binary.

use crate::error::{AppConfigError, Result};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, CredentialType, FetchOptions, IndexAddOption, PushOptions, RemoteCallbacks,
    Repository, Signature,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FALLBACK_NAME: &str = "AppConfig";
const FALLBACK_EMAIL: &str = "appconfig@localhost";

/// Something that can produce a working copy of a remote repository.
pub trait GitClient {
    type Checkout: Checkout;

    /// Clone `url` into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<Self::Checkout>;
}

/// A cloned working copy.
pub trait Checkout {
    /// Working directory root
    fn root(&self) -> &Path;

    /// Check out a branch, tag or commit. Fails with `RefNotFound` when the
    /// reference does not resolve.
    fn checkout(&self, reference: &str) -> Result<()>;

    /// Like [`Checkout::checkout`], but only accepts branches.
    fn checkout_branch(&self, name: &str) -> Result<()>;

    /// Create a local branch at HEAD and switch to it.
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Stage every change in the working directory.
    fn stage_all(&self) -> Result<()>;

    /// Commit the index. Returns `false` when there was nothing to commit.
    fn commit(&self, message: &str) -> Result<bool>;

    /// Push HEAD to `refs/heads/<reference>` on `remote`.
    fn push(&self, remote: &str, reference: &str) -> Result<()>;
}

/// [`GitClient`] backed by libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

impl GitClient for Git2Client {
    type Checkout = GitCheckout;

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<GitCheckout> {
        info!(url, dest = %dest.display(), "cloning configuration repository");

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(remote_callbacks());

        let repo = RepoBuilder::new().fetch_options(fetch).clone(url, dest)?;
        Ok(GitCheckout {
            repo,
            root: dest.to_path_buf(),
        })
    }
}

/// A libgit2 working copy.
pub struct GitCheckout {
    repo: Repository,
    root: PathBuf,
}

impl GitCheckout {
    /// Open an existing working copy
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::open(path.as_ref())?;
        Ok(Self {
            repo,
            root: path.as_ref().to_path_buf(),
        })
    }

    /// Name of the checked-out branch, if HEAD is attached
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if head.is_branch() {
            Ok(head.shorthand().map(str::to_string))
        } else {
            Ok(None)
        }
    }

    fn switch_to(&self, refname: &str) -> Result<()> {
        let object = self.repo.revparse_single(refname)?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().force()))?;
        self.repo.set_head(refname)?;
        Ok(())
    }

    /// Switch to a local branch, creating it from `origin/<name>` if needed.
    fn try_branch(&self, name: &str) -> Result<bool> {
        if self.repo.find_branch(name, BranchType::Local).is_ok() {
            self.switch_to(&format!("refs/heads/{name}"))?;
            return Ok(true);
        }

        let upstream = format!("origin/{name}");
        let remote = match self.repo.find_branch(&upstream, BranchType::Remote) {
            Ok(remote) => remote,
            Err(_) => return Ok(false),
        };
        let commit = remote.get().peel_to_commit()?;
        let mut local = self.repo.branch(name, &commit, false)?;
        local.set_upstream(Some(upstream.as_str()))?;
        self.switch_to(&format!("refs/heads/{name}"))?;
        Ok(true)
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }
}

impl Checkout for GitCheckout {
    fn root(&self) -> &Path {
        &self.root
    }

    fn checkout(&self, reference: &str) -> Result<()> {
        if self.try_branch(reference)? {
            debug!(reference, "checked out branch");
            return Ok(());
        }

        let object = self
            .repo
            .revparse_single(reference)
            .map_err(|_| AppConfigError::RefNotFound(reference.to_string()))?;
        let commit = object.peel_to_commit()?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().force()))?;
        self.repo.set_head_detached(commit.id())?;
        debug!(reference, commit = %commit.id(), "checked out detached HEAD");
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        if self.try_branch(name)? {
            Ok(())
        } else {
            Err(AppConfigError::RefNotFound(name.to_string()))
        }
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.branch(name, &head, false)?;
        self.switch_to(&format!("refs/heads/{name}"))?;
        info!(branch = name, "created local branch");
        Ok(())
    }

    fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<bool> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(false);
            }
        }

        let sig = self.signature()?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let id = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        info!(commit = %id, "committed configuration changes");
        Ok(true)
    }

    fn push(&self, remote: &str, reference: &str) -> Result<()> {
        let head = self.repo.head()?;
        let source = head.name().unwrap_or("HEAD").to_string();
        let target = format!("refs/heads/{reference}");
        let refspec = format!("{source}:{target}");

        let rejection: RefCell<Option<String>> = RefCell::new(None);
        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                *rejection.borrow_mut() = Some(format!("{refname}: {message}"));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let mut origin = self.repo.find_remote(remote)?;
        info!(remote, refspec = %refspec, "pushing configuration changes");
        origin.push(&[refspec.as_str()], Some(&mut options))?;
        drop(options);

        match rejection.into_inner() {
            Some(message) => Err(AppConfigError::PushRejected {
                reference: target,
                message,
            }),
            None => Ok(()),
        }
    }
}

/// Credentials from the SSH agent, git credential helpers, or libgit2 defaults.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = CredentialAttempts::default();
    callbacks.credentials(move |url, username, allowed| {
        next_credential(&mut attempts, url, username, allowed)
    });
    callbacks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CredentialSource {
    SshAgent,
    Helper,
    Username,
    Default,
}

/// Credential kinds already handed to libgit2 for one connection.
///
/// libgit2 calls back after every rejected credential. Each kind is offered
/// once; after that the callback fails instead of repeating itself.
#[derive(Debug, Default)]
struct CredentialAttempts {
    tried: Vec<CredentialSource>,
}

impl CredentialAttempts {
    fn next(&mut self, allowed: CredentialType, has_username: bool) -> Option<CredentialSource> {
        let candidates = [
            (
                CredentialSource::SshAgent,
                allowed.contains(CredentialType::SSH_KEY) && has_username,
            ),
            (
                CredentialSource::Helper,
                allowed.contains(CredentialType::USER_PASS_PLAINTEXT),
            ),
            (
                CredentialSource::Username,
                allowed.contains(CredentialType::USERNAME),
            ),
            (
                CredentialSource::Default,
                allowed.contains(CredentialType::DEFAULT),
            ),
        ];
        let source = candidates
            .into_iter()
            .find(|(source, usable)| *usable && !self.tried.contains(source))
            .map(|(source, _)| source)?;
        self.tried.push(source);
        Some(source)
    }
}

fn next_credential(
    attempts: &mut CredentialAttempts,
    url: &str,
    username: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    while let Some(source) = attempts.next(allowed, username.is_some()) {
        debug!(url, ?source, "trying credentials");
        let cred = match source {
            CredentialSource::SshAgent => Cred::ssh_key_from_agent(username.unwrap_or("git")),
            CredentialSource::Helper => git2::Config::open_default()
                .and_then(|config| Cred::credential_helper(&config, url, username)),
            CredentialSource::Username => Cred::username(username.unwrap_or("git")),
            CredentialSource::Default => Cred::default(),
        };
        match cred {
            Ok(cred) => return Ok(cred),
            Err(e) => debug!(?source, error = %e, "credentials unavailable"),
        }
    }
    Err(git2::Error::from_str(&format!(
        "authentication failed for {url}: no credentials left to try"
    )))
}

/// Directory name a clone of `url` is placed in.
pub fn repo_name(url: &str) -> String {
    url.trim_end_matches(['/', '\\'])
        .rsplit(['/', ':', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repository")
        .to_string()
}
