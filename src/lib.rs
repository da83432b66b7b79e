//! # appconfig
//!
//! Keeps per-app configuration files in a shared git repository and moves
//! them in and out of a local project, encrypting the sensitive ones.
//!
//! ## Repository Layout
//!
//! ```text
//! config-repo/
//! ├── com.example.app/     files for one bundle id
//! │   ├── Info.plist
//! │   └── secrets.enc      encrypted container
//! └── common/              files shared by every app
//!     └── env.json
//! ```
//!
//! Relative paths are the same on both sides: `com.example.app/ios/Info.plist`
//! in the repository is `ios/Info.plist` under the project root.
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch configuration into the current project
//! appconfig pull --bundle-id com.example.app \
//!     --git-repo git@github.com:example/config.git \
//!     --bundled-files Info.plist \
//!     --bundled-encrypted-files secrets.enc \
//!     --common-files env.json
//!
//! # Publish local changes back, creating the branch if needed
//! APPCONFIG_PASSPHRASE=... appconfig push --git-ref release/2.0 ...
//!
//! # Encrypt or decrypt a single file in place
//! appconfig encrypt secrets.enc
//! appconfig decrypt secrets.enc --output secrets.env
//! ```
//!
//! Settings can also come from `.appconfig.toml` and `APPCONFIG_*`
//! environment variables, see [`config`].
//!
//! ## Data Flow
//!
//! **Pull:**
//! ```text
//! clone -> checkout ref -> copy plain files / decrypt encrypted files -> project
//! ```
//!
//! **Push:**
//! ```text
//! clone -> checkout or create branch -> copy / encrypt -> commit -> push
//! ```
//!
//! The clone lives in a scratch [`workspace`] that is removed when the
//! operation ends, successfully or not.
//!
//! ## Module Overview
//!
//! - [`crypto`] - Container codec (legacy OpenSSL-compatible and V2)
//! - [`bundle`] - Bundle description and repository path mapping
//! - [`workspace`] - Scratch directory lifecycle
//! - [`git`] - Git client abstraction and the libgit2 implementation
//! - [`engine`] - Pull and push orchestration
//! - [`report`] - Parameter summary shown before an operation
//! - [`config`] - Layered settings
//! - [`error`] - Error types
//!
//! ## Security Considerations
//!
//! The legacy container uses one round of MD5 or SHA-256 to derive its key
//! and carries no integrity tag. It is kept for compatibility with existing
//! repositories. Prefer `--format v2` for new files.

pub mod bundle;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod git;
pub mod logging;
pub mod report;
pub mod workspace;

// Re-export commonly used types
pub use bundle::BundleSpec;
pub use crypto::{ContainerFormat, KeyDigest, Passphrase};
pub use engine::{SyncEngine, SyncOutcome, SyncState};
pub use error::{AppConfigError, Result};
pub use git::{Checkout, Git2Client, GitClient};
pub use workspace::Workspace;
