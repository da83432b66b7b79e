use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed container '{target}': {reason}")]
    MalformedContainer { target: String, reason: String },

    #[error("Error decrypting '{target}'")]
    Decryption { target: String },

    #[error("Error encrypting '{target}': {reason}")]
    Encryption { target: String, reason: String },

    #[error("Repository error: {0}")]
    Git(#[from] git2::Error),

    #[error("Reference not found: {0}")]
    RefNotFound(String),

    #[error("Push of '{reference}' rejected by remote: {message}")]
    PushRejected { reference: String, message: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppConfigError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Attach a file path to codec errors raised without one.
    pub fn for_target(self, target: impl Into<String>) -> Self {
        match self {
            Self::Decryption { .. } => Self::Decryption {
                target: target.into(),
            },
            Self::MalformedContainer { reason, .. } => Self::MalformedContainer {
                target: target.into(),
                reason,
            },
            Self::Encryption { reason, .. } => Self::Encryption {
                target: target.into(),
                reason,
            },
            other => other,
        }
    }

    /// Whether the error came from the git collaborator.
    pub fn is_repository(&self) -> bool {
        matches!(
            self,
            Self::Git(_) | Self::RefNotFound(_) | Self::PushRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AppConfigError>;
