//! Layered settings for pull and push.
//!
//! Sources, lowest precedence first:
//!
//! 1. `<config_dir>/appconfig/config.toml`
//! 2. `<project>/.appconfig.toml`, or the file passed with `--config`
//! 3. `APPCONFIG_*` environment variables
//! 4. command-line flags
//!
//! Files hold an `[appconfig]` table:
//!
//! ```toml
//! [appconfig]
//! bundle_id = "com.example.app"
//! git_repo = "git@github.com:example/config.git"
//! git_ref = "master"
//! bundled_files = ["Info.plist"]
//! common_encrypted_files = ["keys.json"]
//! ```
//!
//! The passphrase is only taken from the environment or the command line.

use crate::bundle::BundleSpec;
use crate::crypto::ContainerFormat;
use crate::error::{AppConfigError, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PROJECT_CONFIG_FILE: &str = ".appconfig.toml";
pub const ENV_PREFIX: &str = "APPCONFIG_";
const TABLE: &str = "appconfig";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub bundled_files: Vec<PathBuf>,
    #[serde(default)]
    pub bundled_encrypted_files: Vec<PathBuf>,
    #[serde(default)]
    pub common_files: Vec<PathBuf>,
    #[serde(default)]
    pub common_encrypted_files: Vec<PathBuf>,
    pub git_repo: Option<String>,
    pub git_ref: Option<String>,
    #[serde(skip)]
    pub passphrase: Option<String>,
    pub project_path: Option<PathBuf>,
    pub format: Option<ContainerFormat>,
}

impl Settings {
    /// Layer `higher` on top of `self`. Set values and non-empty lists win.
    pub fn overlay(self, higher: Settings) -> Settings {
        fn list(low: Vec<PathBuf>, high: Vec<PathBuf>) -> Vec<PathBuf> {
            if high.is_empty() {
                low
            } else {
                high
            }
        }

        Settings {
            bundle_id: higher.bundle_id.or(self.bundle_id),
            bundled_files: list(self.bundled_files, higher.bundled_files),
            bundled_encrypted_files: list(
                self.bundled_encrypted_files,
                higher.bundled_encrypted_files,
            ),
            common_files: list(self.common_files, higher.common_files),
            common_encrypted_files: list(
                self.common_encrypted_files,
                higher.common_encrypted_files,
            ),
            git_repo: higher.git_repo.or(self.git_repo),
            git_ref: higher.git_ref.or(self.git_ref),
            passphrase: higher.passphrase.or(self.passphrase),
            project_path: higher.project_path.or(self.project_path),
            format: higher.format.or(self.format),
        }
    }

    /// Resolve into a validated [`BundleSpec`].
    pub fn into_bundle_spec(self) -> Result<BundleSpec> {
        let bundle_id = self.bundle_id.ok_or_else(|| {
            AppConfigError::InvalidInput(format!(
                "bundle id is required (--bundle-id or {ENV_PREFIX}BUNDLE_ID)"
            ))
        })?;
        let git_repo = self.git_repo.ok_or_else(|| {
            AppConfigError::InvalidInput(format!(
                "git repository is required (--git-repo or {ENV_PREFIX}GIT_REPO)"
            ))
        })?;

        let mut spec = BundleSpec::new(bundle_id, git_repo);
        if let Some(git_ref) = self.git_ref {
            spec.git_ref = git_ref;
        }
        if let Some(project_path) = self.project_path {
            spec.project_root = project_path;
        }
        spec.passphrase = self.passphrase.unwrap_or_default();
        spec.bundled_files = self.bundled_files;
        spec.bundled_encrypted_files = self.bundled_encrypted_files;
        spec.common_files = self.common_files;
        spec.common_encrypted_files = self.common_encrypted_files;

        spec.validate()?;
        Ok(spec)
    }
}

/// Location of the per-user settings file.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("appconfig").join("config.toml"))
}

/// Load file and environment settings.
///
/// `project_dir` is searched for `.appconfig.toml` unless `explicit` names a
/// file, which must then exist.
pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Settings> {
    let files = load_files(user_config_path().as_deref(), project_dir, explicit)?;
    Ok(files.overlay(from_env()?))
}

pub(crate) fn load_files(
    user_file: Option<&Path>,
    project_dir: &Path,
    explicit: Option<&Path>,
) -> Result<Settings> {
    let mut builder = Config::builder();

    if let Some(user_file) = user_file {
        builder = builder.add_source(File::new(path_str(user_file)?, FileFormat::Toml).required(false));
    }
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(AppConfigError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::new(path_str(path)?, FileFormat::Toml).required(true));
        }
        None => {
            let project_file = project_dir.join(PROJECT_CONFIG_FILE);
            builder = builder
                .add_source(File::new(path_str(&project_file)?, FileFormat::Toml).required(false));
        }
    }

    let cfg = builder
        .build()
        .map_err(|err| AppConfigError::Config(format!("Failed to load config file: {err}")))?;

    if cfg.get_string(&format!("{TABLE}.passphrase")).is_ok() {
        warn!("ignoring passphrase in config file; use {ENV_PREFIX}PASSPHRASE or --passphrase");
    }

    match cfg.get::<Settings>(TABLE) {
        Ok(settings) => {
            debug!(?settings, "loaded settings from files");
            Ok(settings)
        }
        Err(ConfigError::NotFound(_)) => Ok(Settings::default()),
        Err(err) => Err(AppConfigError::Config(format!("Invalid [{TABLE}] table: {err}"))),
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| AppConfigError::Config(format!("Invalid config path: {}", path.display())))
}

/// Settings from `APPCONFIG_*` environment variables.
pub fn from_env() -> Result<Settings> {
    from_lookup(|key| env::var(key).ok())
}

pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let var = |name: &str| {
        lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.is_empty())
    };
    let list = |name: &str| var(name).map(|value| split_list(&value)).unwrap_or_default();

    let format: Option<ContainerFormat> = var("FORMAT")
        .map(|value| value.parse::<ContainerFormat>())
        .transpose()?;

    Ok(Settings {
        bundle_id: var("BUNDLE_ID"),
        bundled_files: list("BUNDLED_FILES"),
        bundled_encrypted_files: list("BUNDLED_ENCRYPTED_FILES"),
        common_files: list("COMMON_FILES"),
        common_encrypted_files: list("COMMON_ENCRYPTED_FILES"),
        git_repo: var("GIT_REPO"),
        git_ref: var("GIT_REF"),
        passphrase: var("PASSPHRASE"),
        project_path: var("PROJECT_PATH").map(PathBuf::from),
        format,
    })
}

/// Split a comma separated file list, dropping blank entries.
pub fn split_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}
