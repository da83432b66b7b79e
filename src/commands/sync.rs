use super::prompt;
use appconfig::bundle::BundleSpec;
use appconfig::config::{self, Settings, ENV_PREFIX};
use appconfig::error::Result;
use appconfig::{ContainerFormat, Git2Client, SyncEngine, Workspace};
use std::env;
use std::path::PathBuf;

/// Command-line input for pull and push.
pub struct SyncRequest {
    pub overrides: Settings,
    pub config_file: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
}

/// Fetch configuration files into the project
pub fn pull(request: SyncRequest) -> Result<()> {
    let (spec, _) = resolve(&request)?;

    println!(
        "Pulling configuration for {} from {} ({})...",
        spec.bundle_id, spec.repository_url, spec.git_ref
    );

    let engine = SyncEngine::new(Git2Client::new(), workspace(&request));
    let outcome = engine.pull(&spec)?;

    println!(
        "Pulled {} file(s) into {}",
        outcome.files,
        spec.project_root.display()
    );
    Ok(())
}

/// Publish configuration files to the repository
pub fn push(request: SyncRequest) -> Result<()> {
    let (spec, format) = resolve(&request)?;

    println!(
        "Pushing configuration for {} to {} ({})...",
        spec.bundle_id, spec.repository_url, spec.git_ref
    );

    let engine = SyncEngine::new(Git2Client::new(), workspace(&request)).with_format(format);
    let outcome = engine.push(&spec)?;

    if outcome.branch_created {
        println!("Created branch {}", spec.git_ref);
    }
    if outcome.committed {
        println!("Pushed {} file(s) to {}", outcome.files, spec.git_ref);
    } else {
        println!("No changes to commit; {} is up to date", spec.git_ref);
    }
    Ok(())
}

fn resolve(request: &SyncRequest) -> Result<(BundleSpec, ContainerFormat)> {
    let project_dir = request
        .overrides
        .project_path
        .clone()
        .or_else(|| env::var_os(format!("{ENV_PREFIX}PROJECT_PATH")).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = config::load(&project_dir, request.config_file.as_deref())?
        .overlay(request.overrides.clone());

    let has_encrypted =
        !settings.bundled_encrypted_files.is_empty() || !settings.common_encrypted_files.is_empty();
    if has_encrypted && settings.passphrase.is_none() {
        settings.passphrase = prompt::read_passphrase()?;
    }

    let format = settings.format.unwrap_or_default();
    Ok((settings.into_bundle_spec()?, format))
}

fn workspace(request: &SyncRequest) -> Workspace {
    match &request.scratch_dir {
        Some(dir) => Workspace::at(dir),
        None => Workspace::unique(env::temp_dir()),
    }
}
