use super::prompt;
use appconfig::config::{self, ENV_PREFIX};
use appconfig::error::{AppConfigError, Result};
use appconfig::{ContainerFormat, Passphrase};
use std::fs;
use std::path::PathBuf;

/// Command-line input for encrypt and decrypt.
pub struct CryptRequest {
    pub file: PathBuf,
    pub passphrase: Option<String>,
    pub output: Option<PathBuf>,
    pub format: Option<ContainerFormat>,
}

/// Encrypt a single file
pub fn encrypt(request: CryptRequest) -> Result<()> {
    let env = config::from_env()?;
    let secret = match request.passphrase.clone().or(env.passphrase) {
        Some(secret) => Some(secret),
        None => prompt::read_new_passphrase()?,
    };
    let passphrase = require(secret)?;
    let format = request.format.or(env.format).unwrap_or_default();

    let plaintext = fs::read(&request.file).map_err(|e| AppConfigError::fs(&request.file, e))?;
    if Passphrase::is_encrypted(&plaintext) {
        return Err(AppConfigError::InvalidInput(format!(
            "'{}' is already encrypted",
            request.file.display()
        )));
    }

    println!("Encrypting {} ({format})...", request.file.display());
    let container = passphrase
        .encrypt_with(&plaintext, format)
        .map_err(|e| e.for_target(request.file.display().to_string()))?;

    let output = request.output.as_ref().unwrap_or(&request.file);
    fs::write(output, container).map_err(|e| AppConfigError::fs(output, e))?;

    println!("Encrypted file written to {}", output.display());
    Ok(())
}

/// Decrypt a single file
pub fn decrypt(request: CryptRequest) -> Result<()> {
    let env = config::from_env()?;
    let secret = match request.passphrase.clone().or(env.passphrase) {
        Some(secret) => Some(secret),
        None => prompt::read_passphrase()?,
    };
    let passphrase = require(secret)?;

    let container = fs::read(&request.file).map_err(|e| AppConfigError::fs(&request.file, e))?;

    println!("Decrypting {}...", request.file.display());
    let plaintext = passphrase
        .decrypt(&container)
        .map_err(|e| e.for_target(request.file.display().to_string()))?;

    let output = request.output.as_ref().unwrap_or(&request.file);
    fs::write(output, plaintext).map_err(|e| AppConfigError::fs(output, e))?;

    println!("Decrypted file written to {}", output.display());
    Ok(())
}

fn require(secret: Option<String>) -> Result<Passphrase> {
    let secret = secret.ok_or_else(|| {
        AppConfigError::InvalidInput(format!(
            "no passphrase provided; pass --passphrase or set {ENV_PREFIX}PASSPHRASE"
        ))
    })?;
    Passphrase::new(secret)
}
