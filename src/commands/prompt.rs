use appconfig::error::{AppConfigError, Result};
use std::io::IsTerminal;

/// Ask for the passphrase on the terminal. Returns `None` when stdin is not
/// a terminal.
pub fn read_passphrase() -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }

    eprint!("Passphrase: ");
    let passphrase = rpassword::read_password()
        .map_err(|e| AppConfigError::InvalidInput(format!("failed to read passphrase: {e}")))?;
    if passphrase.is_empty() {
        return Err(AppConfigError::InvalidInput("empty passphrase not allowed".into()));
    }
    Ok(Some(passphrase))
}

/// Like [`read_passphrase`], but asks twice and checks both entries match.
pub fn read_new_passphrase() -> Result<Option<String>> {
    let Some(first) = read_passphrase()? else {
        return Ok(None);
    };

    eprint!("Confirm passphrase: ");
    let second = rpassword::read_password()
        .map_err(|e| AppConfigError::InvalidInput(format!("failed to read passphrase: {e}")))?;
    if first != second {
        return Err(AppConfigError::InvalidInput("passphrases do not match".into()));
    }
    Ok(Some(first))
}
