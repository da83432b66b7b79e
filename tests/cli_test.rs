//! # CLI Tests
//!
//! Drives the `appconfig` binary: pull and push against local bare
//! repositories, settings files and environment variables, and the single
//! file encrypt/decrypt commands.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test cli_test
//! ```

mod common;

use appconfig::Passphrase;
use common::{
    appconfig_cmd, create_default_remote, PASSPHRASE, SECRET_CONTAINER, SECRET_PLAINTEXT,
};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_help_lists_commands() {
    appconfig_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("encrypt"))
        .stdout(predicate::str::contains("decrypt"));
}

#[test]
fn test_invalid_command() {
    appconfig_cmd()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_pull_with_flags() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    let scratch = project.path().join("scratch");

    appconfig_cmd()
        .args(["pull", "--bundle-id", "com.app", "--git-repo"])
        .arg(remote.url())
        .args(["--bundled-files", "Info.plist"])
        .args(["--bundled-encrypted-files", "secrets.enc"])
        .args(["--common-files", "env.json"])
        .args(["--passphrase", PASSPHRASE])
        .arg("--scratch-dir")
        .arg(&scratch)
        .current_dir(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pull Config"))
        .stdout(predicate::str::contains("Pulled 3 file(s)"))
        .stdout(predicate::str::contains(PASSPHRASE).not());

    assert_eq!(
        fs::read_to_string(project.path().join("secrets.enc")).unwrap(),
        SECRET_PLAINTEXT
    );
    assert!(project.path().join("Info.plist").exists());
    assert!(project.path().join("env.json").exists());
    assert!(!scratch.exists());
}

#[test]
fn test_pull_with_project_config_and_env() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join(".appconfig.toml"),
        format!(
            r#"
                [appconfig]
                bundle_id = "com.app"
                git_repo = "{}"
                bundled_encrypted_files = ["secrets.enc"]
                common_files = ["env.json"]
            "#,
            remote.url().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    appconfig_cmd()
        .arg("pull")
        .env("APPCONFIG_PASSPHRASE", PASSPHRASE)
        .current_dir(project.path())
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(project.path().join("secrets.enc")).unwrap(),
        SECRET_PLAINTEXT
    );
}

#[test]
fn test_flags_override_env() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();

    appconfig_cmd()
        .args(["pull", "--common-files", "env.json", "--git-repo"])
        .arg(remote.url())
        .env("APPCONFIG_BUNDLE_ID", "com.app")
        .env("APPCONFIG_COMMON_FILES", "does-not-exist.json")
        .current_dir(project.path())
        .assert()
        .success();

    assert!(project.path().join("env.json").exists());
}

#[test]
fn test_pull_wrong_passphrase_fails() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    let scratch = project.path().join("scratch");

    appconfig_cmd()
        .args(["pull", "--bundle-id", "com.app", "--git-repo"])
        .arg(remote.url())
        .args(["--bundled-encrypted-files", "secrets.enc"])
        .args(["--passphrase", "wrong"])
        .arg("--scratch-dir")
        .arg(&scratch)
        .current_dir(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error decrypting"));

    assert!(!scratch.exists());
}

#[test]
fn test_pull_missing_passphrase_fails() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();

    appconfig_cmd()
        .args(["pull", "--bundle-id", "com.app", "--git-repo"])
        .arg(remote.url())
        .args(["--common-encrypted-files", "keys.json"])
        .current_dir(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("passphrase"));
}

#[test]
fn test_pull_requires_bundle_id() {
    let project = TempDir::new().unwrap();

    appconfig_cmd()
        .args(["pull", "--git-repo", "/nowhere/config.git"])
        .current_dir(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("bundle id is required"));
}

#[test]
fn test_push_creates_branch() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("secrets.enc"), "API_KEY=new\n").unwrap();

    appconfig_cmd()
        .args(["push", "--bundle-id", "com.app", "--git-ref", "feature/rotate"])
        .arg("--git-repo")
        .arg(remote.url())
        .args(["--bundled-encrypted-files", "secrets.enc"])
        .env("APPCONFIG_PASSPHRASE", PASSPHRASE)
        .current_dir(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Push Config"))
        .stdout(predicate::str::contains("Created branch feature/rotate"));

    let container = remote
        .read_file("feature/rotate", "com.app/secrets.enc")
        .unwrap();
    let plaintext = Passphrase::new(PASSPHRASE).unwrap().decrypt(&container).unwrap();
    assert_eq!(plaintext, b"API_KEY=new\n");
    assert_eq!(
        remote.head_message("feature/rotate"),
        "[AppConfig] Updating files for com.app"
    );
    // Plaintext never leaves the project
    assert_eq!(
        fs::read_to_string(project.path().join("secrets.enc")).unwrap(),
        "API_KEY=new\n"
    );
}

#[test]
fn test_push_nothing_to_commit() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("env.json"), "{\"env\":\"prod\"}").unwrap();

    appconfig_cmd()
        .args(["push", "--bundle-id", "com.app", "--common-files", "env.json"])
        .arg("--git-repo")
        .arg(remote.url())
        .current_dir(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to commit"));

    assert_eq!(remote.commit_count("master"), 1);
}

#[test]
fn test_push_with_project_as_scratch_dir_fails() {
    let remote = create_default_remote();
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("env.json"), "{}").unwrap();
    fs::write(project.path().join("unrelated.txt"), "keep me").unwrap();

    appconfig_cmd()
        .args(["push", "--bundle-id", "com.app", "--common-files", "env.json"])
        .arg("--git-repo")
        .arg(remote.url())
        .args(["--scratch-dir", "."])
        .current_dir(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("contains the project root"));

    assert_eq!(
        fs::read_to_string(project.path().join("unrelated.txt")).unwrap(),
        "keep me"
    );
    assert_eq!(remote.commit_count("master"), 1);
}

#[test]
fn test_push_rejects_invalid_format() {
    appconfig_cmd()
        .args(["push", "--format", "rot13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown container format"));
}

#[test]
fn test_encrypt_rejects_sha256_legacy_format() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.env");
    fs::write(&file, "DB_PASSWORD=hunter3\n").unwrap();

    appconfig_cmd()
        .arg("encrypt")
        .arg(&file)
        .args(["--format", "legacy-sha256", "--passphrase", PASSPHRASE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("decrypted but not written"));

    assert_eq!(fs::read_to_string(&file).unwrap(), "DB_PASSWORD=hunter3\n");
}

#[test]
fn test_encrypt_then_decrypt_in_place() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.env");
    fs::write(&file, "DB_PASSWORD=hunter3\n").unwrap();

    appconfig_cmd()
        .arg("encrypt")
        .arg(&file)
        .args(["--passphrase", PASSPHRASE])
        .assert()
        .success()
        .stdout(predicate::str::contains("Encrypted file written"));

    let container = fs::read(&file).unwrap();
    assert!(Passphrase::is_encrypted(&container));
    assert!(container.starts_with(b"U2FsdGVkX1"));

    appconfig_cmd()
        .arg("decrypt")
        .arg(&file)
        .env("APPCONFIG_PASSPHRASE", PASSPHRASE)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "DB_PASSWORD=hunter3\n");
}

#[test]
fn test_encrypt_v2_to_output() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("keys.json");
    let output = temp.path().join("keys.json.enc");
    fs::write(&file, "{}").unwrap();

    appconfig_cmd()
        .arg("encrypt")
        .arg(&file)
        .args(["--format", "v2", "--passphrase", PASSPHRASE, "--output"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&file).unwrap(), "{}");
    let container = fs::read(&output).unwrap();
    assert!(!container.starts_with(b"U2FsdGVkX1"));
    let plaintext = Passphrase::new(PASSPHRASE).unwrap().decrypt(&container).unwrap();
    assert_eq!(plaintext, b"{}");
}

#[test]
fn test_encrypt_refuses_encrypted_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.enc");
    fs::write(&file, SECRET_CONTAINER).unwrap();

    appconfig_cmd()
        .arg("encrypt")
        .arg(&file)
        .args(["--passphrase", PASSPHRASE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already encrypted"));

    assert_eq!(fs::read_to_string(&file).unwrap(), SECRET_CONTAINER);
}

#[test]
fn test_decrypt_known_container() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.enc");
    let output = temp.path().join("secrets.env");
    fs::write(&file, SECRET_CONTAINER).unwrap();

    appconfig_cmd()
        .arg("decrypt")
        .arg(&file)
        .args(["--passphrase", PASSPHRASE, "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&output).unwrap(), SECRET_PLAINTEXT);
}

#[test]
fn test_decrypt_wrong_passphrase() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.enc");
    fs::write(&file, SECRET_CONTAINER).unwrap();

    appconfig_cmd()
        .arg("decrypt")
        .arg(&file)
        .args(["--passphrase", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error decrypting"))
        .stderr(predicate::str::contains("secrets.enc"));

    assert_eq!(fs::read_to_string(&file).unwrap(), SECRET_CONTAINER);
}

#[test]
fn test_decrypt_without_passphrase_fails() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("secrets.enc");
    fs::write(&file, SECRET_CONTAINER).unwrap();

    appconfig_cmd()
        .arg("decrypt")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no passphrase provided"));
}

#[test]
fn test_decrypt_missing_file() {
    let temp = TempDir::new().unwrap();

    appconfig_cmd()
        .arg("decrypt")
        .arg(temp.path().join("absent.enc"))
        .args(["--passphrase", PASSPHRASE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Filesystem error"));
}
