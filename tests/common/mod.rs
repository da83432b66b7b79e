use assert_cmd::{cargo::cargo_bin_cmd, Command};
use git2::{IndexAddOption, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Legacy MD5 container of "API_KEY=abc123\n" under passphrase "hunter2".
#[allow(dead_code)]
pub const SECRET_CONTAINER: &str = "U2FsdGVkX18BAgMEBQYHCFN0dlH4WAu9OxSzc5iV2jM=";
#[allow(dead_code)]
pub const SECRET_PLAINTEXT: &str = "API_KEY=abc123\n";
#[allow(dead_code)]
pub const PASSPHRASE: &str = "hunter2";

/// A bare repository on disk acting as the configuration remote.
pub struct Remote {
    pub temp: TempDir,
    pub path: PathBuf,
}

#[allow(dead_code)]
impl Remote {
    /// Path as a clone URL.
    pub fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn repo(&self) -> Repository {
        Repository::open_bare(&self.path).expect("failed to open remote")
    }

    /// Contents of `path` at the tip of `branch`, if present.
    pub fn read_file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let repo = self.repo();
        let reference = repo.find_reference(&format!("refs/heads/{branch}")).ok()?;
        let tree = reference.peel_to_tree().ok()?;
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = repo.find_blob(entry.id()).ok()?;
        Some(blob.content().to_vec())
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.repo()
            .find_reference(&format!("refs/heads/{branch}"))
            .is_ok()
    }

    pub fn head_message(&self, branch: &str) -> String {
        let repo = self.repo();
        let reference = repo
            .find_reference(&format!("refs/heads/{branch}"))
            .expect("branch missing");
        let commit = reference.peel_to_commit().expect("no commit");
        commit.message().unwrap_or_default().to_string()
    }

    pub fn commit_count(&self, branch: &str) -> usize {
        let repo = self.repo();
        let mut walk = repo.revwalk().unwrap();
        walk.push_ref(&format!("refs/heads/{branch}")).unwrap();
        walk.count()
    }

    /// Create `branch` pointing at the tip of master.
    pub fn add_branch(&self, branch: &str) {
        let repo = self.repo();
        let commit = repo
            .find_reference("refs/heads/master")
            .and_then(|r| r.peel_to_commit())
            .unwrap();
        repo.branch(branch, &commit, false).unwrap();
    }

    /// Tag the tip of master.
    pub fn add_tag(&self, tag: &str) {
        let repo = self.repo();
        let object = repo.revparse_single("refs/heads/master").unwrap();
        repo.tag_lightweight(tag, &object, false).unwrap();
    }
}

/// Build a bare remote whose master branch holds `files`.
pub fn create_remote(files: &[(&str, &[u8])]) -> Remote {
    let temp = TempDir::new().expect("failed to create temp dir");
    let seed_path = temp.path().join("seed");

    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("master");
    let seed = Repository::init_opts(&seed_path, &opts).expect("failed to init seed repo");

    fs::write(seed_path.join("README.md"), "configuration\n").unwrap();
    for (path, content) in files {
        let target = seed_path.join(path);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, content).unwrap();
    }

    let mut index = seed.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    {
        let tree = seed.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        seed.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    let path = temp.path().join("config.git");
    git2::build::RepoBuilder::new()
        .bare(true)
        .clone(seed_path.to_str().unwrap(), &path)
        .expect("failed to create bare remote");

    Remote { temp, path }
}

/// A remote seeded with one bundle and a shared file.
#[allow(dead_code)]
pub fn create_default_remote() -> Remote {
    create_remote(&[
        ("com.app/Info.plist", b"<plist/>"),
        ("com.app/secrets.enc", SECRET_CONTAINER.as_bytes()),
        ("common/env.json", b"{\"env\":\"prod\"}"),
    ])
}

/// Convenience helper for spawning the appconfig binary via assert_cmd,
/// isolated from the caller's settings.
#[allow(dead_code)]
pub fn appconfig_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("appconfig");
    for (key, _) in std::env::vars() {
        if key.starts_with("APPCONFIG_") {
            cmd.env_remove(key);
        }
    }
    cmd.env(
        "XDG_CONFIG_HOME",
        std::env::temp_dir().join("appconfig-tests-no-user-config"),
    );
    cmd
}
