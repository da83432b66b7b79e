mod commands;

use appconfig::config::Settings;
use appconfig::{logging, ContainerFormat, Result};
use clap::{Args, Parser, Subcommand};
use commands::{CryptRequest, SyncRequest};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "appconfig")]
#[command(version)]
#[command(about = "Sync app configuration files with a git repository", long_about = None)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch configuration files from the repository into the project
    Pull(SyncArgs),

    /// Publish the project's configuration files to the repository
    Push {
        #[command(flatten)]
        sync: SyncArgs,

        /// Container format for encrypted files (legacy, v2)
        #[arg(long)]
        format: Option<ContainerFormat>,
    },

    /// Encrypt a single file
    Encrypt {
        #[command(flatten)]
        crypt: CryptArgs,

        /// Container format (legacy, v2)
        #[arg(long)]
        format: Option<ContainerFormat>,
    },

    /// Decrypt a single file
    Decrypt(CryptArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// Bundle identifier, the app's directory in the repository
    #[arg(long)]
    bundle_id: Option<String>,

    /// Plain files specific to this bundle
    #[arg(long, value_delimiter = ',')]
    bundled_files: Vec<PathBuf>,

    /// Encrypted files specific to this bundle
    #[arg(long, value_delimiter = ',')]
    bundled_encrypted_files: Vec<PathBuf>,

    /// Plain files shared by all bundles
    #[arg(long, value_delimiter = ',')]
    common_files: Vec<PathBuf>,

    /// Encrypted files shared by all bundles
    #[arg(long, value_delimiter = ',')]
    common_encrypted_files: Vec<PathBuf>,

    /// URL of the configuration repository
    #[arg(long)]
    git_repo: Option<String>,

    /// Branch, tag or commit [default: master]
    #[arg(long)]
    git_ref: Option<String>,

    /// Passphrase for encrypted files
    #[arg(long)]
    passphrase: Option<String>,

    /// Project root that file paths are relative to [default: .]
    #[arg(long)]
    project_path: Option<PathBuf>,

    /// Fixed scratch directory for the clone
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Settings file to use instead of <project>/.appconfig.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

impl SyncArgs {
    fn into_request(self, format: Option<ContainerFormat>) -> SyncRequest {
        SyncRequest {
            overrides: Settings {
                bundle_id: self.bundle_id,
                bundled_files: self.bundled_files,
                bundled_encrypted_files: self.bundled_encrypted_files,
                common_files: self.common_files,
                common_encrypted_files: self.common_encrypted_files,
                git_repo: self.git_repo,
                git_ref: self.git_ref,
                passphrase: self.passphrase,
                project_path: self.project_path,
                format,
            },
            config_file: self.config,
            scratch_dir: self.scratch_dir,
        }
    }
}

#[derive(Args)]
struct CryptArgs {
    /// File to transform
    file: PathBuf,

    /// Passphrase (falls back to APPCONFIG_PASSPHRASE, then a prompt)
    #[arg(long)]
    passphrase: Option<String>,

    /// Write the result here instead of replacing FILE
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl CryptArgs {
    fn into_request(self, format: Option<ContainerFormat>) -> CryptRequest {
        CryptRequest {
            file: self.file,
            passphrase: self.passphrase,
            output: self.output,
            format,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: failed to initialise logging: {e}");
    }

    match cli.command {
        Commands::Pull(sync) => commands::pull(sync.into_request(None)),
        Commands::Push { sync, format } => commands::push(sync.into_request(format)),
        Commands::Encrypt { crypt, format } => commands::encrypt(crypt.into_request(format)),
        Commands::Decrypt(crypt) => commands::decrypt(crypt.into_request(None)),
    }
}
