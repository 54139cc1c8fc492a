use anyhow::Result;
use caskr::CaskError;
use caskr::commands;
use caskr::config::{Config, ConfigOptions};
use caskr::executor::UninstallOptions;
use caskr::resolver::FamilyPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// caskr - install applications from package manifests
///
/// Manifests describe a downloadable artifact, its checksum and the install
/// steps (app bundles, binaries, shims). caskr plans an install against the
/// already-installed set, refusing conflicts and missing dependencies, then
/// executes it with rollback on failure.
///
/// If the GITHUB_TOKEN environment variable is set, it is used for livecheck
/// requests against the GitHub API.
///
/// Examples:
///   caskr install godot@4.0
///   caskr uninstall godot --deep-clean
///   caskr livecheck godot
#[derive(Parser, Debug)]
#[command(author, version = env!("CASKR_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (also via CASKR_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "CASKR_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Manifest file or directory (defaults to <root>/manifests)
    #[arg(long, env = "CASKR_MANIFESTS", value_name = "PATH", global = true)]
    pub manifests: Option<PathBuf>,

    /// Where app bundles are placed (defaults to <root>/Applications)
    #[arg(long, env = "CASKR_APPDIR", value_name = "PATH", global = true)]
    pub appdir: Option<PathBuf>,

    /// Where binaries and shims are linked (defaults to <root>/bin)
    #[arg(long, env = "CASKR_BINDIR", value_name = "PATH", global = true)]
    pub bindir: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Whether one family may have several versions installed side by side
    #[arg(
        long = "family-policy",
        value_name = "POLICY",
        default_value = "declared",
        global = true
    )]
    pub family_policy: FamilyPolicy,

    /// Network timeout in seconds (default 30)
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package, e.g. "godot" or "godot@4.0"
    Install(InstallArgs),

    /// Uninstall an installed package
    Uninstall(UninstallArgs),

    /// List installed packages
    List,

    /// Check upstream for a newer version
    Livecheck(NameArgs),

    /// Show available and installed versions
    Info(NameArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    #[arg(value_name = "NAME[@VERSION]")]
    pub reference: String,

    /// Also install missing dependencies
    #[arg(long)]
    pub with_deps: bool,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    #[arg(value_name = "NAME[@VERSION]")]
    pub reference: String,

    /// Also remove the package's declared cleanup paths
    #[arg(long)]
    pub deep_clean: bool,

    /// Uninstall even if other installed packages depend on it
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct NameArgs {
    pub name: String,
}

impl Cli {
    fn config_options(&self) -> ConfigOptions {
        ConfigOptions {
            root: self.install_root.clone(),
            manifests: self.manifests.clone(),
            appdir: self.appdir.clone(),
            bindir: self.bindir.clone(),
            api_url: self.api_url.clone(),
            policy: self.family_policy,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::new(caskr::runtime::RealRuntime, cli.config_options())?;

    match cli.command {
        Commands::Install(args) => {
            commands::install(&config, &args.reference, args.with_deps).await?
        }
        Commands::Uninstall(args) => {
            let options = UninstallOptions {
                deep_clean: args.deep_clean,
                force: args.force,
            };
            commands::uninstall(&config, &args.reference, options).await?
        }
        Commands::List => commands::list(&config)?,
        Commands::Livecheck(args) => commands::livecheck(&config, &args.name).await?,
        Commands::Info(args) => commands::info(&config, &args.name)?,
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CaskError>()
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}
