use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use gitbridge_core::git::{GitBackend, GitResult, LogOptions, RemoteOptions};
use gitbridge_core::host::{loopback, NativeGitHost};
use gitbridge_core::repository::{FolderPicker, FolderSelection, MenuActionResult};
use gitbridge_core::{GitBridgeConfig, GitDispatcher, HostContext, OperationResult, RepositoryFacade};

#[derive(Parser)]
#[command(name = "gitbridge", version, about = "Unified git control layer")]
struct Cli {
    /// Config file (default: ~/.gitbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository directory (default: current directory)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Working tree status
    Status,
    /// Initialize a repository
    Init,
    /// Clone into the directory
    Clone { url: String },
    Fetch(RemoteArgs),
    Pull(RemoteArgs),
    Push(RemoteArgs),
    /// Commit history
    Log {
        #[arg(long, default_value_t = 20)]
        depth: usize,
        #[arg(long = "ref")]
        reference: Option<String>,
    },
    /// Local branches
    Branches,
    /// Check whether a URL looks like a git remote
    CheckUrl { url: String },
    /// Repository summary
    Info,
}

#[derive(clap::Args)]
struct RemoteArgs {
    #[arg(long)]
    remote: Option<String>,
    #[arg(long)]
    branch: Option<String>,
}

impl From<RemoteArgs> for RemoteOptions {
    fn from(args: RemoteArgs) -> Self {
        RemoteOptions {
            remote: args.remote,
            branch: args.branch,
            credentials: None,
        }
    }
}

/// Always "picks" the directory given on the command line.
struct FixedFolder(PathBuf);

#[async_trait]
impl FolderPicker for FixedFolder {
    async fn open_folder(&self) -> MenuActionResult {
        MenuActionResult {
            success: true,
            data: Some(FolderSelection {
                folder_path: self.0.to_string_lossy().into_owned(),
            }),
            message: None,
        }
    }
}

fn from_git<T>(result: GitResult<T>, message: &str) -> OperationResult<T> {
    match result {
        Ok(data) => OperationResult::ok(message, Some(data)),
        Err(e) => OperationResult::fail(e.to_string()),
    }
}

fn print<T: Serialize>(result: &OperationResult<T>) -> anyhow::Result<bool> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(result.success)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GitBridgeConfig::load(path)?,
        None => GitBridgeConfig::load_default()?,
    };
    gitbridge_core::util::init_logging(&config.log.level, cli.log_json);

    if let Commands::CheckUrl { url } = &cli.command {
        let valid = gitbridge_core::repository::is_valid_git_url(url);
        println!("{}", serde_json::json!({ "url": url, "valid": valid }));
        if !valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    let dir = match cli.dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    if matches!(cli.command, Commands::Init | Commands::Clone { .. }) {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let host = Arc::new(NativeGitHost::new(&dir));
    let context = HostContext::default().with_native(loopback::connect(host));
    let dispatcher = Arc::new(GitDispatcher::new(context, &config)?);
    let facade = RepositoryFacade::new(Arc::clone(&dispatcher), Arc::new(FixedFolder(dir)));

    let opened = facade.open_folder().await;
    if !opened.success {
        print(&opened)?;
        std::process::exit(1);
    }
    info!("Running in {} environment", dispatcher.environment());

    let success = match cli.command {
        Commands::Status => print(&facade.refresh_status().await)?,
        Commands::Init => print(&facade.init_repository().await)?,
        Commands::Clone { url } => print(&facade.clone_repository(&url).await)?,
        Commands::Fetch(args) => print(&facade.fetch_repository(&args.into()).await)?,
        Commands::Pull(args) => print(&facade.pull_repository(&args.into()).await)?,
        Commands::Push(args) => print(&facade.push_repository(&args.into()).await)?,
        Commands::Log { depth, reference } => {
            let opts = LogOptions {
                depth: Some(depth),
                reference,
            };
            print(&from_git(dispatcher.log(None, &opts).await, "Commit history"))?
        }
        Commands::Branches => print(&from_git(dispatcher.list_branches(None).await, "Local branches"))?,
        Commands::Info => print(&from_git(
            dispatcher.get_repository_info(None).await,
            "Repository info",
        ))?,
        Commands::CheckUrl { .. } => true,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
