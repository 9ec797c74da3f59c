mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rollkit_core::UncommittedPolicy;
use tracing::Level;

#[derive(Parser)]
#[command(name = "rollkit")]
#[command(about = "Incremental build, version and release orchestration for multi-package repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory to start looking for rollkit.toml from.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List participating packages in walk order.
    List {
        #[arg(long, action)]
        json: bool,
    },
    /// Print local dependencies of every package.
    Tree,
    /// Run a manifest script, or a command after `--`, in every package.
    Each {
        script: Option<String>,
        /// Only packages whose build inputs changed, and their dependents.
        #[arg(long, action)]
        changed: bool,
        /// Only packages whose current version is not on the registry, and their dependents.
        #[arg(long, action)]
        not_published: bool,
        #[arg(long, action)]
        parallel: bool,
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Rebuild packages whose build inputs changed.
    Build,
    /// Resolve versions, tag, push and publish changed packages.
    Publish {
        #[arg(long)]
        prerelease: Option<String>,
        #[arg(long, action)]
        dry_run: bool,
        #[arg(long)]
        lockfile_check_property: Option<String>,
        #[arg(long)]
        lockfile_copy_path: Option<PathBuf>,
    },
    /// Resolve versions, commit and tag changed packages.
    Release {
        #[arg(long)]
        prerelease: Option<String>,
        #[arg(long, action)]
        dry_run: bool,
        #[arg(long, value_enum, default_value = "abort")]
        on_uncommitted: UncommittedArg,
        #[arg(long, action)]
        no_push: bool,
    },
    /// Build changed packages and republish those whose published files changed.
    Sync {
        /// Package to sync; defaults to the package containing the current directory.
        package: Option<String>,
        /// Sync every package in dependency order.
        #[arg(long, action, conflicts_with = "package")]
        all: bool,
        #[arg(long, action)]
        dry_run: bool,
    },
    /// Forget every saved build and publish snapshot.
    Clean,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum UncommittedArg {
    Abort,
    Skip,
}

impl From<UncommittedArg> for UncommittedPolicy {
    fn from(arg: UncommittedArg) -> Self {
        match arg {
            UncommittedArg::Abort => UncommittedPolicy::Abort,
            UncommittedArg::Skip => UncommittedPolicy::Skip,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    ctrlc::set_handler(|| {
        eprintln!("Interrupted");
        std::process::exit(130);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;

    match cli.command {
        Commands::List { json } => commands::cmd_list(cli.root, json)?,
        Commands::Tree => commands::cmd_tree(cli.root)?,
        Commands::Each {
            script,
            changed,
            not_published,
            parallel,
            command,
        } => commands::cmd_each(cli.root, script, command, changed, not_published, parallel)?,
        Commands::Build => commands::cmd_build(cli.root)?,
        Commands::Publish {
            prerelease,
            dry_run,
            lockfile_check_property,
            lockfile_copy_path,
        } => commands::cmd_publish(
            cli.root,
            prerelease,
            dry_run,
            lockfile_check_property,
            lockfile_copy_path,
        )?,
        Commands::Release {
            prerelease,
            dry_run,
            on_uncommitted,
            no_push,
        } => commands::cmd_release(cli.root, prerelease, dry_run, on_uncommitted.into(), !no_push)?,
        Commands::Sync { package, all, dry_run } => commands::cmd_sync(cli.root, package, all, dry_run)?,
        Commands::Clean => commands::cmd_clean(cli.root)?,
    }

    Ok(())
}
