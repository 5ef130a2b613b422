//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `serve`: long-running mode driven by settings objects on stdin
//! - `drive`: one-shot scan, configure and rip
//! - `staging`: one-shot staging area maintenance

mod drive;
mod serve;
mod staging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::ripper::{ProcessRunner, TokioRunner};
use crate::staging::StagingRepository;
use crate::status::LogStatus;
use crate::transfer::ShareTransfer;
use crate::workflow::{ControllerOptions, WorkflowController};

pub use drive::{cmd_configure, cmd_rip, cmd_scan, cmd_snapshot};
pub use serve::cmd_serve;
pub use staging::{StagingCommand, cmd_staging};

/// Rip Minder CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory the ripping tool writes into
    #[arg(long, global = true, env = "RIP_MINDER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Push destination: absolute path, ~/path or //host/share[/path]
    #[arg(long, global = true)]
    pub share: Option<String>,

    /// SMB user name
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// SMB password (never stored)
    #[arg(long, global = true, env = "RIP_MINDER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Only log status updates, don't echo them
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan the drive, then take settings objects (JSON, one per line) from stdin
    Serve,
    /// Look for the drive
    Scan,
    /// Configure the drive (analyze, then find the read offset)
    Configure,
    /// Rip the inserted disc into the staging area
    Rip {
        /// Push the album right after ripping
        #[arg(long)]
        push: bool,
    },
    /// Print the workflow snapshot as JSON
    Snapshot,
    /// Manage the staging area
    Staging {
        #[command(subcommand)]
        command: StagingCommand,
    },
    /// Show the config file location, optionally writing the current settings to it
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    /// Configuration with command-line overrides applied.
    pub fn effective_config(&self) -> Config {
        let mut config = match &self.config {
            Some(path) => config::load_from(path),
            None => config::load(),
        };
        if let Some(dir) = &self.output_dir {
            config.ripper.output_dir = dir.clone();
        }
        if let Some(share) = &self.share {
            config.transfer.share = Some(share.clone());
        }
        if let Some(user) = &self.user {
            config.transfer.user = Some(user.clone());
        }
        config
    }
}

/// Build the controller with real collaborators and the persisted staging area.
pub fn build_controller(cli: &Cli, config: &Config) -> Result<WorkflowController> {
    if config.ripper.command.trim().is_empty() {
        return Err(Error::config("ripper.command must not be empty"));
    }

    let staging_path = config.ripper.staging_path();
    let staging = StagingRepository::load(&staging_path, config.ripper.output_dir.clone())
        .map_err(|e| Error::from(e).context(format!("loading {}", staging_path.display())))?;

    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioRunner);
    let transfer = Arc::new(ShareTransfer::new(
        runner.clone(),
        config.transfer.smb_command.clone(),
    ));

    let mut options = ControllerOptions::from_config(config);
    options.credentials.password = cli.password.clone();

    Ok(WorkflowController::new(
        options,
        staging,
        runner,
        transfer,
        Arc::new(LogStatus { quiet: cli.quiet }),
    ))
}

/// Run the requested command (`serve` when none is given).
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.effective_config();

    if let Some(Commands::Config { init }) = &cli.command {
        return cmd_config(&config, *init);
    }

    let rt = Runtime::new()?;
    let controller = build_controller(cli, &config)?;

    match &cli.command {
        None | Some(Commands::Serve) => cmd_serve(&rt, controller),
        Some(Commands::Scan) => cmd_scan(&rt, controller),
        Some(Commands::Configure) => cmd_configure(&rt, controller),
        Some(Commands::Rip { push }) => cmd_rip(&rt, controller, *push),
        Some(Commands::Snapshot) => cmd_snapshot(&rt, controller),
        Some(Commands::Staging { command }) => cmd_staging(&rt, controller, command),
        Some(Commands::Config { .. }) => Ok(()),
    }
}

fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    match config::config_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    if init {
        config::save(config)?;
        println!("Configuration written.");
    }
    Ok(())
}

/// Fail the command when its last status was an error.
pub(crate) fn finish(controller: &WorkflowController) -> anyhow::Result<()> {
    controller.save_staging()?;
    match controller.snapshot().last_status {
        Some(status) if status.is_error => anyhow::bail!("{}", status.message),
        _ => Ok(()),
    }
}
