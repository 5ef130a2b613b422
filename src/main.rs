//! Rip Minder - unattended CD ripping coordinator.
//!
//! Drives the `whipper` ripping tool, stages ripped albums until they are
//! pushed to a local directory or SMB share, and merges multi-disc albums.

pub mod cli;
pub mod config;
pub mod error;
pub mod ripper;
pub mod settings;
pub mod staging;
pub mod status;
#[cfg(test)]
pub mod test_utils;
pub mod transfer;
pub mod workflow;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Levels for the crate's log targets when `RUST_LOG` is not set.
const LOG_DIRECTIVES: &[&str] = &[
    "rip_minder=info",
    "ripper=info",
    "staging=info",
    "status=info",
    "transfer=info",
    "workflow=info",
];

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging (stderr, so stdout stays for status and JSON output)
    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        for directive in LOG_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
