//! Command-line interface for rip-minder.
//!
//! Without a subcommand the program runs in `serve` mode; the other
//! subcommands run a single workflow step and exit.

mod commands;

pub use commands::{Cli, Commands, StagingCommand, build_controller, run_command};
