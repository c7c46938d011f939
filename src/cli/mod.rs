//! CLI module for the GeoNames API
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP server
//! - init: Prepare the data directory

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, serve, Overrides};
pub use errors::{CliError, CliErrorCode, CliResult};
