//! CLI argument definitions using clap
//!
//! Commands:
//! - geonames-api serve [--config <path>] [--host <host>] [--port <port>] [--base-dir <dir>] [--lazy]
//! - geonames-api init [--config <path>] [--base-dir <dir>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// GeoNames API - REST access to a GeoNames postal-code database
#[derive(Parser, Debug)]
#[command(name = "geonames-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,

        /// Base directory the data directory is resolved against
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Defer database setup to the first request
        #[arg(long)]
        lazy: bool,
    },

    /// Create the data directory and check it is writable
    Init {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base directory the data directory is resolved against
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
