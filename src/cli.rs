//! Command-line interface, built on clap.

use clap::{Parser, Subcommand};

/// Background fiscalisation of pending deal records.
#[derive(Debug, Parser)]
#[command(name = "fiscald", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "fiscald.toml")]
    pub config: String,

    /// Enable debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the polling worker until interrupted.
    Run {
        /// Process a single batch and exit.
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// Print the effective configuration and exit.
    Config,
}
