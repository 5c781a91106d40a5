//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: replicate a plan's tasks with the command workload
//! - options: show generated options and their adapted parameters
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Replicator - adaptive replication scheduler
#[derive(Parser, Debug)]
#[command(name = "replicator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replicate the tasks of a plan file
    Run {
        /// Plan file (YAML)
        plan: PathBuf,

        /// Only run the task with this id
        #[arg(short, long)]
        task: Option<String>,
    },

    /// List the options a plan generates, with adapted parameters
    Options {
        /// Plan file (YAML)
        plan: PathBuf,

        /// Only show the task with this id
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Print the effective configuration
    Config,
}
