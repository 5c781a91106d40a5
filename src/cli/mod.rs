//! CLI module for replicator - command-line interface and subcommands.
//!
//! Runs plan files through the replication manager, lists the options a
//! plan generates, and prints the effective configuration.

pub mod commands;

pub use commands::Cli;
