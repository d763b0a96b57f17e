//! CLI module - command-line interface for Scopewatch
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Scopewatch - reconnaissance asset tracker
/// Keeps hosts, ports and domains per project and drives nmap/masscan/subdomain scans
#[derive(Parser)]
#[command(name = "scopewatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server and the cron scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List the projects owned by a user
    #[command(alias = "ls")]
    Projects {
        /// Owner username
        owner: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user even when open registration is disabled
    Add {
        username: String,
        /// Initial password
        #[arg(long)]
        password: String,
    },
    /// Delete a user and every project they own
    #[command(alias = "rm")]
    Delete { username: String },
}

pub use commands::*;
