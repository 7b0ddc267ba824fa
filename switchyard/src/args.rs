use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Switchyard provider router
#[derive(Debug, Parser)]
#[command(
    name = "switchyard",
    about = "Route requests across providers with circuit breaking, retries, and fallback"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "switchyard.toml", env = "SWITCHYARD_CONFIG")]
    pub config: PathBuf,

    /// Log filter directive
    #[arg(long, global = true, default_value = "info", env = "SWITCHYARD_LOG")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the configuration and exit
    Validate,

    /// Show the routing decision for a prompt
    Route {
        /// Prompt to route
        #[arg(short, long)]
        prompt: String,

        /// Also execute the request against simulated providers
        #[arg(long)]
        execute: bool,
    },

    /// Drive simulated traffic through the engine and print statistics
    Simulate {
        /// Requests to send
        #[arg(short = 'n', long, default_value_t = 100)]
        requests: usize,

        /// Requests in flight at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Prompt sent with every request
        #[arg(short, long, default_value = "Write a function that parses a CSV line")]
        prompt: String,

        /// Skip the response cache
        #[arg(long)]
        bypass_cache: bool,
    },
}
