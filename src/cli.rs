//! CLI definitions for jobmesh.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// jobmesh CLI.
#[derive(Parser)]
#[command(name = "jobmesh")]
#[command(about = "In-process job queue with consumer groups and recurring schedules")]
#[command(version)]
pub(crate) struct Cli {
    /// Settings file path
    #[arg(short, long, default_value = "config/jobmesh.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the queue in foreground until Ctrl-C (default)
    Run,

    /// Check the settings file and exit
    Validate,

    /// Print upcoming fire times of a cron expression
    CronNext {
        /// Cron expression (5, 6 or 7 fields)
        expression: String,

        /// Number of fire times to print
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}
