//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Web access log sessionizer.
///
/// Groups requests by client, cuts them into sessions on inactivity gaps, and reports
/// session lengths, distinct resources per session and client engagement.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sessionize a log file and write session and engagement reports.
    Analyze {
        /// Access log to read.
        log: PathBuf,

        /// Fixed session window in minutes (disables window discovery).
        #[arg(long, allow_negative_numbers = true, conflicts_with = "discover")]
        window: Option<f64>,

        /// Discover the session window from the data.
        #[arg(long)]
        discover: bool,

        /// Largest candidate window, in minutes, tried during discovery.
        #[arg(long)]
        max_window: Option<u32>,

        /// Directory for report files.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,

        /// Skip writing report files.
        #[arg(long)]
        no_write: bool,
    },

    /// Sweep candidate windows and show the single-resource session share per window.
    Sweep {
        /// Access log to read.
        log: PathBuf,

        /// Largest candidate window in minutes.
        #[arg(long)]
        max_window: Option<u32>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
