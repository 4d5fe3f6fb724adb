use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dupe-review")]
#[command(about = "Score duplicate candidates and replay scan sessions", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./Config.toml overlaid with DUPE_REVIEW_* variables)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score recorded candidate measurements, then re-score with changed settings
    Evaluate {
        /// JSON file with an array of {"id", "measurements": [{"signal", "distance", "threshold"?}]}
        input: PathBuf,
        /// Enable a signal before re-scoring
        #[arg(long = "enable", value_name = "SIGNAL")]
        enable: Vec<String>,
        /// Disable a signal before re-scoring
        #[arg(long = "disable", value_name = "SIGNAL")]
        disable: Vec<String>,
        /// Overall confidence threshold to apply before re-scoring
        #[arg(long, value_name = "VALUE")]
        threshold: Option<f64>,
        /// Print the final session snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drive a scan session from a recorded JSON scan log
    Replay {
        input: PathBuf,
    },
    /// List known signals and whether they are enabled
    Signals,
    /// Print configuration values
    PrintConfig,
}
