use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pose-capture")]
#[command(about = "Webcam pose and landmark dataset collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Capture samples interactively (default when no subcommand is given)
    Collect,
    /// Print the next free sample index for a folder
    NextIndex {
        folder: PathBuf,
        /// Filename prefix; leave empty for bare numbered files
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Summarize captured samples per pose folder
    Stats {
        /// Write CSV to stdout instead of a table
        #[arg(long)]
        csv: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Run the configured detector once on a blank frame
    CheckDetector,
}
