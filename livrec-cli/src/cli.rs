use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "livrec", version, about = "Automatic live stream recorder")]
pub struct Args {
    /// Path to the streamers config file (JSON)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory for daily-rotated log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
