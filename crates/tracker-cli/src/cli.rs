//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tracker")]
#[command(author, version, about = "Store LoRaWAN GPS tracker reports and export them as GPX", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a fresh tracker database
    Init {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Store saved uplink bodies, one JSON document per file
    Ingest {
        #[command(flatten)]
        store: StoreArgs,

        /// Files holding one raw uplink body each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the track of a time window to a GPX file
    Export(ExportArgs),
}

/// Reusable database location argument
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Database file, or use TRACKER_DB env var
    #[arg(short = 'i', long = "database", env = "TRACKER_DB")]
    pub database: Option<PathBuf>,
}

impl StoreArgs {
    /// The given database path, or the platform default.
    pub fn path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(tracker_store::default_db_path)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Start of the window, inclusive (YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC3339)
    #[arg(short, long = "from-date")]
    pub from: String,

    /// End of the window, exclusive (same formats as --from-date)
    #[arg(short, long = "before-date")]
    pub before: String,

    /// GPX file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Leave out hotspot waypoints
    #[arg(short = 'n', long)]
    pub no_hotspots: bool,

    /// Read dates without an offset as UTC instead of local time
    #[arg(long)]
    pub utc: bool,

    /// Drop points that saw fewer satellites than this
    #[arg(long, default_value_t = 3)]
    pub min_satellites: u32,

    /// Emit one waypoint per hotspot name
    #[arg(long)]
    pub dedup_hotspots: bool,

    /// Name of the GPX track
    #[arg(long)]
    pub track_name: Option<String>,
}
