use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "drivecat")]
#[command(about = "Local filesystem catalog and change tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a path into the catalog
    Scan {
        path: String,
        /// Wipe the drive's catalog data and start from scratch
        #[arg(long)]
        restart: bool,
        /// Non-interactive mode (restart unless an interrupted scan left a
        /// checkpoint)
        #[arg(long)]
        scheduled: bool,
        /// Bypass the scan lock
        #[arg(long)]
        force: bool,
    },
    /// Scan every canonical drive
    ScanAll {
        #[arg(long)]
        restart: bool,
    },
    /// Follow filesystem events and keep the catalog current
    Watch {
        /// Paths to watch; defaults to every canonical drive
        paths: Vec<String>,
    },
    /// Reconcile the catalog against the filesystem
    Check {
        /// Restrict the run to one subtree
        path: Option<String>,
    },
    /// Run the scheduled-scan dispatcher
    Schedule,
    /// Show lock, checkpoint and per-drive status
    Status,
    /// List canonical drives and alias mappings
    Drives,
    /// Print configuration values
    PrintConfig,
}
