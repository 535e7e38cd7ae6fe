use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gradnet")]
#[command(author, version, about = "Media ledger administration for the Gradnet backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find external objects with no ledger record
    Orphans {
        /// Delete the orphans instead of only reporting them
        #[arg(long)]
        delete: bool,
    },

    /// Purge objects uploaded more than N days ago
    Purge {
        /// Age cutoff in days
        #[arg(long)]
        days: u32,

        /// Delete matching objects instead of only reporting them
        #[arg(long)]
        delete: bool,
    },

    /// Find ledger records whose external object is gone
    Dangling {
        /// Remove the stale records instead of only reporting them
        #[arg(long)]
        delete: bool,
    },

    /// Usage statistics aggregated from external-store metadata
    Stats,

    /// List this application's external objects, filtered on metadata
    ListExternal {
        /// Only objects uploaded by this account (UUID)
        #[arg(long)]
        uploader: Option<String>,

        /// Only objects uploaded at or after this RFC3339 timestamp
        #[arg(long)]
        after: Option<String>,

        /// Only objects uploaded before this RFC3339 timestamp
        #[arg(long)]
        before: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
