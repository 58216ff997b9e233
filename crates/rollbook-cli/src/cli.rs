use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rollbook",
    about = "Rollbook: keep a roll of named scores in a flat file",
    version
)]
pub struct Cli {
    /// Path to the backing file
    #[arg(long, global = true, default_value = "students_db.csv")]
    pub db: PathBuf,

    /// Milliseconds to wait for the initial load before continuing
    #[arg(long, global = true, default_value_t = 5000)]
    pub load_wait_ms: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive menu (the default when no subcommand is given)
    Shell,

    /// Add one record
    Add {
        /// Record ID (positive integer)
        #[arg(long)]
        id: u32,

        /// Display name
        #[arg(long)]
        name: String,

        /// Score between 0 and 100
        #[arg(long)]
        score: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace fields of an existing record
    Update {
        /// Record ID
        #[arg(long)]
        id: u32,

        /// New name (kept when omitted)
        #[arg(long)]
        name: Option<String>,

        /// New score (kept when omitted)
        #[arg(long)]
        score: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete one record
    Delete {
        /// Record ID
        #[arg(long)]
        id: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one record
    Get {
        /// Record ID
        #[arg(long)]
        id: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all records
    List {
        /// Sort by score, highest first (default: by ID)
        #[arg(long)]
        by_score: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
