use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tabvault", version)]
#[command(about = "Keep the most recent uploaded spreadsheets and their rows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "TABVAULT_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Primary store connection string, e.g. redb:///var/lib/tabvault/primary.redb
    #[arg(long, global = true, env = "TABVAULT_PRIMARY")]
    pub primary: Option<String>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store an uploaded file together with its extracted rows
    #[command(alias = "add")]
    Ingest {
        /// The original upload (.xlsx, .xls or .csv)
        file: PathBuf,

        /// JSON document with the extracted table: {"headers": [...], "rows": [{...}]}
        #[arg(short, long)]
        data: PathBuf,
    },

    /// List the most recent records
    #[command(alias = "ls")]
    Recent {
        /// How many to show (defaults to the configured recent-limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one record with its rows
    #[command(alias = "v")]
    Show { id: String },

    /// Delete one or more records
    #[command(alias = "rm")]
    Delete {
        /// Record ids
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Check and repair consistency between the indexes and stored files
    Doctor,

    /// Get or set configuration
    Config {
        /// Configuration key (e.g., retention-count)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
