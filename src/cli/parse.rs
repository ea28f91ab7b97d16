//! CLI parse: clap types for outcache. No behavior; definitions only.

use crate::types::{ContentHash, OutputPropertySpec};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// outcache - content-addressed cache for task outputs
#[derive(Parser)]
#[command(name = "outcache")]
#[command(about = "Store and restore task outputs in a content-addressed cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory; relative output paths resolve against it
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot task outputs and store them under a cache key
    Store {
        /// Cache key label, hashed into the cache key
        #[arg(long)]
        key: String,
        /// Output property as <name>:<file|dir>:<path> (repeatable)
        #[arg(long = "output", required = true)]
        outputs: Vec<OutputPropertySpec>,
        /// Task path recorded in the origin metadata
        #[arg(long, default_value = ":task")]
        task: String,
        /// Task type recorded in the origin metadata
        #[arg(long, default_value = "Task")]
        task_type: String,
        /// Execution time of the task in milliseconds
        #[arg(long, default_value = "0")]
        duration_ms: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Restore task outputs stored under a cache key
    Load {
        /// Cache key label, hashed into the cache key
        #[arg(long)]
        key: String,
        /// Output property as <name>:<file|dir>:<path> (repeatable)
        #[arg(long = "output", required = true)]
        outputs: Vec<OutputPropertySpec>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show a stored entry
    Inspect {
        /// Entry hash (32 hex characters)
        hash: ContentHash,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the content hash of a file
    Hash {
        path: PathBuf,
    },
}
