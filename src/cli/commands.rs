//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Incremental extractor for the dbt Cloud administrative API
#[derive(Parser, Debug)]
#[command(name = "dbt-cloud-source")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON (takes precedence over --config)
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Directory with openapi_<version>.yaml files, instead of the bundled ones
    #[arg(long, global = true)]
    pub schema_dir: Option<PathBuf>,

    /// URL of the OpenAPI documents, `{version}` is replaced by v2/v3
    #[arg(long, global = true, conflicts_with = "schema_dir")]
    pub schema_url: Option<String>,

    /// Output format for catalog and spec output
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Emit the catalog with resolved schemas (no data is fetched)
    Discover,

    /// Read data from streams
    Read {
        /// Streams to sync (comma-separated, empty = defaults)
        #[arg(long)]
        streams: Option<String>,

        /// State file (JSON), read at start and written back at the end
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Inline state JSON
        #[arg(long)]
        state_json: Option<String>,

        /// Stop at the first failed partition
        #[arg(long)]
        fail_fast: bool,
    },

    /// List stream names and whether they are selected by default
    Streams,

    /// Show the configuration JSON schema
    Spec,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
