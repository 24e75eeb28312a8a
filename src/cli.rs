//! Command-line interface for orpheus

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orpheus")]
#[command(about = "Dataset version control on top of a relational store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override workspace location
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store the user that commands run as
    Config {
        /// User name
        #[arg(long)]
        user: String,
    },

    /// Show the current user
    Whoami,

    /// Create a dataset from a delimited file or an existing table
    Init {
        /// Input file, or table name with --from-table
        input: String,

        /// Name of the new dataset
        dataset: String,

        /// Table whose columns describe the file
        #[arg(short = 't', long)]
        table: Option<String>,

        /// Schema file describing the file's columns
        #[arg(short = 's', long)]
        schema: Option<PathBuf>,

        /// Treat the input as a table name
        #[arg(long)]
        from_table: bool,

        /// The input file starts with a header line
        #[arg(long)]
        header: bool,

        /// Field delimiter of the input file
        #[arg(short = 'd', long)]
        delimiter: Option<String>,

        /// Declared key attribute (repeatable)
        #[arg(short = 'k', long = "key")]
        key: Vec<String>,
    },

    /// Remove a dataset and its whole history
    Drop {
        /// Dataset name
        dataset: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List datasets, or the versions of one dataset
    Ls {
        /// Dataset to describe
        #[arg(short = 'd', long)]
        dataset: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Materialize one or more versions as a table or a file
    Checkout {
        /// Dataset name
        dataset: String,

        /// Versions to check out, merged when more than one
        #[arg(short = 'V', long = "vlist", required = true, num_args = 1.., value_delimiter = ',')]
        vlist: Vec<i64>,

        /// Destination table
        #[arg(short = 't', long)]
        table: Option<String>,

        /// Destination file
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Field delimiter of the destination file
        #[arg(short = 'd', long)]
        delimiter: Option<String>,

        /// Write a header line to the destination file
        #[arg(long)]
        header: bool,

        /// Append to an existing table and keep the first row of duplicate keys
        #[arg(long)]
        ignore: bool,
    },

    /// Record a checked out table or file as a new version
    Commit {
        /// Commit message
        #[arg(short = 'm', long)]
        message: String,

        /// Table to commit
        #[arg(short = 't', long)]
        table: Option<String>,

        /// File to commit
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Field delimiter of the file
        #[arg(short = 'd', long)]
        delimiter: Option<String>,

        /// The file starts with a header line
        #[arg(long)]
        header: bool,
    },

    /// Forget every recorded checkout lineage
    Clean,
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
