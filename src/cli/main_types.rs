use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sqv")]
#[command(about = "Browse SQLite database files: schema, paged tables and ad-hoc queries")]
#[command(version)]
pub struct Cli {
    /// Database file, opened read-only
    pub database: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub config_dir: Option<String>,

    /// Rows per page (overrides the config file)
    #[arg(long, global = true)]
    pub page_size: Option<u32>,

    /// Ad-hoc SQL timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List tables, views, indices and triggers
    Schema {
        /// Print the CREATE statement of one object instead
        object: Option<String>,
    },
    /// Page through a table or view
    Browse {
        table: String,
        /// Sort column
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// WHERE-clause fragment, e.g. "age > 30"
        #[arg(long)]
        filter: Option<String>,
        /// Row position to start from
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Number of consecutive pages to print
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// Run one SQL statement
    Sql { query: String },
    /// Print the complete value of one cell
    Cell {
        table: String,
        /// Row position (0-based) in natural order
        row: u64,
        column: String,
    },
}
