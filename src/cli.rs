use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect, configure and test mini-site source mappings
#[derive(Parser)]
#[command(name = "minisite")]
#[command(about = "A CLI tool for managing mini-site source mappings", long_about = None)]
pub struct Cli {
    /// Database URL (defaults to a SQLite file in the data directory)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Settings file (defaults to minisite.toml in the config directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print built-in configuration templates as JSON
    Templates {
        /// Only this kind (movie, book, music)
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Parse a local document with a configuration file, without touching the database
    Parse {
        /// ContentTypeConfiguration JSON file
        #[arg(short, long)]
        config: PathBuf,
        /// Response document to parse
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Manage stored source configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Fetch and decode one listing page for a source
    Fetch {
        source: String,
        url: String,
        /// Ignore the cached document
        #[arg(long)]
        refresh: bool,
    },
    /// List stored items of a source
    Items {
        source: String,
        #[arg(short, long)]
        category: Option<i64>,
    },
    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Store a SourceConfiguration JSON file
    Set { file: PathBuf },
    /// Print the stored configuration of a source
    Show { source: String },
    /// Remove the stored configuration of a source
    Delete { source: String },
    /// List configured sources
    List,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop cached documents, optionally only keys starting with a prefix
    Clear {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Compact the database
    Vacuum,
}
