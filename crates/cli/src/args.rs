//! Command-line surface for `crawlcache`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "crawlcache", version, about = "Inspect a crawler HTTP response cache", long_about = None)]
pub struct Cli {
    /// TOML config file (overrides CRAWLCACHE_CONFIG_FILE)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache file, overriding the configured location
    #[arg(long, global = true)]
    pub location: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the cache, creating the schema if needed
    Init,
    /// Look up one cached response
    Get {
        /// Namespace to read from (defaults to the configured one)
        #[arg(long)]
        namespace: Option<String>,
        /// Request fingerprint, hex encoded
        #[arg(long)]
        fingerprint: String,
        /// Maximum age in seconds; 0 accepts any age
        #[arg(long)]
        max_age: Option<u64>,
    },
    /// Per-namespace entry counts and ages
    Stats,
    /// Print the default fingerprint of a body-less request
    Fingerprint {
        #[arg(long, default_value = "GET")]
        method: String,
        /// Header whose value is part of the fingerprint (repeatable)
        #[arg(long = "include-header", value_name = "NAME")]
        include_headers: Vec<String>,
        /// Header sent with the request, as NAME:VALUE (repeatable)
        #[arg(long = "header", value_name = "NAME:VALUE")]
        headers: Vec<String>,
        url: String,
    },
}
