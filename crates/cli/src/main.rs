//! crawlcache command-line entry point.
//!
//! Inspects a crawler response cache. Reports are printed to stdout as JSON;
//! logging goes to stderr so stdout stays machine-readable.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crawlcache_core::{CacheConfig, HttpCacheStore};

mod args;
mod commands;

use args::{Cli, Commands};
use commands::GetOutcome;

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    run(Cli::parse()).map(ExitCode::from)
}

/// Dispatch one command and return its exit code.
fn run(cli: Cli) -> Result<u8> {
    let Cli { config, location, command } = cli;

    match command {
        Commands::Fingerprint { method, include_headers, headers, url } => {
            print_json(&commands::fingerprint(&method, &include_headers, &headers, &url)?)?;
            Ok(0)
        }
        Commands::Init => {
            let (config, store) = open_store(config.as_deref(), location)?;
            print_json(&commands::init(&store, &config)?)?;
            store.close()?;
            Ok(0)
        }
        Commands::Get { namespace, fingerprint, max_age } => {
            let (config, store) = open_store(config.as_deref(), location)?;
            let outcome = commands::get(&store, &config, namespace, &fingerprint, max_age)?;
            match &outcome {
                GetOutcome::Hit(view) => print_json(view)?,
                GetOutcome::Miss => tracing::info!(%fingerprint, "cache miss"),
                GetOutcome::Corrupt(reason) => tracing::error!(%fingerprint, %reason, "corrupt cache entry"),
            }
            store.close()?;
            Ok(outcome.exit_code())
        }
        Commands::Stats => {
            let (_, store) = open_store(config.as_deref(), location)?;
            print_json(&commands::stats(&store)?)?;
            store.close()?;
            Ok(0)
        }
    }
}

fn open_store(file: Option<&Path>, location: Option<PathBuf>) -> Result<(CacheConfig, HttpCacheStore)> {
    let mut config = match file {
        Some(path) => CacheConfig::load_from(Some(path)),
        None => CacheConfig::load(),
    }
    .context("loading configuration")?;

    if let Some(location) = location {
        config.cache_location = location;
    }

    let store = HttpCacheStore::open_with_config(&config)
        .with_context(|| format!("opening cache at {}", config.cache_location.display()))?;
    Ok((config, store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
