//! Command-line interface definitions for `mapcache`.
//!
//! ```bash
//! # Print a file through the cache
//! mapcache cat ./assets/index.html
//!
//! # Follow a file, refreshing it every two seconds
//! mapcache watch ./settings.json --policy interval:2s
//!
//! # Inspect the cache state as JSON
//! mapcache info ./data.bin --policy up2date --json
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::policy::parse_duration;
use crate::cache::Policy;

/// Policy-driven memory-mapped file cache.
#[derive(Debug, Parser)]
#[command(name = "mapcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true, env = "MAPCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read a file once through the cache and write it to stdout
    Cat(CatArgs),
    /// Keep a file cached and report every refresh until Ctrl+C
    Watch(WatchArgs),
    /// Show the cache state for a file
    Info(InfoArgs),
}

/// Arguments shared by every subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// File to cache
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Staleness policy: no-reserve, old-copy, up2date, lazy-up2date, interval:<duration>
    #[arg(short, long, value_name = "POLICY", value_parser = parse_policy)]
    pub policy: Option<Policy>,

    /// Disable OS change notification (up2date refreshes on read instead)
    #[arg(long)]
    pub no_watch: bool,
}

/// Arguments for the cat subcommand.
#[derive(Debug, Args)]
pub struct CatArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Arguments for the watch subcommand.
#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// How often to read the cache (e.g., 250ms, 1s)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub poll: Option<Duration>,

    /// Exit successfully after this many refreshes
    #[arg(long, value_name = "N")]
    pub count: Option<u64>,
}

/// Arguments for the info subcommand.
#[derive(Debug, Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a policy argument.
///
/// # Errors
///
/// Returns the policy parser's message for unknown names or bad intervals.
pub fn parse_policy(s: &str) -> Result<Policy, String> {
    s.parse::<Policy>().map_err(|e| e.to_string())
}
