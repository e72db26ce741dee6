//! Subcommand implementations for the `mapcache` binary.

use anyhow::{Context, Result};
use bytesize::ByteSize;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::SystemTime;

use crate::cache::{CacheOptions, CachedFile, Policy, RefreshStats};
use crate::cli::{CacheArgs, CatArgs, Cli, Commands, InfoArgs, WatchArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::signal::{install_handler, ShutdownHandler};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error if the cache cannot be opened or output fails.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);
    let config = Config::load(cli.config.as_deref());

    match cli.command {
        Commands::Cat(args) => run_cat(&config, args, &mut io::stdout().lock()),
        Commands::Watch(args) => {
            let shutdown = install_handler()?;
            run_watch(&config, args, &shutdown, &mut io::stdout().lock())
        }
        Commands::Info(args) => run_info(&config, args, &mut io::stdout().lock()),
    }
}

fn open_cache(config: &Config, args: &CacheArgs) -> Result<CachedFile> {
    let mut config = config.clone();
    config.apply_overrides(args.policy, args.no_watch, None);
    open_with(&args.path, config.cache_options())
}

fn open_with(path: &Path, options: CacheOptions) -> Result<CachedFile> {
    let cache = CachedFile::with_options(path, options)
        .with_context(|| format!("Failed to cache {}", path.display()))?;
    log::debug!(
        "Caching {} with policy {} (watching: {})",
        path.display(),
        cache.policy(),
        cache.is_watching()
    );
    Ok(cache)
}

/// Write the file's contents to `out`.
///
/// Under `no-reserve`, or when the file could not be mapped, the bytes are
/// streamed from a duplicate of the cache's descriptor instead.
pub fn run_cat(config: &Config, args: CatArgs, out: &mut impl Write) -> Result<ExitCode> {
    let cache = open_cache(config, &args.cache)?;

    match cache.read() {
        Some(bytes) => out.write_all(&bytes).context("Failed to write output")?,
        None => {
            if cache.policy() != Policy::NoReserve {
                log::warn!(
                    "{} is not mapped, reading through the descriptor",
                    cache.path().display()
                );
            }
            let mut file = cache
                .try_clone_descriptor()
                .context("Failed to duplicate descriptor")?;
            io::copy(&mut file, out).context("Failed to copy file contents")?;
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(ExitCode::Success)
}

/// Keep the file cached and print `<timestamp> <size>` on every refresh.
///
/// Returns [`ExitCode::Interrupted`] when `shutdown` is requested, or
/// [`ExitCode::Success`] after `--count` refreshes.
pub fn run_watch(
    config: &Config,
    args: WatchArgs,
    shutdown: &ShutdownHandler,
    out: &mut impl Write,
) -> Result<ExitCode> {
    let mut config = config.clone();
    config.apply_overrides(args.cache.policy, args.cache.no_watch, args.poll);

    let cache = open_with(&args.cache.path, config.cache_options())?;
    let poll = config.poll_interval();
    log::info!(
        "Watching {} (policy {}, poll every {:?})",
        cache.path().display(),
        cache.policy(),
        poll
    );

    let mut seen = cache.last_updated();
    report(out, seen, cache.status().len)?;

    let mut refreshes = 0u64;
    while !shutdown.is_shutdown_requested() {
        thread::sleep(poll);

        // Drives the read-time policies; background ones just observe
        drop(cache.read());

        let updated = cache.last_updated();
        if updated == seen {
            continue;
        }
        seen = updated;
        refreshes += 1;

        let size = cache.status().len;
        log::info!("{} refreshed ({})", cache.path().display(), ByteSize(size));
        report(out, updated, size)?;

        if args.count.is_some_and(|count| refreshes >= count) {
            return Ok(ExitCode::Success);
        }
    }

    Ok(ExitCode::Interrupted)
}

fn report(out: &mut impl Write, when: SystemTime, size: u64) -> Result<()> {
    let when: DateTime<Local> = when.into();
    writeln!(out, "{} {}", when.to_rfc3339(), size).context("Failed to write output")?;
    out.flush().context("Failed to flush output")
}

/// Cache state reported by `mapcache info`.
#[derive(Debug, Serialize)]
pub struct CacheInfo {
    /// Cached path
    pub path: PathBuf,
    /// Policy in its string form
    pub policy: String,
    /// Size recorded at the last refresh
    pub size: u64,
    /// Whether a mapping is held
    pub mapped: bool,
    /// Whether OS change notification is active
    pub watching: bool,
    /// Time of the last successful refresh
    pub last_updated: DateTime<Local>,
    /// Most recent absorbed failure
    pub last_error: Option<String>,
    /// Refresh counters
    pub stats: RefreshStats,
}

impl CacheInfo {
    /// Collect the report for an open cache.
    #[must_use]
    pub fn collect(cache: &CachedFile) -> Self {
        let mapped = cache.policy().maps() && cache.read().is_some();
        Self {
            path: cache.path().to_path_buf(),
            policy: cache.policy().to_string(),
            size: cache.status().len,
            mapped,
            watching: cache.is_watching(),
            last_updated: cache.last_updated().into(),
            last_error: cache.last_error(),
            stats: cache.stats(),
        }
    }
}

/// Print the cache state as text or JSON.
pub fn run_info(config: &Config, args: InfoArgs, out: &mut impl Write) -> Result<ExitCode> {
    let cache = open_cache(config, &args.cache)?;
    let info = CacheInfo::collect(&cache);

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize report")?;
        writeln!(out, "{}", json).context("Failed to write output")?;
    } else {
        writeln!(out, "path:         {}", info.path.display())?;
        writeln!(out, "policy:       {}", info.policy)?;
        writeln!(out, "size:         {} ({} bytes)", ByteSize(info.size), info.size)?;
        writeln!(out, "mapped:       {}", info.mapped)?;
        writeln!(out, "watching:     {}", info.watching)?;
        writeln!(out, "last updated: {}", info.last_updated.to_rfc3339())?;
        if let Some(error) = &info.last_error {
            writeln!(out, "last error:   {}", error)?;
        }
    }

    Ok(ExitCode::Success)
}
