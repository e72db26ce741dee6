//! mapcache - Policy-driven memory-mapped file cache
//!
//! Keeps one file mapped into memory and refreshes the mapping according to
//! a staleness [`Policy`](cache::Policy): on every read, after every read,
//! on OS change notifications, on a timer, or never (descriptor only).
//!
//! ```no_run
//! use mapcache::{CachedFile, Policy};
//! use std::time::Duration;
//!
//! let cache = CachedFile::open("settings.json", Policy::Interval(Duration::from_secs(1)))?;
//! let contents = cache.read().expect("mapped");
//! println!("{}", String::from_utf8_lossy(&contents));
//! # Ok::<(), mapcache::CacheError>(())
//! ```

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod signal;
pub mod trigger;

pub use app::run_app;
pub use cache::{CacheError, CacheOptions, CachedFile, Policy, Snapshot};
