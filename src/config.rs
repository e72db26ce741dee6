//! Layered configuration for the `mapcache` tool.
//!
//! Sources are merged with `figment`, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `MAPCACHE_*` environment variables
//! 4. Command-line flags (applied by [`Config::apply_overrides`])
//!
//! ```toml
//! policy = "interval:2s"
//! watch = true
//! poll_interval_ms = 250
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheOptions, Policy};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "MAPCACHE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Staleness policy used when `--policy` is not given.
    pub policy: Policy,
    /// Allow OS change notification for the `up2date` policy.
    pub watch: bool,
    /// How often `mapcache watch` reads the cache, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: Policy::LazyUp2Date,
            watch: true,
            poll_interval_ms: 500,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults on any error.
    pub fn load(path: Option<&Path>) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load and validate configuration.
    ///
    /// With `path == None` the platform default location is used if it
    /// exists. A missing file contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value is invalid.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = path.map(Path::to_path_buf).or_else(Self::default_path);

        let config: Config = Self::figment(file.as_deref())
            .extract()
            .context("Invalid configuration")?;
        config.validate()?;

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// The merged figment for `file`, without CLI overrides.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// `config.toml` in the platform-specific configuration directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "mapcache", "mapcache")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero poll interval or an unusable policy.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        self.policy.validate()?;
        Ok(())
    }

    /// Apply command-line flags on top of the loaded layers.
    pub fn apply_overrides(
        &mut self,
        policy: Option<Policy>,
        no_watch: bool,
        poll: Option<Duration>,
    ) {
        if let Some(policy) = policy {
            self.policy = policy;
        }
        if no_watch {
            self.watch = false;
        }
        if let Some(poll) = poll {
            self.poll_interval_ms = u64::try_from(poll.as_millis()).unwrap_or(u64::MAX).max(1);
        }
    }

    /// Options for opening a cache with this configuration.
    #[must_use]
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::new(self.policy).with_watch(self.watch)
    }

    /// The `watch` command's poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
