//! Integration tests for layered configuration.
//!
//! These tests cover defaults, TOML file parsing, environment variable
//! overrides and command-line overrides applied on top.

use clap::Parser;
use mapcache::cache::Policy;
use mapcache::cli::{Cli, Commands};
use mapcache::config::Config;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all MAPCACHE_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("MAPCACHE_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(
        &config_path,
        r#"
policy = "interval:2s"
watch = false
poll_interval_ms = 250
"#,
    )
    .unwrap();

    let config = Config::load_from(Some(&config_path)).unwrap();
    assert_eq!(config.policy, Policy::Interval(Duration::from_secs(2)));
    assert!(!config.watch);
    assert_eq!(config.poll_interval(), Duration::from_millis(250));
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();

    let config = Config::load_from(Some(&temp_dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_partial_file_keeps_other_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "policy = \"OLD_COPY\"\n").unwrap();

    let config = Config::load_from(Some(&config_path)).unwrap();
    assert_eq!(config.policy, Policy::OldCopy);
    assert!(config.watch);
    assert_eq!(config.poll_interval_ms, 500);
}

#[test]
fn test_config_hierarchy_defaults_file_env_cli() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    // 1. Config file overrides defaults
    fs::write(
        &config_path,
        r#"
policy = "old-copy"
poll_interval_ms = 100
"#,
    )
    .unwrap();

    // 2. Environment variables override the config file
    std::env::set_var("MAPCACHE_POLICY", "up2date");
    std::env::set_var("MAPCACHE_WATCH", "false");

    let mut config = Config::load_from(Some(&config_path)).unwrap();
    assert_eq!(config.policy, Policy::Up2Date);
    assert!(!config.watch);
    assert_eq!(config.poll_interval_ms, 100);

    // 3. CLI flags override environment variables
    let cli = Cli::try_parse_from([
        "mapcache",
        "watch",
        "/file",
        "--policy",
        "no-reserve",
        "--poll",
        "1s",
    ])
    .unwrap();
    if let Commands::Watch(args) = &cli.command {
        config.apply_overrides(args.cache.policy, args.cache.no_watch, args.poll);
    }
    assert_eq!(config.policy, Policy::NoReserve);
    assert!(!config.watch);
    assert_eq!(config.poll_interval_ms, 1000);

    std::env::remove_var("MAPCACHE_POLICY");
    std::env::remove_var("MAPCACHE_WATCH");
}

#[test]
fn test_config_invalid_policy_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "policy = \"sometimes\"\n").unwrap();

    assert!(Config::load_from(Some(&config_path)).is_err());
    // The lenient loader falls back to defaults
    assert_eq!(Config::load(Some(&config_path)), Config::default());
}

#[test]
fn test_config_zero_poll_interval_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "poll_interval_ms = 0\n").unwrap();

    let err = Config::load_from(Some(&config_path)).unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[test]
fn test_config_invalid_type_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "watch = \"often\"\n").unwrap();

    assert!(Config::load_from(Some(&config_path)).is_err());
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = Config {
        policy: Policy::Interval(Duration::from_millis(1500)),
        watch: false,
        poll_interval_ms: 42,
    };
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("interval:1500ms"));

    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
