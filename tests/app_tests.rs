//! End-to-end tests for the `mapcache` subcommands.

use clap::Parser;
use mapcache::app::{run_cat, run_info, run_watch};
use mapcache::cli::{Cli, Commands};
use mapcache::config::Config;
use mapcache::error::{ExitCode, StructuredError};
use mapcache::signal::ShutdownHandler;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["mapcache"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cat_writes_file_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("page.html");
    fs::write(&path, b"<h1>hello</h1>").unwrap();

    let Commands::Cat(args) = parse(&["cat", path_arg(&path)]) else {
        panic!("Expected Cat command");
    };
    let mut out = Vec::new();
    let code = run_cat(&Config::default(), args, &mut out).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(out, b"<h1>hello</h1>");
}

#[test]
fn test_cat_no_reserve_reads_through_descriptor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.txt");
    fs::write(&path, b"streamed").unwrap();

    let Commands::Cat(args) = parse(&["cat", path_arg(&path), "--policy", "no-reserve"]) else {
        panic!("Expected Cat command");
    };
    let mut out = Vec::new();
    run_cat(&Config::default(), args, &mut out).unwrap();

    assert_eq!(out, b"streamed");
}

#[test]
fn test_cat_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty");
    fs::write(&path, b"").unwrap();

    let Commands::Cat(args) = parse(&["cat", path_arg(&path)]) else {
        panic!("Expected Cat command");
    };
    let mut out = Vec::new();
    run_cat(&Config::default(), args, &mut out).unwrap();

    assert!(out.is_empty());
}

#[test]
fn test_cat_missing_file_maps_to_open_failed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent");

    let Commands::Cat(args) = parse(&["cat", path_arg(&path)]) else {
        panic!("Expected Cat command");
    };
    let err = run_cat(&Config::default(), args, &mut Vec::new()).unwrap_err();

    let code = ExitCode::for_error(&err);
    assert_eq!(code, ExitCode::OpenFailed);

    let structured = StructuredError::new(&err, code);
    assert_eq!(structured.code, "MC002");
    assert_eq!(structured.exit_code, 2);
    assert!(structured.message.contains("absent"));
}

#[test]
fn test_info_json_report() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, vec![7u8; 4096]).unwrap();

    let Commands::Info(args) = parse(&["info", path_arg(&path), "-p", "old-copy", "--json"]) else {
        panic!("Expected Info command");
    };
    let mut out = Vec::new();
    run_info(&Config::default(), args, &mut out).unwrap();

    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["policy"], "old-copy");
    assert_eq!(report["size"], 4096);
    assert_eq!(report["mapped"], true);
    assert_eq!(report["watching"], false);
    assert!(report["last_error"].is_null());
    assert!(report["stats"]["checks"].is_u64());
}

#[test]
fn test_info_text_report_uses_config_policy() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.bin");
    fs::write(&path, b"abc").unwrap();

    let config = Config {
        policy: mapcache::cache::Policy::NoReserve,
        ..Config::default()
    };
    let Commands::Info(args) = parse(&["info", path_arg(&path)]) else {
        panic!("Expected Info command");
    };
    let mut out = Vec::new();
    run_info(&config, args, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("policy:       no-reserve"));
    assert!(text.contains("mapped:       false"));
    assert!(text.contains("(3 bytes)"));
}

#[test]
fn test_watch_reports_refreshes_until_count() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, b"{}").unwrap();

    let Commands::Watch(args) = parse(&[
        "watch",
        path_arg(&path),
        "--policy",
        "lazy-up2date",
        "--poll",
        "20ms",
        "--count",
        "1",
    ]) else {
        panic!("Expected Watch command");
    };

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        fs::write(&writer_path, br#"{"level": "debug"}"#).unwrap();
    });

    let mut out = Vec::new();
    let code = run_watch(&Config::default(), args, &ShutdownHandler::new(), &mut out).unwrap();
    writer.join().unwrap();

    assert_eq!(code, ExitCode::Success);
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" 2"));
    assert!(lines[1].ends_with(" 18"));
}

#[test]
fn test_watch_stops_on_shutdown() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("f.txt");
    fs::write(&path, b"x").unwrap();

    let Commands::Watch(args) = parse(&["watch", path_arg(&path), "--poll", "10ms"]) else {
        panic!("Expected Watch command");
    };
    let shutdown = ShutdownHandler::new();
    shutdown.request_shutdown();

    let mut out = Vec::new();
    let code = run_watch(&Config::default(), args, &shutdown, &mut out).unwrap();

    assert_eq!(code, ExitCode::Interrupted);
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
}
