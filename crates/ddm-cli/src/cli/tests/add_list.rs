//! Tests for the `add` and `list` subcommands.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_add_minimal() {
    match parse(&["ddm", "add", "https://example.com/x.iso", "/tmp/x.iso"]) {
        CliCommand::Add { url, path, chunks, workers } => {
            assert_eq!(url, "https://example.com/x.iso");
            assert_eq!(path, "/tmp/x.iso");
            assert!(chunks.is_none());
            assert!(workers.is_none());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_with_chunks_and_workers() {
    match parse(&[
        "ddm", "add", "https://example.com/x.iso", "/tmp/x.iso", "--chunks", "8", "--workers", "4",
    ]) {
        CliCommand::Add { chunks, workers, .. } => {
            assert_eq!(chunks, Some(8));
            assert_eq!(workers, Some(4));
        }
        _ => panic!("expected Add with --chunks/--workers"),
    }
}

#[test]
fn cli_parse_list() {
    assert!(matches!(parse(&["ddm", "list"]), CliCommand::List));
}

#[test]
fn cli_parse_run() {
    match parse(&["ddm", "run"]) {
        CliCommand::Run { json } => assert!(!json),
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_json() {
    match parse(&["ddm", "run", "--json"]) {
        CliCommand::Run { json } => assert!(json),
        _ => panic!("expected Run with --json"),
    }
}
