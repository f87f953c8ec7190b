//! Tests for the `pause`/`resume`/`cancel` subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_pause() {
    match parse(&["ddm", "pause", "7"]) {
        CliCommand::Pause { id } => assert_eq!(id, 7),
        _ => panic!("expected Pause"),
    }
}

#[test]
fn cli_parse_resume() {
    match parse(&["ddm", "resume", "7"]) {
        CliCommand::Resume { id } => assert_eq!(id, 7),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["ddm", "cancel", "7"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 7),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_rejects_missing_id() {
    assert!(Cli::try_parse_from(["ddm", "pause"]).is_err());
}
