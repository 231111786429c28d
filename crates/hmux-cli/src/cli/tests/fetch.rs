//! Tests for the fetch and config subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use hmux_core::Method;

#[test]
fn cli_parse_fetch_defaults() {
    match parse(&["hmux", "fetch", "http://example.test/ok"]) {
        CliCommand::Fetch {
            urls,
            method,
            headers,
            data,
            timeout_ms,
            tick_ms,
            include_body,
            json,
        } => {
            assert_eq!(urls, vec!["http://example.test/ok"]);
            assert_eq!(method, Method::Get);
            assert!(headers.is_empty());
            assert!(data.is_none());
            assert!(timeout_ms.is_none());
            assert_eq!(tick_ms, 10);
            assert!(!include_body);
            assert!(!json);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_post_with_headers_in_order() {
    match parse(&[
        "hmux",
        "fetch",
        "-X",
        "post",
        "-H",
        "Content-Type: application/json",
        "--header",
        "X-Trace: 1",
        "-d",
        "{\"k\":1}",
        "--timeout-ms",
        "250",
        "--json",
        "http://a.test/",
        "http://b.test/",
    ]) {
        CliCommand::Fetch {
            urls,
            method,
            headers,
            data,
            timeout_ms,
            json,
            ..
        } => {
            assert_eq!(urls, vec!["http://a.test/", "http://b.test/"]);
            assert_eq!(method, Method::Post);
            assert_eq!(headers, vec!["Content-Type: application/json", "X-Trace: 1"]);
            assert_eq!(data.as_deref(), Some("{\"k\":1}"));
            assert_eq!(timeout_ms, Some(250));
            assert!(json);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_requires_url() {
    assert!(Cli::try_parse_from(["hmux", "fetch"]).is_err());
}

#[test]
fn cli_parse_fetch_rejects_unknown_method() {
    assert!(Cli::try_parse_from(["hmux", "fetch", "-X", "PATCH", "http://a.test/"]).is_err());
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["hmux", "config"]), CliCommand::Config));
}
