//! Unit tests for config module
//!
//! Covers argument parsing, address normalization and validation.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::time::Duration;

use clap::Parser;

use crate::config::{ArtworkDir, BridgeConfig, ConfigError, HubEndpoints, LogFormat, LogLevel};

fn parse(args: &[&str]) -> BridgeConfig {
    let mut argv = vec!["hass-mpris-bridge"];
    argv.extend_from_slice(args);
    BridgeConfig::try_parse_from(argv).unwrap()
}

#[test]
fn http_address_yields_ws_endpoint() {
    let endpoints = HubEndpoints::parse("http://homeassistant.local:8123").unwrap();

    assert_eq!(endpoints.base.as_str(), "http://homeassistant.local:8123/");
    assert_eq!(
        endpoints.websocket.as_str(),
        "ws://homeassistant.local:8123/api/websocket"
    );
}

#[test]
fn https_address_yields_wss_endpoint() {
    let endpoints = HubEndpoints::parse("https://hass.example.org").unwrap();

    assert_eq!(endpoints.base.as_str(), "https://hass.example.org/");
    assert_eq!(
        endpoints.websocket.as_str(),
        "wss://hass.example.org/api/websocket"
    );
}

#[test]
fn websocket_address_is_normalized() {
    let endpoints = HubEndpoints::parse("ws://10.0.0.2:8123/api/websocket").unwrap();

    assert_eq!(endpoints.base.as_str(), "http://10.0.0.2:8123/");
    assert_eq!(endpoints.websocket.as_str(), "ws://10.0.0.2:8123/api/websocket");
}

#[test]
fn ipv6_host_keeps_brackets() {
    let endpoints = HubEndpoints::parse("http://[::1]:8123").unwrap();

    assert_eq!(endpoints.websocket.as_str(), "ws://[::1]:8123/api/websocket");
}

#[test]
fn unsupported_scheme_rejected() {
    let result = HubEndpoints::parse("ftp://hass.local");

    assert!(matches!(result, Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"));
}

#[test]
fn garbage_address_rejected() {
    let result = HubEndpoints::parse("not a url");

    assert!(matches!(result, Err(ConfigError::InvalidUri { .. })));
}

#[test]
fn defaults_applied() {
    let config = parse(&["--hass-uri", "http://hass:8123", "--hass-token", "abc"]);

    assert!(!config.verbose);
    assert_eq!(config.log_level(), LogLevel::Info);
    assert_eq!(config.log_format, LogFormat::Pretty);

    let options = config.session_options();
    assert_eq!(options.heartbeat_interval, Duration::from_secs(45));
    assert_eq!(options.liveness_timeout, None);
}

#[test]
fn verbose_flag_raises_level() {
    let config = parse(&["-v", "--hass-uri", "http://hass", "--hass-token", "abc"]);

    assert_eq!(config.log_level(), LogLevel::Debug);
}

#[test]
fn liveness_timeout_parsed() {
    let config = parse(&[
        "--hass-uri",
        "http://hass",
        "--hass-token",
        "abc",
        "--liveness-timeout",
        "30",
        "--log-format",
        "json",
    ]);

    assert_eq!(
        config.session_options().liveness_timeout,
        Some(Duration::from_secs(30))
    );
    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
fn blank_token_rejected() {
    let config = parse(&["--hass-uri", "http://hass", "--hass-token", "   "]);

    assert!(matches!(config.validate(), Err(ConfigError::MissingToken)));
}

#[test]
fn zero_heartbeat_rejected() {
    let config = parse(&[
        "--hass-uri",
        "http://hass",
        "--hass-token",
        "abc",
        "--heartbeat-interval",
        "0",
    ]);

    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue { field: "heartbeat-interval", .. })
    ));
}

#[test]
fn debug_output_hides_token() {
    let config = parse(&["--hass-uri", "http://hass", "--hass-token", "s3cr3t"]);

    let rendered = format!("{config:?}");
    assert!(!rendered.contains("s3cr3t"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn artwork_dir_removed_on_drop() {
    let parent = tempfile::tempdir().unwrap();

    let dir = ArtworkDir::create_in(parent.path()).unwrap();
    let path = dir.path().to_path_buf();
    std::fs::write(path.join("cover"), b"jpeg").unwrap();
    assert!(path.is_dir());

    drop(dir);
    assert!(!path.exists());
}

#[test]
fn artwork_dirs_are_distinct() {
    let parent = tempfile::tempdir().unwrap();

    let first = ArtworkDir::create_in(parent.path()).unwrap();
    let second = ArtworkDir::create_in(parent.path()).unwrap();

    assert_ne!(first.path(), second.path());
}
