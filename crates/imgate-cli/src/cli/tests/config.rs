//! Tests for the config subcommand and the global --config flag.

use super::parse;
use crate::cli::CliCommand;
use std::path::Path;

#[test]
fn cli_parse_config() {
    let cli = parse(&["imgate", "config"]);
    assert!(matches!(cli.command, CliCommand::Config));
    assert!(cli.config.is_none());
}

#[test]
fn cli_global_config_flag_before_subcommand() {
    let cli = parse(&["imgate", "--config", "/etc/imgate.toml", "check", "http://a.b/"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/imgate.toml")));
}

#[test]
fn cli_global_config_flag_after_subcommand() {
    let cli = parse(&["imgate", "fetch", "http://a.b/c.png", "--config", "cfg.toml"]);
    assert_eq!(cli.config.as_deref(), Some(Path::new("cfg.toml")));
}

#[test]
fn load_config_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("imgate.toml");
    std::fs::write(&path, "max_bytes = 2048\nblocked_domains = [\"spam.com\"]\n").unwrap();
    let (cfg, used) = crate::cli::load_config(Some(&path)).unwrap();
    assert_eq!(used, path);
    assert_eq!(cfg.max_bytes, 2048);
    assert!(cfg.blocked_domains.contains("spam.com"));
}

#[test]
fn load_config_missing_explicit_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(crate::cli::load_config(Some(&dir.path().join("nope.toml"))).is_err());
}
