//! Configuration loading and graceful degradation tests
//!
//! Uses serial_test to prevent ENV variable races: tests that manipulate
//! RISKCHECK_CONFIG or RISKCHECK_ROOT are marked #[serial].

use riskcheck_common::config::{
    load_config, load_toml_config, resolve_config_path, resolve_root_folder, write_toml_config,
    TomlConfig, CONFIG_ENV_VAR, ROOT_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[analysis\ntotal_iterations = ").unwrap();
    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_write_then_load_preserves_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.analysis.merge_policy = "unconditional".to_string();
    config.references.taxonomy_path = Some(PathBuf::from("/data/tags.csv"));
    config.gemini.model = "gemini-test".to_string();

    write_toml_config(&config, &path).unwrap();
    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/from/env.toml");
    let cli = PathBuf::from("/from/cli.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_config_path_used_when_no_cli() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env.toml");
    std::fs::write(&path, "[analysis]\ntotal_iterations = 7\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = load_config(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.analysis.total_iterations, 7);
}

#[test]
#[serial]
fn test_root_folder_priority() {
    env::remove_var(ROOT_ENV_VAR);
    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/from/toml"));

    // TOML beats default
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    // ENV beats TOML
    env::set_var(ROOT_ENV_VAR, "/from/env");
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    // CLI beats ENV
    let cli = PathBuf::from("/from/cli");
    assert_eq!(resolve_root_folder(Some(&cli), &config), cli);

    env::remove_var(ROOT_ENV_VAR);
}
