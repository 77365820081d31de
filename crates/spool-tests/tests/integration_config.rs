// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Configuration Integration Tests
//!
//! Loading SPOOL configuration from files on disk.
//!
//! - `test_load_*`: File formats and defaults
//! - `test_env_*`: Environment overrides and placeholders
//! - `test_validation_*`: Rejected configurations
//!
//! Every test that touches the environment uses its own prefix or variable
//! name, since tests share one process.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use spool_config::{
    ConfigError, ConfigFormat, ConfigLoader, LogFormat, LogLevel, SinkKind, SpoolConfig,
    StoreBackend,
};

use spool_tests::common::{temp_test_dir, ConfigFixtures};

fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write config file");
    path
}

fn loader(prefix: &str) -> ConfigLoader {
    ConfigLoader::new().with_env_prefix(prefix)
}

// =============================================================================
// File Formats
// =============================================================================

#[test]
fn test_load_full_yaml() {
    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "spool.yaml", ConfigFixtures::full_yaml());

    let config = loader("SPOOL_IT_YAML").load(&path).unwrap();

    assert_eq!(config.service.name, "orders-spool");
    assert!(!config.service.metrics);
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.store.url(), "redis://cache.internal:6379/2");
    assert_eq!(config.store.namespace, "orders");
    assert_eq!(config.buffer.flush_interval(), Duration::from_secs(15));
    assert_eq!(config.buffer.reap_interval(), Duration::from_secs(600));
    assert_eq!(config.buffer.stale_threshold(), Duration::from_secs(7200));
    assert_eq!(config.buffer.max_batch_size, 250);
    assert_eq!(config.buffer.flush_timeout(), Duration::from_secs(20));
    assert_eq!(config.buffer.reap_timeout(), Duration::from_secs(10));
    assert_eq!(config.buffer.drain_deadline(), Duration::from_secs(90));
    assert_eq!(config.sink.kind, SinkKind::Http);
    assert_eq!(
        config.sink.endpoint.as_deref(),
        Some("https://records.internal/v1/batch")
    );
    assert_eq!(config.sink.timeout(), Duration::from_secs(10));
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Compact);
}

#[test]
fn test_load_minimal_toml_uses_defaults() {
    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "spool.toml", ConfigFixtures::minimal_toml());

    let config = loader("SPOOL_IT_TOML").load(&path).unwrap();
    let defaults = SpoolConfig::default();

    assert_eq!(config.store.namespace, "sessions");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.buffer.flush_interval_secs, defaults.buffer.flush_interval_secs);
    assert_eq!(config.buffer.max_batch_size, defaults.buffer.max_batch_size);
    assert_eq!(config.sink.kind, SinkKind::Discard);
}

#[test]
fn test_load_json() {
    let dir = temp_test_dir("spool-config");
    let path = write_config(
        &dir,
        "spool.json",
        r#"{"buffer": {"max_batch_size": 42}, "logging": {"level": "debug", "format": "json"}}"#,
    );

    let config = loader("SPOOL_IT_JSON").load(&path).unwrap();
    assert_eq!(config.buffer.max_batch_size, 42);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_unsupported_extension() {
    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "spool.ini", "[store]\n");

    let err = loader("SPOOL_IT_INI").load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
}

#[test]
fn test_load_missing_file() {
    let dir = temp_test_dir("spool-config");
    let err = loader("SPOOL_IT_MISSING")
        .load(dir.path().join("absent.yaml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_load_malformed_yaml_names_file() {
    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "broken.yaml", "buffer: [unclosed\n");

    let err = loader("SPOOL_IT_BROKEN").load(&path).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"), "{}", err);
}

#[test]
fn test_load_unknown_section_rejected() {
    let err = loader("SPOOL_IT_UNKNOWN")
        .load_from_str("[devices]\nname = \"x\"\n", ConfigFormat::Toml)
        .unwrap_err();
    assert!(!matches!(err, ConfigError::Validation { .. }));
}

// =============================================================================
// Environment
// =============================================================================

#[test]
fn test_env_overrides_file_values() {
    let prefix = "SPOOL_IT_OVERRIDE";
    std::env::set_var(format!("{}_STORE_NAMESPACE", prefix), "from-env");
    std::env::set_var(format!("{}_MAX_BATCH_SIZE", prefix), "77");
    std::env::set_var(format!("{}_FLUSH_INTERVAL_SECS", prefix), "5");
    std::env::set_var(format!("{}_LOG_LEVEL", prefix), "ERROR");

    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "spool.yaml", ConfigFixtures::full_yaml());
    let config = loader(prefix).load(&path).unwrap();

    assert_eq!(config.store.namespace, "from-env");
    assert_eq!(config.buffer.max_batch_size, 77);
    assert_eq!(config.buffer.flush_interval_secs, 5);
    assert_eq!(config.logging.level, LogLevel::Error);
    // Untouched values keep the file's settings.
    assert_eq!(config.buffer.reap_interval_secs, 600);
}

#[test]
fn test_env_sink_endpoint_selects_http() {
    let prefix = "SPOOL_IT_SINK";
    std::env::set_var(format!("{}_SINK_ENDPOINT", prefix), "http://localhost:9000/ingest");

    let config = loader(prefix)
        .load_from_str(ConfigFixtures::minimal_toml(), ConfigFormat::Toml)
        .unwrap();
    assert_eq!(config.sink.kind, SinkKind::Http);
    assert_eq!(config.sink.endpoint.as_deref(), Some("http://localhost:9000/ingest"));
}

#[test]
fn test_env_invalid_override() {
    let prefix = "SPOOL_IT_BAD_BATCH";
    std::env::set_var(format!("{}_MAX_BATCH_SIZE", prefix), "lots");

    let err = loader(prefix)
        .load_from_str(ConfigFixtures::minimal_toml(), ConfigFormat::Toml)
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "SPOOL_IT_BAD_BATCH_MAX_BATCH_SIZE"));
}

#[test]
fn test_env_overrides_disabled() {
    let prefix = "SPOOL_IT_DISABLED";
    std::env::set_var(format!("{}_STORE_NAMESPACE", prefix), "ignored");

    let config = loader(prefix)
        .with_env_vars(false)
        .load_from_str(ConfigFixtures::minimal_toml(), ConfigFormat::Toml)
        .unwrap();
    assert_eq!(config.store.namespace, "sessions");
}

#[test]
fn test_env_placeholder_resolved_in_file() {
    let var = "SPOOL_IT_PLACEHOLDER_SET";
    std::env::set_var(var, "resolved-ns");

    let dir = temp_test_dir("spool-config");
    let path = write_config(&dir, "spool.json", &ConfigFixtures::placeholder_json(var));
    let config = loader("SPOOL_IT_PH1").load(&path).unwrap();
    assert_eq!(config.store.namespace, "resolved-ns");
}

#[test]
fn test_env_placeholder_default() {
    let var = "SPOOL_IT_PLACEHOLDER_UNSET";
    std::env::remove_var(var);

    let config = loader("SPOOL_IT_PH2")
        .load_from_str(&ConfigFixtures::placeholder_json(var), ConfigFormat::Json)
        .unwrap();
    assert_eq!(config.store.namespace, "fallback-ns");
}

#[test]
fn test_env_placeholder_without_default_fails() {
    let var = "SPOOL_IT_PLACEHOLDER_REQUIRED";
    std::env::remove_var(var);

    let content = format!(r#"{{"store": {{"namespace": "${{{}}}"}}}}"#, var);
    let err = loader("SPOOL_IT_PH3")
        .load_from_str(&content, ConfigFormat::Json)
        .unwrap_err();
    assert!(matches!(err, ConfigError::EnvVarNotFound { ref name } if name == var));
}

// =============================================================================
// Validation
// =============================================================================

fn validation_field(content: &str) -> String {
    match loader("SPOOL_IT_VALIDATION").load_from_str(content, ConfigFormat::Toml) {
        Err(ConfigError::Validation { field, .. }) => field,
        other => panic!("Expected a validation error, got {:?}", other),
    }
}

#[test]
fn test_validation_zero_batch() {
    assert_eq!(
        validation_field("[buffer]\nmax_batch_size = 0\n"),
        "buffer.max_batch_size"
    );
}

#[test]
fn test_validation_zero_interval() {
    assert_eq!(
        validation_field("[buffer]\nflush_interval_secs = 0\n"),
        "buffer.flush_interval_secs"
    );
}

#[test]
fn test_validation_drain_shorter_than_flush_timeout() {
    assert_eq!(
        validation_field("[buffer]\nflush_timeout_secs = 60\ndrain_deadline_secs = 30\n"),
        "buffer.drain_deadline_secs"
    );
}

#[test]
fn test_validation_http_sink_needs_endpoint() {
    assert_eq!(validation_field("[sink]\nkind = \"http\"\n"), "sink.endpoint");
    assert_eq!(
        validation_field("[sink]\nkind = \"http\"\nendpoint = \"ftp://nope\"\n"),
        "sink.endpoint"
    );
}

#[test]
fn test_validation_empty_namespace() {
    assert_eq!(
        validation_field("[store]\nnamespace = \"  \"\n"),
        "store.namespace"
    );
}

#[test]
fn test_validation_redis_needs_address() {
    assert_eq!(
        validation_field("[store]\nbackend = \"redis\"\naddress = \"\"\n"),
        "store.address"
    );
}
