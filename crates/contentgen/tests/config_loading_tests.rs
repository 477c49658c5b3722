//! Table-driven tests for configuration loading and validation.

use std::time::Duration;

use contentgen::config::{load_config, load_config_from_str, LogFormat};
use contentgen::CoordinatorConfig;

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Substring of the error when loading fails.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "full",
        config_json: r#"{
            "version": "1.0",
            "server": { "host": "0.0.0.0", "port": 9000, "cors_origins": ["https://app.example.com"] },
            "database": { "path": "/var/lib/contentgen/db.sqlite" },
            "generation": {
                "text_batch_size": 5,
                "image_window": 4,
                "keep_alive_interval_ms": 1500,
                "keep_alive_step": 1.0
            },
            "providers": {
                "text": { "base_url": "https://llm.internal/v1", "model": "copy-large", "api_key_env": "LLM_KEY" },
                "image": { "model": "pictures-2", "size": "512x512", "timeout_secs": 60 }
            },
            "storage": {
                "root": "/srv/media",
                "public_base_url": "https://cdn.example.com/media",
                "signing_key_env": "MEDIA_KEY"
            },
            "logging": { "level": "contentgen=debug", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "server": { "port": 8080 } }"#,
        should_succeed: false,
        expected_error: Some("version"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "3.1" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "unknown_top_level_field",
        config_json: r#"{ "version": "1.0", "workers": 2 }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_batch_size",
        config_json: r#"{ "version": "1.0", "generation": { "text_batch_size": 0 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "keep_alive_step_too_large",
        config_json: r#"{ "version": "1.0", "generation": { "keep_alive_step": 25 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "bad_image_size",
        config_json: r#"{ "version": "1.0", "providers": { "image": { "model": "m", "size": "large" } } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "provider_without_model",
        config_json: r#"{ "version": "1.0", "providers": { "text": { "base_url": "https://x.test/v1" } } }"#,
        should_succeed: false,
        expected_error: Some("model"),
    },
    ConfigTestCase {
        name: "unknown_log_format",
        config_json: r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("parse config JSON"),
    },
];

#[test]
fn test_config_loading() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        if case.should_succeed {
            assert!(
                result.is_ok(),
                "case '{}' should load, got {:?}",
                case.name,
                result.err()
            );
        } else {
            let err = match result {
                Ok(_) => panic!("case '{}' should fail", case.name),
                Err(e) => e.to_string(),
            };
            if let Some(expected) = case.expected_error {
                assert!(
                    err.contains(expected),
                    "case '{}': expected error containing '{}', got '{}'",
                    case.name,
                    expected,
                    err
                );
            }
        }
    }
}

#[test]
fn test_full_config_values() {
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.generation.text_batch_size, 5);
    assert_eq!(config.providers.text.model, "copy-large");
    assert_eq!(config.providers.text.base_url, "https://llm.internal/v1");
    assert_eq!(config.providers.image.size.as_deref(), Some("512x512"));
    assert_eq!(config.providers.image.timeout_secs, 60);
    assert_eq!(config.storage.signing_key_env.as_deref(), Some("MEDIA_KEY"));
    assert_eq!(config.logging.format, LogFormat::Json);

    let coordinator = CoordinatorConfig::from_config(&config);
    assert_eq!(coordinator.text_batch_size, 5);
    assert_eq!(coordinator.image_window, 4);
    assert_eq!(coordinator.keep_alive_interval, Duration::from_millis(1500));
}

#[test]
fn test_defaults_applied() {
    let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.generation.text_batch_size, 7);
    assert_eq!(config.generation.image_window, 10);
    assert_eq!(config.generation.keep_alive_interval_ms, 2000);
    assert_eq!(config.generation.keep_alive_step, 0.5);
    assert_eq!(config.providers.text.model, "gpt-4o-mini");
    assert_eq!(config.providers.image.model, "gpt-image-1");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Text);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "version": "1.0", "server": { "port": 7070 } }"#).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.server.port, 7070);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("absent.json");

    let err = load_config(&path).unwrap_err().to_string();
    assert!(err.contains("absent.json"), "got: {}", err);
}
