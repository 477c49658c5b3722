use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// `~/.contentgen/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".contentgen").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let generation = &config.generation;
    if generation.text_batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "generation.text_batch_size must be at least 1".to_string(),
        });
    }
    if generation.image_window == 0 {
        return Err(ConfigError::Validation {
            message: "generation.image_window must be at least 1".to_string(),
        });
    }
    if !(generation.keep_alive_step > 0.0 && generation.keep_alive_step < 100.0) {
        return Err(ConfigError::Validation {
            message: format!(
                "generation.keep_alive_step must be between 0 and 100, got {}",
                generation.keep_alive_step
            ),
        });
    }

    for (name, provider) in [
        ("text", &config.providers.text),
        ("image", &config.providers.image),
    ] {
        if provider.model.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("providers.{}.model must not be empty", name),
            });
        }
    }

    Ok(())
}
