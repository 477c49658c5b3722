use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::http::ProviderEndpoint;
use crate::secrets::{expand_home, resolve_secret};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to `~/.contentgen/data/contentgen.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match &self.path {
            Some(path) => Some(PathBuf::from(expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_text_batch_size")]
    pub text_batch_size: usize,
    #[serde(default = "default_image_window")]
    pub image_window: usize,
    #[serde(default = "default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u64,
    #[serde(default = "default_keep_alive_step")]
    pub keep_alive_step: f64,
}

fn default_text_batch_size() -> usize {
    7
}

fn default_image_window() -> usize {
    10
}

fn default_keep_alive_interval_ms() -> u64 {
    2000
}

fn default_keep_alive_step() -> f64 {
    0.5
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            text_batch_size: default_text_batch_size(),
            image_window: default_image_window(),
            keep_alive_interval_ms: default_keep_alive_interval_ms(),
            keep_alive_step: default_keep_alive_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Image dimensions, image providers only.
    #[serde(default)]
    pub size: Option<String>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    120
}

impl ProviderConfig {
    fn with_model(model: &str) -> Self {
        Self {
            base_url: default_base_url(),
            model: model.to_string(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            size: None,
        }
    }

    /// Resolves the API key and builds the endpoint settings.
    pub fn endpoint(&self, name: &str) -> Result<ProviderEndpoint, ConfigError> {
        let api_key = resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: format!("providers.{}.api_key", name),
            source,
        })?;
        Ok(ProviderEndpoint {
            base_url: self.base_url.clone(),
            api_key,
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_text_provider")]
    pub text: ProviderConfig,
    #[serde(default = "default_image_provider")]
    pub image: ProviderConfig,
}

fn default_text_provider() -> ProviderConfig {
    ProviderConfig::with_model("gpt-4o-mini")
}

fn default_image_provider() -> ProviderConfig {
    ProviderConfig::with_model("gpt-image-1")
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            text: default_text_provider(),
            image: default_image_provider(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Base of the URLs handed out for stored objects.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub signing_key: Option<String>,
    #[serde(default)]
    pub signing_key_file: Option<String>,
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: Option<String>,
}

fn default_storage_root() -> String {
    "~/.contentgen/media".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080/media".to_string()
}

fn default_signing_key_env() -> Option<String> {
    Some("CONTENTGEN_SIGNING_KEY".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            signing_key: None,
            signing_key_file: None,
            signing_key_env: default_signing_key_env(),
        }
    }
}

impl StorageConfig {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.root))
    }

    pub fn resolve_signing_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            self.signing_key.as_deref(),
            self.signing_key_file.as_deref(),
            self.signing_key_env.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "storage.signing_key".to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}
