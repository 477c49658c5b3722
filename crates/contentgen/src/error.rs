use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentGenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Access denied: {0}")]
    Access(#[from] AccessError),

    #[error("Invalid request: {0}")]
    Input(#[from] InputError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Generation provider error: {0}")]
    Provider(#[from] crate::generation::ProviderError),

    #[error(transparent)]
    Coordinator(#[from] crate::coordinator::CoordinatorError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret for '{name}' could not be resolved: {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

/// Errors raised by a [`crate::store::ContentStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Block {block_index} of day {day_index} not found in collection '{collection_id}'")]
    BlockNotFound {
        collection_id: String,
        day_index: usize,
        block_index: usize,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Store task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Invalid destination path: {0}")]
    InvalidDestination(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to sign URL: {0}")]
    Signing(String),
}

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Owner '{owner_id}' may not write collection '{collection_id}'")]
    Denied {
        owner_id: String,
        collection_id: String,
    },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Access check failed: {0}")]
    Store(#[from] StoreError),
}

/// A request that can never start a job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),
}

pub type Result<T> = std::result::Result<T, ContentGenError>;
