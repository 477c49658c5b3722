pub mod access;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod generation;
pub mod logging;
pub mod model;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod store;

pub use access::{AccessControl, AllowAll, StoreAccessControl};
pub use broadcast::{JobProgressBroadcaster, JobStore, ProgressEvent};
pub use config::{load_config, Config};
pub use coordinator::{CoordinatorConfig, CoordinatorError, GenerationCoordinator};
pub use db::Database;
pub use error::{
    AccessError, ConfigError, ContentGenError, InputError, Result, StorageError, StoreError,
};
pub use model::{Collection, GenerationMode, JobDescriptor, JobRequest};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{FileObjectStorage, ObjectStorage};
pub use store::{ContentStore, MemoryStore, SqliteStore};
