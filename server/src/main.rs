use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use contentgen::broadcast::JobProgressBroadcaster;
use contentgen::config::{default_config_path, load_config, Config};
use contentgen::generation::{
    BatchingTextGenerator, HttpCopyProvider, HttpImageGenerator, ImageGenerator, TextGenerator,
};
use contentgen::{
    logging, ContentStore, CoordinatorConfig, Database, FileObjectStorage, GenerationCoordinator,
    JobStore, ObjectStorage, SqliteStore, StoreAccessControl,
};
use tracing::info;

use contentgen_server::app::build_app;
use contentgen_server::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Config path: first argument, then `CONTENTGEN_CONFIG`, then the default location.
fn config_path() -> Result<PathBuf, BoxError> {
    if let Some(arg) = std::env::args().nth(1) {
        return Ok(PathBuf::from(arg));
    }
    if let Ok(path) = std::env::var("CONTENTGEN_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    default_config_path().ok_or_else(|| "Cannot determine home directory for config".into())
}

fn build_state(config: &Config) -> Result<AppState, BoxError> {
    let db_path = config
        .database
        .resolved_path()
        .ok_or("Cannot determine database path")?;
    let database = Database::open(&db_path)?;

    let media = Arc::new(FileObjectStorage::new(
        config.storage.root_path(),
        &config.storage.public_base_url,
        config.storage.resolve_signing_key()?,
    ));

    let text_endpoint = config.providers.text.endpoint("text")?;
    let text: Arc<dyn TextGenerator> = Arc::new(BatchingTextGenerator::new(
        HttpCopyProvider::new(text_endpoint)?,
        config.generation.text_batch_size,
    ));

    let image_endpoint = config.providers.image.endpoint("image")?;
    let image_size = config
        .providers
        .image
        .size
        .as_deref()
        .unwrap_or(DEFAULT_IMAGE_SIZE);
    let object_storage: Arc<dyn ObjectStorage> = media.clone();
    let images: Arc<dyn ImageGenerator> = Arc::new(HttpImageGenerator::new(
        image_endpoint,
        image_size,
        object_storage,
    )?);

    let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::new(database.clone()));
    let broadcaster = JobProgressBroadcaster::default();

    let job_store = Arc::new(JobStore::new());
    job_store.set_database(database);
    Arc::clone(&job_store).spawn_listener(&broadcaster);

    let coordinator = GenerationCoordinator::new(
        CoordinatorConfig::from_config(config),
        Arc::clone(&store),
        text,
        images,
    )
    .with_access(Arc::new(StoreAccessControl::new(store)))
    .with_broadcaster(broadcaster)
    .with_registry(Arc::clone(&job_store));

    Ok(AppState {
        coordinator: Arc::new(coordinator),
        job_store,
        media: Some(media),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let path = config_path()?;
    let config = load_config(&path)?;
    logging::init(&config.logging)?;
    info!(path = %path.display(), "Loaded configuration");

    let state = build_state(&config)?;
    let app = build_app(state, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
