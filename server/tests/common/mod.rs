#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::NaiveDate;
use contentgen::broadcast::{JobProgressBroadcaster, JobStore};
use contentgen::config::ServerConfig;
use contentgen::generation::{
    BatchingTextGenerator, CopyProvider, GeneratedBlock, GeneratedDay, ImageContext,
    ImageGenerationError, ImageGenerator, ProviderError, TargetDay, TextContext,
};
use contentgen::model::{BlockUpdate, ContentBlock, Day};
use contentgen::storage::FileObjectStorage;
use contentgen::{Collection, CoordinatorConfig, GenerationCoordinator, MemoryStore, StoreAccessControl};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use contentgen_server::app::build_app;
use contentgen_server::state::AppState;

/// Writes "Day N copy" and a prompt for every requested block.
pub struct EchoCopy;

#[async_trait]
impl CopyProvider for EchoCopy {
    async fn generate_batch(
        &self,
        _context: &TextContext,
        days: &[TargetDay],
    ) -> Result<Vec<GeneratedDay>, ProviderError> {
        Ok(days
            .iter()
            .map(|d| GeneratedDay {
                day_index: d.day_index,
                blocks: d
                    .block_indices
                    .iter()
                    .map(|b| GeneratedBlock {
                        block_index: *b,
                        update: BlockUpdate::text(
                            format!("Day {} copy", d.day.position),
                            Some(format!("prompt {}-{}", d.day.position, b)),
                        ),
                    })
                    .collect(),
            })
            .collect())
    }
}

/// Returns a URL derived from the block id.
pub struct FixedImages;

#[async_trait]
impl ImageGenerator for FixedImages {
    async fn generate_image(
        &self,
        _prompt: &str,
        context: &ImageContext,
    ) -> Result<String, ImageGenerationError> {
        Ok(format!("https://img.test/{}.png", context.block_id))
    }

    async fn generate_consistent_image(
        &self,
        prompt: &str,
        context: &ImageContext,
        _prior_references: &[String],
    ) -> Result<String, ImageGenerationError> {
        self.generate_image(prompt, context).await
    }
}

pub fn collection(id: &str, owner: &str, days: u32, blocks: usize) -> Collection {
    let mut c = Collection::new(id, owner);
    c.name = "Spring launch".to_string();
    for p in 1..=days {
        let mut day = Day::new(p, NaiveDate::from_ymd_opt(2026, 4, p).unwrap());
        for b in 0..blocks {
            day.blocks.push(ContentBlock::new(&format!("{id}-d{p}b{b}"), "post"));
        }
        c.days.push(day);
    }
    c
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub job_store: Arc<JobStore>,
}

/// Full router over an in-memory store, fake providers and a live job registry.
pub fn build_test_app(store: Arc<MemoryStore>) -> TestApp {
    build_test_app_with_media(store, None)
}

pub fn build_test_app_with_media(
    store: Arc<MemoryStore>,
    media: Option<Arc<FileObjectStorage>>,
) -> TestApp {
    let broadcaster = JobProgressBroadcaster::default();
    let job_store = Arc::new(JobStore::new());
    Arc::clone(&job_store).spawn_listener(&broadcaster);

    let coordinator = GenerationCoordinator::new(
        CoordinatorConfig::default(),
        store.clone(),
        Arc::new(BatchingTextGenerator::new(EchoCopy, 7)),
        Arc::new(FixedImages),
    )
    .with_access(Arc::new(StoreAccessControl::new(store.clone())))
    .with_broadcaster(broadcaster)
    .with_registry(Arc::clone(&job_store));

    let state = AppState {
        coordinator: Arc::new(coordinator),
        job_store: Arc::clone(&job_store),
        media,
    };

    TestApp {
        router: build_app(state, &ServerConfig::default()),
        store,
        job_store,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Posts a generation request and returns every `data:` frame as JSON.
pub async fn stream_events(app: Router, body: &str) -> Vec<Value> {
    let response = post_raw(app, "/api/collections/generate/stream", body).await;
    assert_eq!(response.status(), 200);
    parse_sse(&body_text(response).await)
}

pub fn parse_sse(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}
