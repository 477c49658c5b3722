//! End-to-end tests of the HTTP surface.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, build_test_app, collection, get, stream_events};
use contentgen::MemoryStore;
use serde_json::Value;

fn types(events: &[Value]) -> Vec<&str> {
    events.iter().map(|e| e["type"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn full_job_streams_phases_and_one_complete() {
    let store = Arc::new(MemoryStore::with_collection(collection("c1", "alice", 2, 2)));
    let app = build_test_app(store);

    let events = stream_events(
        app.router,
        r#"{"collectionId":"c1","ownerId":"alice","mode":"all"}"#,
    )
    .await;

    let kinds = types(&events);
    assert_eq!(kinds.last(), Some(&"complete"));
    assert_eq!(kinds.iter().filter(|k| **k == "complete").count(), 1);
    assert!(!kinds.contains(&"error"));
    assert_eq!(kinds.iter().filter(|k| **k == "block_complete").count(), 4);

    let final_days = events.last().unwrap()["updatedContent"]["days"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(final_days.len(), 2);
    for day in final_days {
        for block in day["blocks"].as_array().unwrap() {
            assert!(block["adCopy"].as_str().unwrap().starts_with("Day "));
            assert!(block["imageUrl"].as_str().unwrap().starts_with("https://img.test/"));
        }
    }

    let stored = app.store.snapshot("c1").unwrap();
    assert!(stored.content_generated);
}

#[tokio::test]
async fn progress_values_stay_in_range() {
    let store = Arc::new(MemoryStore::with_collection(collection("c1", "alice", 9, 1)));
    let app = build_test_app(store);

    let events = stream_events(
        app.router,
        r#"{"collectionId":"c1","ownerId":"alice","mode":"text"}"#,
    )
    .await;

    for event in &events {
        let progress = event["progress"].as_u64().unwrap();
        assert!(progress <= 100);
    }
    let text_phase_completes = events
        .iter()
        .filter(|e| e["type"] == "phase_complete" && e["phase"] == "text")
        .count();
    assert_eq!(text_phase_completes, 1);
}

#[tokio::test]
async fn missing_collection_id_yields_single_error() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_app(store);

    let events = stream_events(app.router, r#"{"ownerId":"alice","mode":"text"}"#).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["error"]
        .as_str()
        .unwrap()
        .contains("collectionId"));
}

#[tokio::test]
async fn malformed_body_yields_single_error() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_app(store);

    let events = stream_events(app.router, "{not json").await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
}

#[tokio::test]
async fn foreign_owner_is_denied() {
    let store = Arc::new(MemoryStore::with_collection(collection("c1", "alice", 1, 1)));
    let app = build_test_app(store);

    let events = stream_events(
        app.router,
        r#"{"collectionId":"c1","ownerId":"mallory","mode":"all"}"#,
    )
    .await;

    let kinds = types(&events);
    assert_eq!(kinds.last(), Some(&"error"));
    assert_eq!(kinds.iter().filter(|k| **k == "error").count(), 1);
    assert!(!kinds.contains(&"phase_complete"));
    assert!(app.store.writes().is_empty());
}

#[tokio::test]
async fn unknown_collection_yields_error() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_app(store);

    let events = stream_events(
        app.router,
        r#"{"collectionId":"missing","ownerId":"alice","mode":"text"}"#,
    )
    .await;

    assert_eq!(types(&events).last(), Some(&"error"));
}

#[tokio::test]
async fn finished_job_is_listed_in_registry() {
    let store = Arc::new(MemoryStore::with_collection(collection("c1", "alice", 1, 1)));
    let app = build_test_app(store);

    stream_events(
        app.router.clone(),
        r#"{"collectionId":"c1","ownerId":"alice","mode":"text"}"#,
    )
    .await;

    // The registry listener runs on its own task.
    let mut listed = Value::Null;
    for _ in 0..50 {
        listed = body_json(
            get(app.router.clone(), "/api/jobs?ownerId=alice&collectionId=c1").await,
        )
        .await;
        if listed["jobs"][0]["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["jobs"][0]["status"], "completed");

    let job_id = listed["jobs"][0]["jobId"].as_str().unwrap().to_string();
    let response = get(app.router.clone(), &format!("/api/jobs/{job_id}?ownerId=alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = body_json(response).await;
    assert_eq!(job["collectionId"], "c1");
    assert_eq!(job["mode"], "text");
}

#[tokio::test]
async fn jobs_are_only_visible_to_their_owner() {
    let store = Arc::new(MemoryStore::with_collection(collection("c1", "alice", 1, 1)));
    let app = build_test_app(store);

    stream_events(
        app.router.clone(),
        r#"{"collectionId":"c1","ownerId":"alice","mode":"text"}"#,
    )
    .await;
    let mut job_id = None;
    for _ in 0..50 {
        let listed = body_json(get(app.router.clone(), "/api/jobs?ownerId=alice").await).await;
        if let Some(id) = listed["jobs"][0]["jobId"].as_str() {
            job_id = Some(id.to_string());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let job_id = job_id.unwrap();

    let listed = body_json(get(app.router.clone(), "/api/jobs?ownerId=mallory").await).await;
    assert_eq!(listed["total"], 0);
    assert!(listed["jobs"].as_array().unwrap().is_empty());

    let response = get(app.router.clone(), &format!("/api/jobs/{job_id}?ownerId=mallory")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn job_routes_require_owner() {
    let app = build_test_app(Arc::new(MemoryStore::new()));

    let response = get(app.router.clone(), "/api/jobs").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = get(app.router.clone(), "/api/jobs?ownerId=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app.router, "/api/jobs/some-job").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let app = build_test_app(Arc::new(MemoryStore::new()));
    let response = get(app.router, "/api/jobs/nope?ownerId=alice").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_test_app(Arc::new(MemoryStore::new()));
    let response = get(app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["running_jobs"], 0);
}

#[tokio::test]
async fn media_route_is_404_without_local_storage() {
    let app = build_test_app(Arc::new(MemoryStore::new()));
    let response = get(app.router, "/media/c1/images/a.png?signature=x").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
