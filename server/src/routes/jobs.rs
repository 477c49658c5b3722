//! Job registry endpoints, scoped to the requesting owner.

use axum::extract::{Path, Query, State};
use axum::{routing::get, Json, Router};
use contentgen::broadcast::{JobListResponse, JobQueryParams, StoredJob};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub owner_id: Option<String>,
}

fn require_owner(owner_id: Option<&str>) -> AppResult<&str> {
    owner_id
        .filter(|o| !o.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("ownerId is required".to_string()))
}

/// GET /api/jobs?ownerId=&collectionId=&status=&limit=&offset=
async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobQueryParams>,
) -> AppResult<Json<JobListResponse>> {
    require_owner(params.owner_id.as_deref())?;
    Ok(Json(state.job_store.query(&params)?))
}

/// GET /api/jobs/{id}?ownerId=
///
/// Another owner's job answers 404, same as an unknown one.
async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<Json<StoredJob>> {
    let owner_id = require_owner(query.owner_id.as_deref())?;
    state
        .job_store
        .get(&job_id)
        .filter(|job| job.owner_id == owner_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id}")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}
