//! Serves objects written by the local object storage behind signed URLs.

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub signature: String,
}

/// GET /media/{*path}?signature=
async fn serve_media(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> AppResult<Response> {
    let storage = state
        .media
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Media storage".to_string()))?;

    if !storage.verify(&path, &query.signature) {
        return Err(AppError::Forbidden("Invalid signature".to_string()));
    }

    let file = storage.resolve(&path)?;
    let bytes = match tokio::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Object {path}")));
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok(([(CONTENT_TYPE, mime.to_string())], bytes).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/media/{*path}", get(serve_media))
}
