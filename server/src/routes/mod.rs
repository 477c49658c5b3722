pub mod generate;
pub mod health;
pub mod jobs;
pub mod media;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generate::router())
        .merge(jobs::router())
}
