//! Route table.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{media, timeline, trash};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/library/timeline", get(timeline::get_timeline))
        .route("/api/v1/library/trash", get(trash::get_trash))
        .route("/api/v1/library/trash/empty", post(trash::empty_trash))
        .route(
            "/api/v1/media/{media_id}",
            get(media::get_media)
                .patch(media::patch_media)
                .delete(trash::soft_delete_media),
        )
        .route("/api/v1/media/{media_id}/content", get(media::get_content))
        .route(
            "/api/v1/media/{media_id}/restore",
            post(trash::restore_media),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
