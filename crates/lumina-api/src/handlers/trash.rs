use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::OwnerId;
use crate::dto::{DeleteReceiptDto, EmptyTrashReceiptDto, MediaDto, PageDto};
use crate::error::HttpAppError;
use crate::state::AppState;

/// DELETE /api/v1/media/{media_id}
pub async fn soft_delete_media(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<Json<DeleteReceiptDto>, HttpAppError> {
    state.library.soft_delete(owner_id, media_id).await?;
    Ok(Json(DeleteReceiptDto {
        media_id,
        status: "deleted",
    }))
}

/// POST /api/v1/media/{media_id}/restore
pub async fn restore_media(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<Json<DeleteReceiptDto>, HttpAppError> {
    state.library.restore(owner_id, media_id).await?;
    Ok(Json(DeleteReceiptDto {
        media_id,
        status: "active",
    }))
}

#[derive(Debug, Deserialize)]
pub struct TrashParams {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/library/trash
pub async fn get_trash(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrashParams>,
) -> Result<Json<PageDto>, HttpAppError> {
    let page = state
        .library
        .trash(owner_id, params.cursor, params.limit)
        .await?;
    Ok(Json(PageDto {
        items: page.items.iter().map(MediaDto::from).collect(),
        next_cursor: page.next_cursor,
    }))
}

/// POST /api/v1/library/trash/empty
pub async fn empty_trash(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
) -> Result<Json<EmptyTrashReceiptDto>, HttpAppError> {
    let receipt = state.library.empty_trash(owner_id).await?;
    Ok(Json(EmptyTrashReceiptDto {
        queued_count: receipt.queued_count,
    }))
}
