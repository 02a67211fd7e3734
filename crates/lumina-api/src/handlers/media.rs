use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use lumina_core::models::Variant;
use lumina_core::AppError;
use lumina_db::MediaPatch;

use crate::auth::OwnerId;
use crate::dto::{MediaDto, MediaEnvelopeDto};
use crate::error::HttpAppError;
use crate::state::AppState;

/// GET /api/v1/media/{media_id}
pub async fn get_media(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<Json<MediaEnvelopeDto>, HttpAppError> {
    let media = state.library.media_detail(owner_id, media_id).await?;
    Ok(Json(MediaEnvelopeDto {
        media: MediaDto::from(&media),
    }))
}

/// Distinguishes an absent `takenAt` key (leave untouched) from an explicit
/// `"takenAt": null` (clear the capture time).
fn double_option<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatchMediaBody {
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub taken_at: Option<Option<DateTime<Utc>>>,
}

/// PATCH /api/v1/media/{media_id}
pub async fn patch_media(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
    Json(body): Json<PatchMediaBody>,
) -> Result<Json<MediaEnvelopeDto>, HttpAppError> {
    let media = state
        .library
        .patch_media(
            owner_id,
            media_id,
            MediaPatch {
                favorite: body.favorite,
                archived: body.archived,
                hidden: body.hidden,
                taken_at: body.taken_at,
            },
        )
        .await?;
    Ok(Json(MediaEnvelopeDto {
        media: MediaDto::from(&media),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ContentParams {
    pub variant: Option<String>,
}

/// GET /api/v1/media/{media_id}/content
pub async fn get_content(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
    Query(params): Query<ContentParams>,
) -> Result<Response, HttpAppError> {
    let variant: Variant = params
        .variant
        .as_deref()
        .unwrap_or("original")
        .parse()
        .map_err(HttpAppError::from)?;

    let served = state.library.content(owner_id, media_id, variant).await?;

    let file = match tokio::fs::File::open(&served.absolute_path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("Media file was not found".to_string()).into());
        }
        Err(err) => {
            return Err(AppError::Storage(format!("open content file: {}", err)).into());
        }
    };

    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, served.content_type)
        .header(header::CACHE_CONTROL, "private, max-age=120")
        .body(Body::from_stream(stream))
        .map_err(|err| AppError::Internal(format!("build response: {}", err)))?;

    Ok(response)
}
