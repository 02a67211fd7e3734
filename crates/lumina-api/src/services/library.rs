//! Lifecycle orchestration for the media library.
//!
//! This service decides, per request, whether synchronous data is enough or
//! an asynchronous command must be queued:
//!
//! - `original` content is always served straight from disk.
//! - Image derivatives are served when cached; a missing one queues
//!   generation best-effort and falls back to the original bytes, so the
//!   caller never blocks on a transcode.
//! - Playback has no meaningful fallback: a missing playback derivative
//!   queues generation and returns a retriable not-ready error.
//! - Soft delete schedules a hard-delete command after the retention window;
//!   restore clears the flag but never retracts the scheduled command — the
//!   cleanup consumer re-checks state at execution time.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::to_value;
use uuid::Uuid;

use lumina_core::models::{
    cleanup_job_id, derivatives_job_id, CleanupCommand, DerivativesGenerateCommand, MediaRecord,
    Variant,
};
use lumina_core::pagination::{TimelineCursor, TrashCursor};
use lumina_core::{AppError, Config};
use lumina_db::{MediaPatch, MediaStore, TimelineFilter};
use lumina_processing::{DerivativeCoordinator, DerivativeError};
use lumina_queue::{JobPublisher, PublishOptions};
use lumina_storage::fs as storage_fs;
use lumina_storage::paths::{derivative_relative_path, resolve_absolute, PLAYBACK_EXTS};

/// Timeline listing request after HTTP decoding.
#[derive(Debug, Clone, Default)]
pub struct TimelineQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
    pub path_query: Option<String>,
}

#[derive(Debug)]
pub struct Page {
    pub items: Vec<MediaRecord>,
    pub next_cursor: Option<String>,
}

/// A file to stream back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedContent {
    pub absolute_path: PathBuf,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyTrashReceipt {
    pub queued_count: usize,
}

pub struct LibraryService {
    config: Config,
    store: Arc<dyn MediaStore>,
    coordinator: Arc<DerivativeCoordinator>,
    derivatives_queue: Arc<dyn JobPublisher>,
    cleanup_queue: Arc<dyn JobPublisher>,
}

fn media_not_found() -> AppError {
    AppError::NotFound("Media was not found".to_string())
}

fn storage_err(err: lumina_storage::StorageError) -> AppError {
    AppError::Storage(err.to_string())
}

fn derivative_err(err: DerivativeError) -> AppError {
    match err {
        DerivativeError::UnsupportedVariant(variant) => {
            AppError::InvalidInput(format!("Unsupported derivative variant: {}", variant))
        }
        other => AppError::Storage(other.to_string()),
    }
}

fn playback_content_type(ext: &str) -> String {
    format!("video/{}", ext)
}

impl LibraryService {
    pub fn new(
        config: Config,
        store: Arc<dyn MediaStore>,
        coordinator: Arc<DerivativeCoordinator>,
        derivatives_queue: Arc<dyn JobPublisher>,
        cleanup_queue: Arc<dyn JobPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            coordinator,
            derivatives_queue,
            cleanup_queue,
        }
    }

    pub async fn timeline(&self, owner_id: Uuid, query: TimelineQuery) -> Result<Page, AppError> {
        let cursor = query
            .cursor
            .as_deref()
            .map(TimelineCursor::decode)
            .transpose()?;
        let limit = self.config.clamp_timeline_limit(query.limit);

        let filter = TimelineFilter {
            from: query.from,
            to: query.to,
            favorite: query.favorite,
            archived: query.archived,
            hidden: query.hidden,
            path_query: query.path_query,
            cursor,
        };

        // One extra row tells us whether another page exists
        let mut rows = self.store.list_timeline(owner_id, &filter, limit + 1).await?;
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        let next_cursor = if has_more {
            rows.last().map(|last| {
                TimelineCursor {
                    sort_at: last.sort_at,
                    id: last.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(Page {
            items: rows,
            next_cursor,
        })
    }

    pub async fn media_detail(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
    ) -> Result<MediaRecord, AppError> {
        self.store
            .find_owned(media_id, owner_id)
            .await?
            .ok_or_else(media_not_found)
    }

    pub async fn patch_media(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
        patch: MediaPatch,
    ) -> Result<MediaRecord, AppError> {
        self.store
            .patch_media(media_id, owner_id, &patch)
            .await?
            .ok_or_else(media_not_found)
    }

    /// Content-serving policy per variant; see module docs.
    pub async fn content(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
        variant: Variant,
    ) -> Result<ServedContent, AppError> {
        let media = self.media_detail(owner_id, media_id).await?;
        if media.flags.deleted_soft {
            return Err(media_not_found());
        }

        match variant {
            Variant::Original => self.serve_original(&media),
            Variant::Thumb | Variant::Small => self.serve_image_derivative(&media, variant).await,
            Variant::Playback => self.serve_playback(&media).await,
        }
    }

    fn serve_original(&self, media: &MediaRecord) -> Result<ServedContent, AppError> {
        let absolute_path = resolve_absolute(&self.config.originals_root, &media.relative_path)
            .map_err(storage_err)?;
        Ok(ServedContent {
            absolute_path,
            content_type: media.mime_type.clone(),
        })
    }

    async fn serve_image_derivative(
        &self,
        media: &MediaRecord,
        variant: Variant,
    ) -> Result<ServedContent, AppError> {
        if let Some(derivative) = self
            .coordinator
            .cached(media, variant)
            .await
            .map_err(derivative_err)?
        {
            return Ok(ServedContent {
                absolute_path: derivative.absolute_path,
                content_type: derivative.content_type.to_string(),
            });
        }

        // Missing: queue async generation and serve the original in the same
        // response. Enqueue failure is logged, never fatal here.
        self.enqueue_generate(media).await;
        self.serve_original(media)
    }

    async fn serve_playback(&self, media: &MediaRecord) -> Result<ServedContent, AppError> {
        if !media.is_video() {
            return Err(AppError::InvalidInput(format!(
                "Playback variant requires a video source, got '{}'",
                media.mime_type
            )));
        }

        for ext in PLAYBACK_EXTS {
            let relative =
                derivative_relative_path(&media.relative_path, media.id, Variant::Playback, ext);
            let absolute_path = resolve_absolute(&self.config.derived_root, &relative)
                .map_err(storage_err)?;
            if storage_fs::file_exists(&absolute_path).await {
                return Ok(ServedContent {
                    absolute_path,
                    content_type: playback_content_type(ext),
                });
            }
        }

        let queued = self.enqueue_generate(media).await;
        Err(AppError::DerivativeNotReady {
            media_id: media.id,
            variant: Variant::Playback,
            queued,
        })
    }

    /// Best-effort enqueue of `media.derivatives.generate`. The stable job id
    /// dedupes repeated attempts for the same media.
    async fn enqueue_generate(&self, media: &MediaRecord) -> bool {
        let command = DerivativesGenerateCommand {
            media_id: media.id,
            owner_id: media.owner_id,
            relative_path: media.relative_path.clone(),
            requested_at: Utc::now(),
        };
        let payload = match to_value(&command) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(media_id = %media.id, error = %err, "Command serialization failed");
                return false;
            }
        };

        let result = self
            .derivatives_queue
            .add(
                &self.config.media_derivatives_queue,
                payload,
                PublishOptions {
                    job_id: Some(derivatives_job_id(media.id)),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(
                    media_id = %media.id,
                    error = %err,
                    "Failed to enqueue derivative generation"
                );
                false
            }
        }
    }

    /// Soft-delete the record and schedule its hard delete after the
    /// retention window. Scheduling failure propagates: without the command
    /// the item would linger in trash forever.
    pub async fn soft_delete(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
    ) -> Result<MediaRecord, AppError> {
        let record = self
            .store
            .set_deleted_soft(media_id, owner_id, true)
            .await?
            .ok_or_else(media_not_found)?;

        let deleted_at = record.deleted_soft_at.unwrap_or_else(Utc::now);
        let retention = self.config.trash_retention();
        let command = CleanupCommand {
            media_id,
            owner_id,
            hard_delete_at: deleted_at + retention,
        };

        self.cleanup_queue
            .add(
                &self.config.media_cleanup_queue,
                to_value(&command)?,
                PublishOptions {
                    job_id: Some(cleanup_job_id(media_id, deleted_at)),
                    delay_ms: Some(retention.num_milliseconds()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| AppError::Queue(err.to_string()))?;

        tracing::info!(
            media_id = %media_id,
            hard_delete_at = %command.hard_delete_at,
            "Soft-deleted media and scheduled cleanup"
        );
        Ok(record)
    }

    /// Clear the soft-delete flag. The already-scheduled cleanup command is
    /// not retracted; its consumer re-checks the flag before acting.
    pub async fn restore(&self, owner_id: Uuid, media_id: Uuid) -> Result<MediaRecord, AppError> {
        self.store
            .set_deleted_soft(media_id, owner_id, false)
            .await?
            .ok_or_else(media_not_found)
    }

    pub async fn trash(
        &self,
        owner_id: Uuid,
        cursor: Option<String>,
        limit: Option<i64>,
    ) -> Result<Page, AppError> {
        let cursor = cursor.as_deref().map(TrashCursor::decode).transpose()?;
        let limit = self.config.clamp_timeline_limit(limit);

        let mut rows = self.store.list_trash(owner_id, cursor, limit + 1).await?;
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        let next_cursor = if has_more {
            rows.last().map(|last| {
                TrashCursor {
                    deleted_at: last.deleted_soft_at.unwrap_or(last.created_at),
                    id: last.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(Page {
            items: rows,
            next_cursor,
        })
    }

    /// Queue an immediate hard delete for every trashed item. Individual
    /// enqueue failures are logged and do not stop the sweep; the count
    /// covers every item processed (best effort).
    pub async fn empty_trash(&self, owner_id: Uuid) -> Result<EmptyTrashReceipt, AppError> {
        let trashed = self.store.list_trashed(owner_id).await?;
        let mut queued_count = 0usize;

        for record in &trashed {
            let now = Utc::now();
            let command = CleanupCommand {
                media_id: record.id,
                owner_id,
                hard_delete_at: now,
            };
            let payload = to_value(&command)?;

            let result = self
                .cleanup_queue
                .add(
                    &self.config.media_cleanup_queue,
                    payload,
                    PublishOptions {
                        job_id: Some(cleanup_job_id(record.id, now)),
                        ..Default::default()
                    },
                )
                .await;

            if let Err(err) = result {
                tracing::warn!(
                    media_id = %record.id,
                    error = %err,
                    "Failed to enqueue trash cleanup; continuing"
                );
            }
            queued_count += 1;
        }

        tracing::info!(owner_id = %owner_id, queued_count, "Emptied trash");
        Ok(EmptyTrashReceipt { queued_count })
    }
}
