//! The media store interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lumina_core::models::MediaRecord;
use lumina_core::pagination::{TimelineCursor, TrashCursor};
use lumina_core::AppError;

/// Filters for timeline listing. All fields are optional; `cursor` is the
/// keyset resume point from the previous page.
#[derive(Debug, Clone, Default)]
pub struct TimelineFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
    pub path_query: Option<String>,
    pub cursor: Option<TimelineCursor>,
}

/// Partial flag/timestamp update. `taken_at` is tri-state: absent leaves the
/// column untouched, `Some(None)` clears it, `Some(Some(_))` sets it.
#[derive(Debug, Clone, Default)]
pub struct MediaPatch {
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
    pub taken_at: Option<Option<DateTime<Utc>>>,
}

/// Metadata captured during processing. Updating any of the timestamp inputs
/// recomputes `sort_at` (taken_at, else uploaded_at, else created_at).
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub taken_at: Option<DateTime<Utc>>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Typed query surface over the media table.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Timeline page, newest first by `(sort_at DESC, id DESC)`, excluding
    /// soft-deleted rows. Returns up to `fetch_limit` rows; callers fetch one
    /// extra row to detect whether another page exists.
    async fn list_timeline(
        &self,
        owner_id: Uuid,
        filter: &TimelineFilter,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError>;

    async fn find_owned(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaRecord>, AppError>;

    async fn patch_media(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
        patch: &MediaPatch,
    ) -> Result<Option<MediaRecord>, AppError>;

    /// Set or clear the soft-delete flag, stamping `deleted_soft_at`.
    async fn set_deleted_soft(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
        deleted: bool,
    ) -> Result<Option<MediaRecord>, AppError>;

    /// Trash page, newest deletion first by `(deleted_soft_at DESC, id DESC)`.
    async fn list_trash(
        &self,
        owner_id: Uuid,
        cursor: Option<TrashCursor>,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError>;

    /// Every currently soft-deleted row for the owner (trash emptying).
    async fn list_trashed(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError>;

    /// The row a cleanup command targets, regardless of flag state; the
    /// consumer re-checks `deleted_soft` before acting.
    async fn find_cleanup_candidate(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaRecord>, AppError>;

    /// Hard-delete the row only if it is still soft-deleted, guarding against
    /// a restore that raced the scheduled command. Returns whether a row died.
    async fn hard_delete_if_still_soft_deleted(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn upsert_metadata(
        &self,
        media_id: Uuid,
        update: &MetadataUpdate,
    ) -> Result<(), AppError>;

    /// `processing -> ready`; no-op for any other current status.
    async fn set_ready_if_processing(&self, media_id: Uuid) -> Result<bool, AppError>;

    /// `processing -> failed`; recorded when a command exhausts its attempts.
    async fn set_failed_if_processing(&self, media_id: Uuid) -> Result<bool, AppError>;
}
