//! Postgres implementation of [`MediaStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use lumina_core::models::{MediaFlags, MediaRecord, MediaStatus};
use lumina_core::pagination::{TimelineCursor, TrashCursor};
use lumina_core::AppError;

use crate::store::{MediaPatch, MediaStore, MetadataUpdate, TimelineFilter};

const MEDIA_COLUMNS: &str = "id, owner_id, relative_path, mime_type, status, created_at, \
     taken_at, uploaded_at, sort_at, width, height, favorite, archived, hidden, \
     deleted_soft, deleted_soft_at";

/// Flat row shape of the media table.
#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub relative_path: String,
    pub mime_type: String,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub sort_at: DateTime<Utc>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub favorite: bool,
    pub archived: bool,
    pub hidden: bool,
    pub deleted_soft: bool,
    pub deleted_soft_at: Option<DateTime<Utc>>,
}

impl MediaRow {
    pub fn into_record(self) -> MediaRecord {
        MediaRecord {
            id: self.id,
            owner_id: self.owner_id,
            relative_path: self.relative_path,
            mime_type: self.mime_type,
            status: self.status,
            flags: MediaFlags {
                favorite: self.favorite,
                archived: self.archived,
                hidden: self.hidden,
                deleted_soft: self.deleted_soft,
            },
            sort_at: self.sort_at,
            taken_at: self.taken_at,
            uploaded_at: self.uploaded_at,
            created_at: self.created_at,
            width: self.width,
            height: self.height,
            deleted_soft_at: self.deleted_soft_at,
        }
    }
}

fn rows_to_records(rows: Vec<MediaRow>) -> Vec<MediaRecord> {
    rows.into_iter().map(MediaRow::into_record).collect()
}

/// Media repository over a Postgres pool.
#[derive(Clone)]
pub struct PgMediaStore {
    pool: PgPool,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for PgMediaStore {
    async fn list_timeline(
        &self,
        owner_id: Uuid,
        filter: &TimelineFilter,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS}
             FROM media
             WHERE owner_id = $1
               AND deleted_soft = FALSE
               AND ($2::timestamptz IS NULL OR sort_at >= $2)
               AND ($3::timestamptz IS NULL OR sort_at <= $3)
               AND ($4::boolean IS NULL OR favorite = $4)
               AND ($5::boolean IS NULL OR archived = $5)
               AND ($6::boolean IS NULL OR hidden = $6)
               AND (
                 $7::timestamptz IS NULL
                 OR sort_at < $7
                 OR (sort_at = $7 AND id < $8::uuid)
               )
               AND ($9::text IS NULL OR relative_path ILIKE '%' || $9 || '%')
             ORDER BY sort_at DESC, id DESC
             LIMIT $10"
        );

        let (cursor_sort_at, cursor_id) = match filter.cursor {
            Some(TimelineCursor { sort_at, id }) => (Some(sort_at), Some(id)),
            None => (None, None),
        };

        let rows: Vec<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(owner_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.favorite)
            .bind(filter.archived)
            .bind(filter.hidden)
            .bind(cursor_sort_at)
            .bind(cursor_id)
            .bind(filter.path_query.as_deref())
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows_to_records(rows))
    }

    async fn find_owned(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaRecord>, AppError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1 AND owner_id = $2 LIMIT 1"
        );
        let row: Option<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(media_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MediaRow::into_record))
    }

    async fn patch_media(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
        patch: &MediaPatch,
    ) -> Result<Option<MediaRecord>, AppError> {
        let set_taken_at = patch.taken_at.is_some();
        let taken_at_value = patch.taken_at.clone().flatten();

        let sql = format!(
            "UPDATE media SET
               favorite = COALESCE($3, favorite),
               archived = COALESCE($4, archived),
               hidden = COALESCE($5, hidden),
               taken_at = CASE WHEN $6 THEN $7 ELSE taken_at END,
               sort_at = COALESCE(
                 CASE WHEN $6 THEN $7 ELSE taken_at END,
                 uploaded_at,
                 created_at
               )
             WHERE id = $1 AND owner_id = $2
             RETURNING {MEDIA_COLUMNS}"
        );

        let row: Option<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(media_id)
            .bind(owner_id)
            .bind(patch.favorite)
            .bind(patch.archived)
            .bind(patch.hidden)
            .bind(set_taken_at)
            .bind(taken_at_value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MediaRow::into_record))
    }

    async fn set_deleted_soft(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
        deleted: bool,
    ) -> Result<Option<MediaRecord>, AppError> {
        let sql = format!(
            "UPDATE media SET
               deleted_soft = $3,
               deleted_soft_at = CASE WHEN $3 THEN NOW() ELSE NULL END
             WHERE id = $1 AND owner_id = $2
             RETURNING {MEDIA_COLUMNS}"
        );
        let row: Option<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(media_id)
            .bind(owner_id)
            .bind(deleted)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MediaRow::into_record))
    }

    async fn list_trash(
        &self,
        owner_id: Uuid,
        cursor: Option<TrashCursor>,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS}
             FROM media
             WHERE owner_id = $1
               AND deleted_soft = TRUE
               AND (
                 $2::timestamptz IS NULL
                 OR deleted_soft_at < $2
                 OR (deleted_soft_at = $2 AND id < $3::uuid)
               )
             ORDER BY deleted_soft_at DESC, id DESC
             LIMIT $4"
        );

        let (cursor_deleted_at, cursor_id) = match cursor {
            Some(TrashCursor { deleted_at, id }) => (Some(deleted_at), Some(id)),
            None => (None, None),
        };

        let rows: Vec<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(owner_id)
            .bind(cursor_deleted_at)
            .bind(cursor_id)
            .bind(fetch_limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows_to_records(rows))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS}
             FROM media
             WHERE owner_id = $1 AND deleted_soft = TRUE
             ORDER BY deleted_soft_at DESC, id DESC"
        );
        let rows: Vec<MediaRow> = sqlx::query_as::<Postgres, MediaRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows_to_records(rows))
    }

    async fn find_cleanup_candidate(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaRecord>, AppError> {
        self.find_owned(media_id, owner_id).await
    }

    async fn hard_delete_if_still_soft_deleted(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM media WHERE id = $1 AND owner_id = $2 AND deleted_soft = TRUE",
        )
        .bind(media_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_metadata(
        &self,
        media_id: Uuid,
        update: &MetadataUpdate,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE media SET
               taken_at = COALESCE($2, taken_at),
               width = COALESCE($3, width),
               height = COALESCE($4, height),
               sort_at = COALESCE(COALESCE($2, taken_at), uploaded_at, created_at)
             WHERE id = $1",
        )
        .bind(media_id)
        .bind(update.taken_at)
        .bind(update.width)
        .bind(update.height)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_ready_if_processing(&self, media_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE media SET status = $2 WHERE id = $1 AND status = $3")
            .bind(media_id)
            .bind(MediaStatus::Ready)
            .bind(MediaStatus::Processing)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_failed_if_processing(&self, media_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE media SET status = $2 WHERE id = $1 AND status = $3")
            .bind(media_id)
            .bind(MediaStatus::Failed)
            .bind(MediaStatus::Processing)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
