//! Shared fakes for processor tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use lumina_core::models::{MediaFlags, MediaRecord, MediaStatus};
use lumina_core::pagination::TrashCursor;
use lumina_core::AppError;
use lumina_db::{MediaPatch, MediaStore, MetadataUpdate, TimelineFilter};
use lumina_queue::Job;

pub fn media_record(mime: &str, relative_path: &str) -> MediaRecord {
    let now = Utc::now();
    MediaRecord {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        relative_path: relative_path.to_string(),
        mime_type: mime.to_string(),
        status: MediaStatus::Processing,
        flags: MediaFlags::default(),
        sort_at: now,
        taken_at: None,
        uploaded_at: now,
        created_at: now,
        width: None,
        height: None,
        deleted_soft_at: None,
    }
}

pub fn job_with_attempts(payload: Value, attempts_made: i64, max_attempts: i64) -> Job {
    Job {
        id: Some("test-job".to_string()),
        queue_name: "media.derivatives.generate".to_string(),
        payload,
        attempts_made,
        max_attempts,
        backoff_delay_ms: 3000,
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<Vec<MediaRecord>>,
    ready: Mutex<Vec<Uuid>>,
    failed: Mutex<Vec<Uuid>>,
    metadata: Mutex<Vec<Uuid>>,
}

impl InMemoryStore {
    pub fn new(rows: Vec<MediaRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<MediaRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn ready_calls(&self) -> Vec<Uuid> {
        self.ready.lock().unwrap().clone()
    }

    pub fn failed_calls(&self) -> Vec<Uuid> {
        self.failed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for InMemoryStore {
    async fn list_timeline(
        &self,
        owner_id: Uuid,
        _filter: &TimelineFilter,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let mut rows: Vec<MediaRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id && !r.flags.deleted_soft)
            .cloned()
            .collect();
        rows.truncate(fetch_limit as usize);
        Ok(rows)
    }

    async fn find_owned(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaRecord>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == media_id && r.owner_id == owner_id)
            .cloned())
    }

    async fn patch_media(
        &self,
        _media_id: Uuid,
        _owner_id: Uuid,
        _patch: &MediaPatch,
    ) -> Result<Option<MediaRecord>, AppError> {
        Ok(None)
    }

    async fn set_deleted_soft(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
        deleted: bool,
    ) -> Result<Option<MediaRecord>, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|r| r.id == media_id && r.owner_id == owner_id)
        else {
            return Ok(None);
        };
        row.flags.deleted_soft = deleted;
        row.deleted_soft_at = deleted.then(Utc::now);
        Ok(Some(row.clone()))
    }

    async fn list_trash(
        &self,
        owner_id: Uuid,
        _cursor: Option<TrashCursor>,
        fetch_limit: i64,
    ) -> Result<Vec<MediaRecord>, AppError> {
        let mut rows: Vec<MediaRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id && r.flags.deleted_soft)
            .cloned()
            .collect();
        rows.truncate(fetch_limit as usize);
        Ok(rows)
    }

    async fn list_trashed(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id && r.flags.deleted_soft)
            .cloned()
            .collect())
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
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.id == media_id && r.owner_id == owner_id && r.flags.deleted_soft));
        Ok(rows.len() < before)
    }

    async fn upsert_metadata(
        &self,
        media_id: Uuid,
        update: &MetadataUpdate,
    ) -> Result<(), AppError> {
        self.metadata.lock().unwrap().push(media_id);
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == media_id) {
            if update.taken_at.is_some() {
                row.taken_at = update.taken_at;
            }
            if update.width.is_some() {
                row.width = update.width;
            }
            if update.height.is_some() {
                row.height = update.height;
            }
        }
        Ok(())
    }

    async fn set_ready_if_processing(&self, media_id: Uuid) -> Result<bool, AppError> {
        self.ready.lock().unwrap().push(media_id);
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.id == media_id && r.status == MediaStatus::Processing)
        {
            row.status = MediaStatus::Ready;
            return Ok(true);
        }
        Ok(false)
    }

    async fn set_failed_if_processing(&self, media_id: Uuid) -> Result<bool, AppError> {
        self.failed.lock().unwrap().push(media_id);
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.id == media_id && r.status == MediaStatus::Processing)
        {
            row.status = MediaStatus::Failed;
            return Ok(true);
        }
        Ok(false)
    }
}
