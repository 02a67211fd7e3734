//! Scheduled hard-delete processor.
//!
//! Command issuance and execution are decoupled: by the time a cleanup
//! command arrives, the owner may have restored the item. Current soft-delete
//! state is therefore re-checked here before anything destructive happens,
//! and the row delete itself is conditional on the flag to close the
//! restore/execute race.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use lumina_core::models::{MediaRecord, Variant};
use lumina_db::MediaStore;
use lumina_queue::{CommandHandler, Job};
use lumina_storage::fs as storage_fs;
use lumina_storage::paths::{
    derivative_relative_path, resolve_absolute, IMAGE_DERIVATIVE_EXT, PLAYBACK_EXTS,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupPayload {
    media_id: Uuid,
    owner_id: Uuid,
}

pub struct CleanupProcessor {
    store: Arc<dyn MediaStore>,
    originals_root: PathBuf,
    derived_root: PathBuf,
}

impl CleanupProcessor {
    pub fn new(store: Arc<dyn MediaStore>, originals_root: PathBuf, derived_root: PathBuf) -> Self {
        Self {
            store,
            originals_root,
            derived_root,
        }
    }

    /// Every artifact path a media item may have left on disk.
    fn artifact_paths(&self, media: &MediaRecord) -> Result<Vec<PathBuf>> {
        let mut paths = vec![resolve_absolute(
            &self.originals_root,
            &media.relative_path,
        )?];
        for variant in [Variant::Thumb, Variant::Small] {
            let relative = derivative_relative_path(
                &media.relative_path,
                media.id,
                variant,
                IMAGE_DERIVATIVE_EXT,
            );
            paths.push(resolve_absolute(&self.derived_root, &relative)?);
        }
        for ext in PLAYBACK_EXTS {
            let relative =
                derivative_relative_path(&media.relative_path, media.id, Variant::Playback, ext);
            paths.push(resolve_absolute(&self.derived_root, &relative)?);
        }
        Ok(paths)
    }
}

#[async_trait]
impl CommandHandler for CleanupProcessor {
    async fn handle(&self, job: &Job) -> Result<()> {
        let payload: CleanupPayload = serde_json::from_value(job.payload.clone())
            .map_err(|err| anyhow!("invalid cleanup job payload: {}", err))?;

        let Some(target) = self
            .store
            .find_cleanup_candidate(payload.media_id, payload.owner_id)
            .await?
        else {
            tracing::info!(media_id = %payload.media_id, "Cleanup target already gone");
            return Ok(());
        };

        if !target.flags.deleted_soft {
            tracing::info!(
                media_id = %target.id,
                "Media was restored after scheduling; skipping hard delete"
            );
            return Ok(());
        }

        for path in self.artifact_paths(&target)? {
            if storage_fs::remove_file_if_present(&path).await? {
                tracing::debug!(path = %path.display(), "Removed artifact");
            }
        }

        let deleted = self
            .store
            .hard_delete_if_still_soft_deleted(target.id, payload.owner_id)
            .await?;
        if deleted {
            tracing::info!(media_id = %target.id, "Hard-deleted media");
        } else {
            // Restore raced the artifact sweep; the row survives
            tracing::warn!(media_id = %target.id, "Restore raced cleanup; row kept");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::{job_with_attempts, media_record, InMemoryStore};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    struct Rig {
        processor: CleanupProcessor,
        store: Arc<InMemoryStore>,
        originals: TempDir,
        derived: TempDir,
    }

    fn rig(rows: Vec<MediaRecord>) -> Rig {
        let originals = TempDir::new().unwrap();
        let derived = TempDir::new().unwrap();
        let store = Arc::new(InMemoryStore::new(rows));
        let processor = CleanupProcessor::new(
            store.clone(),
            originals.path().to_path_buf(),
            derived.path().to_path_buf(),
        );
        Rig {
            processor,
            store,
            originals,
            derived,
        }
    }

    fn payload(media: &MediaRecord) -> serde_json::Value {
        json!({
            "mediaId": media.id,
            "ownerId": media.owner_id,
            "hardDeleteAt": Utc::now(),
        })
    }

    #[tokio::test]
    async fn deletes_artifacts_and_row_when_still_trashed() {
        let mut media = media_record("image/jpeg", "x.jpg");
        media.flags.deleted_soft = true;
        media.deleted_soft_at = Some(Utc::now());
        let rig = rig(vec![media.clone()]);

        let original = rig.originals.path().join("x.jpg");
        let thumb = rig.derived.path().join(format!("{}-thumb.webp", media.id));
        tokio::fs::write(&original, b"src").await.unwrap();
        tokio::fs::write(&thumb, b"webp").await.unwrap();

        rig.processor
            .handle(&job_with_attempts(payload(&media), 0, 5))
            .await
            .unwrap();

        assert!(!original.exists());
        assert!(!thumb.exists());
        assert!(rig.store.rows().is_empty());
    }

    #[tokio::test]
    async fn restored_media_is_left_completely_alone() {
        let media = media_record("image/jpeg", "y.jpg");
        let rig = rig(vec![media.clone()]);

        let original = rig.originals.path().join("y.jpg");
        tokio::fs::write(&original, b"src").await.unwrap();

        rig.processor
            .handle(&job_with_attempts(payload(&media), 0, 5))
            .await
            .unwrap();

        assert!(original.exists());
        assert_eq!(rig.store.rows().len(), 1);
    }

    #[tokio::test]
    async fn missing_target_is_not_an_error() {
        let media = media_record("image/jpeg", "z.jpg");
        let rig = rig(vec![]);

        rig.processor
            .handle(&job_with_attempts(payload(&media), 0, 5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_artifacts_are_tolerated() {
        let mut media = media_record("video/mp4", "v.mp4");
        media.flags.deleted_soft = true;
        media.deleted_soft_at = Some(Utc::now());
        let rig = rig(vec![media.clone()]);

        // No files on disk at all; only the row should disappear
        rig.processor
            .handle(&job_with_attempts(payload(&media), 0, 5))
            .await
            .unwrap();
        assert!(rig.store.rows().is_empty());
    }
}
