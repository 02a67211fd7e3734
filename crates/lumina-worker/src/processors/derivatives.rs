//! Derivative generation processor.
//!
//! Consumes both `media.process` (fresh uploads) and
//! `media.derivatives.generate` (on-demand requests); the payloads share the
//! fields this processor needs and extra fields are ignored.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use lumina_core::models::{MediaRecord, Variant};
use lumina_db::{MediaStore, MetadataUpdate};
use lumina_processing::{extract_image_metadata, DerivativeCoordinator, PlaybackEncoder};
use lumina_queue::{CommandHandler, Job};
use lumina_storage::fs as storage_fs;
use lumina_storage::paths::{derivative_relative_path, resolve_absolute};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratePayload {
    media_id: Uuid,
    owner_id: Uuid,
}

pub struct DerivativesProcessor {
    store: Arc<dyn MediaStore>,
    coordinator: Arc<DerivativeCoordinator>,
    playback: Arc<dyn PlaybackEncoder>,
    originals_root: PathBuf,
    derived_root: PathBuf,
}

impl DerivativesProcessor {
    pub fn new(
        store: Arc<dyn MediaStore>,
        coordinator: Arc<DerivativeCoordinator>,
        playback: Arc<dyn PlaybackEncoder>,
        originals_root: PathBuf,
        derived_root: PathBuf,
    ) -> Self {
        Self {
            store,
            coordinator,
            playback,
            originals_root,
            derived_root,
        }
    }

    async fn refresh_metadata(&self, media: &MediaRecord) {
        let source = match resolve_absolute(&self.originals_root, &media.relative_path) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(media_id = %media.id, error = %err, "Bad source path; skipping metadata");
                return;
            }
        };

        // Metadata is best-effort: a corrupt EXIF block must not fail the job
        match extract_image_metadata(&source).await {
            Ok(meta) => {
                let update = MetadataUpdate {
                    taken_at: meta.taken_at,
                    width: meta.width,
                    height: meta.height,
                };
                if let Err(err) = self.store.upsert_metadata(media.id, &update).await {
                    tracing::warn!(media_id = %media.id, error = %err, "Metadata persist failed");
                }
            }
            Err(err) => {
                tracing::warn!(
                    media_id = %media.id,
                    error = %err,
                    "Metadata extraction failed; continuing derivative processing"
                );
            }
        }
    }

    async fn generate_image_derivatives(&self, media: &MediaRecord) -> Result<()> {
        for variant in [Variant::Thumb, Variant::Small] {
            self.coordinator
                .ensure_derivative(media, variant)
                .await
                .with_context(|| format!("generate {} derivative", variant))?;
        }
        Ok(())
    }

    async fn generate_playback(&self, media: &MediaRecord) -> Result<()> {
        let relative = derivative_relative_path(
            &media.relative_path,
            media.id,
            Variant::Playback,
            self.playback.target_ext(),
        );
        let target = resolve_absolute(&self.derived_root, &relative)?;

        if storage_fs::file_exists(&target).await {
            return Ok(());
        }

        let source = resolve_absolute(&self.originals_root, &media.relative_path)?;
        storage_fs::ensure_parent_dir(&target).await?;
        self.playback
            .encode(&source, &target)
            .await
            .context("encode playback derivative")?;
        Ok(())
    }

    async fn process(&self, media: &MediaRecord) -> Result<()> {
        if media.is_video() {
            self.generate_playback(media).await?;
        } else {
            self.refresh_metadata(media).await;
            self.generate_image_derivatives(media).await?;
        }

        self.store.set_ready_if_processing(media.id).await?;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for DerivativesProcessor {
    async fn handle(&self, job: &Job) -> Result<()> {
        let payload: GeneratePayload = serde_json::from_value(job.payload.clone())
            .map_err(|err| anyhow!("invalid derivatives job payload: {}", err))?;

        let Some(media) = self
            .store
            .find_owned(payload.media_id, payload.owner_id)
            .await?
        else {
            // Deleted while the command sat in the queue; nothing to do
            tracing::info!(media_id = %payload.media_id, "Media gone; skipping derivatives");
            return Ok(());
        };

        let result = self.process(&media).await;

        if result.is_err() && job.attempts_made + 1 >= job.max_attempts {
            // Terminal failure: surface it on the record before the message
            // is parked in the DLQ
            if let Err(status_err) = self.store.set_failed_if_processing(media.id).await {
                tracing::error!(
                    media_id = %media.id,
                    error = %status_err,
                    "Failed to persist terminal media status"
                );
            }
        }

        result
    }
}
