//! Derivative coordinator: at-most-one concurrent build per derivative path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use lumina_core::models::{MediaRecord, Variant};
use lumina_storage::fs as storage_fs;
use lumina_storage::paths::{derivative_relative_path, resolve_absolute, IMAGE_DERIVATIVE_EXT};

use crate::{DerivativeError, DerivativeOutput};

const WEBP_CONTENT_TYPE: &str = "image/webp";

/// Produces one image variant file from a source file. The production
/// implementation wraps the image codec stack; tests substitute counters.
#[async_trait]
pub trait ImageVariantTransform: Send + Sync {
    async fn transcode(
        &self,
        source: &Path,
        target: &Path,
        variant: Variant,
    ) -> Result<(), DerivativeError>;
}

type SharedBuild = Shared<BoxFuture<'static, Result<DerivativeOutput, DerivativeError>>>;

/// Coordinates derivative builds across concurrent requests.
///
/// Writes to a derivative path only ever happen inside the build future
/// registered for that path, which removes write-write races without any
/// filesystem lock. The in-flight entry is removed on every exit path,
/// success or failure, before the result is observable.
pub struct DerivativeCoordinator {
    originals_root: PathBuf,
    derived_root: PathBuf,
    transform: Arc<dyn ImageVariantTransform>,
    in_flight: Arc<Mutex<HashMap<PathBuf, SharedBuild>>>,
}

impl DerivativeCoordinator {
    pub fn new(
        originals_root: PathBuf,
        derived_root: PathBuf,
        transform: Arc<dyn ImageVariantTransform>,
    ) -> Self {
        Self {
            originals_root,
            derived_root,
            transform,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached derivative for `(media, variant)`, building it first
    /// if needed. Concurrent calls for the same derivative path await one
    /// underlying transcode and share its outcome.
    ///
    /// Only image variants are valid here; anything else is a contract
    /// violation, not a retryable condition.
    pub async fn ensure_derivative(
        &self,
        media: &MediaRecord,
        variant: Variant,
    ) -> Result<DerivativeOutput, DerivativeError> {
        if !variant.is_image_derivative() {
            return Err(DerivativeError::UnsupportedVariant(variant.to_string()));
        }

        let source = resolve_absolute(&self.originals_root, &media.relative_path)?;
        let relative_path =
            derivative_relative_path(&media.relative_path, media.id, variant, IMAGE_DERIVATIVE_EXT);
        let absolute_path = resolve_absolute(&self.derived_root, &relative_path)?;

        let build = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(existing) = in_flight.get(&absolute_path) {
                existing.clone()
            } else {
                let fresh = Self::build_future(
                    self.transform.clone(),
                    self.in_flight.clone(),
                    source,
                    absolute_path.clone(),
                    relative_path,
                    variant,
                );
                in_flight.insert(absolute_path.clone(), fresh.clone());
                fresh
            }
        };

        build.await
    }

    /// Probe for an already-built derivative without triggering a build.
    /// Content serving uses this: a missing derivative falls back or queues
    /// async generation rather than blocking the request on a transcode.
    pub async fn cached(
        &self,
        media: &MediaRecord,
        variant: Variant,
    ) -> Result<Option<DerivativeOutput>, DerivativeError> {
        if !variant.is_image_derivative() {
            return Err(DerivativeError::UnsupportedVariant(variant.to_string()));
        }

        let relative_path =
            derivative_relative_path(&media.relative_path, media.id, variant, IMAGE_DERIVATIVE_EXT);
        let absolute_path = resolve_absolute(&self.derived_root, &relative_path)?;

        if storage_fs::file_exists(&absolute_path).await {
            Ok(Some(DerivativeOutput {
                relative_path,
                absolute_path,
                content_type: WEBP_CONTENT_TYPE,
            }))
        } else {
            Ok(None)
        }
    }

    fn build_future(
        transform: Arc<dyn ImageVariantTransform>,
        in_flight: Arc<Mutex<HashMap<PathBuf, SharedBuild>>>,
        source: PathBuf,
        absolute_path: PathBuf,
        relative_path: String,
        variant: Variant,
    ) -> SharedBuild {
        async move {
            let result =
                Self::build_once(transform, &source, &absolute_path, &relative_path, variant)
                    .await;
            // The entry must go away on every exit path, or a failed build
            // would pin its error for the lifetime of the process.
            in_flight.lock().unwrap().remove(&absolute_path);
            result
        }
        .boxed()
        .shared()
    }

    async fn build_once(
        transform: Arc<dyn ImageVariantTransform>,
        source: &Path,
        absolute_path: &Path,
        relative_path: &str,
        variant: Variant,
    ) -> Result<DerivativeOutput, DerivativeError> {
        let output = DerivativeOutput {
            relative_path: relative_path.to_string(),
            absolute_path: absolute_path.to_path_buf(),
            content_type: WEBP_CONTENT_TYPE,
        };

        // Idempotent fast path
        if storage_fs::file_exists(absolute_path).await {
            return Ok(output);
        }

        storage_fs::ensure_parent_dir(absolute_path).await?;
        transform.transcode(source, absolute_path, variant).await?;

        tracing::info!(
            source = %source.display(),
            derivative = %absolute_path.display(),
            variant = %variant,
            "Generated derivative"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lumina_core::models::{MediaFlags, MediaStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;
    use uuid::Uuid;

    struct CountingTransform {
        invocations: AtomicUsize,
        fail: bool,
    }

    impl CountingTransform {
        fn new() -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                invocations: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageVariantTransform for CountingTransform {
        async fn transcode(
            &self,
            _source: &Path,
            target: &Path,
            _variant: Variant,
        ) -> Result<(), DerivativeError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            // Hold the build open so concurrent callers pile up on it
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            if self.fail {
                return Err(DerivativeError::Transcode("decoder exploded".into()));
            }
            tokio::fs::write(target, b"webp-bytes")
                .await
                .map_err(|e| DerivativeError::Io(e.to_string()))?;
            Ok(())
        }
    }

    fn media(relative_path: &str) -> MediaRecord {
        let now = Utc::now();
        MediaRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            relative_path: relative_path.to_string(),
            mime_type: "image/jpeg".to_string(),
            status: MediaStatus::Ready,
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

    fn coordinator(
        originals: &Path,
        derived: &Path,
        transform: Arc<CountingTransform>,
    ) -> DerivativeCoordinator {
        DerivativeCoordinator::new(
            originals.to_path_buf(),
            derived.to_path_buf(),
            transform,
        )
    }

    #[tokio::test]
    async fn concurrent_calls_coalesce_into_one_transcode() {
        let originals = tempdir().unwrap();
        let derived = tempdir().unwrap();
        let transform = Arc::new(CountingTransform::new());
        let coordinator = Arc::new(coordinator(
            originals.path(),
            derived.path(),
            transform.clone(),
        ));
        let record = media("2026/03/cat.jpg");

        let calls = (0..8).map(|_| {
            let coordinator = coordinator.clone();
            let record = record.clone();
            async move { coordinator.ensure_derivative(&record, Variant::Thumb).await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(transform.count(), 1);
        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap(), &first);
        }
        assert!(first.absolute_path.starts_with(derived.path()));
        assert_eq!(first.content_type, "image/webp");
    }

    #[tokio::test]
    async fn existing_derivative_skips_the_transform() {
        let originals = tempdir().unwrap();
        let derived = tempdir().unwrap();
        let transform = Arc::new(CountingTransform::new());
        let coordinator = coordinator(originals.path(), derived.path(), transform.clone());
        let record = media("cat.jpg");

        let expected = derived
            .path()
            .join(format!("{}-small.webp", record.id));
        tokio::fs::write(&expected, b"already-there").await.unwrap();

        let output = coordinator
            .ensure_derivative(&record, Variant::Small)
            .await
            .unwrap();
        assert_eq!(output.absolute_path, expected);
        assert_eq!(transform.count(), 0);
    }

    #[tokio::test]
    async fn cached_probe_never_builds() {
        let originals = tempdir().unwrap();
        let derived = tempdir().unwrap();
        let transform = Arc::new(CountingTransform::new());
        let coordinator = coordinator(originals.path(), derived.path(), transform.clone());
        let record = media("cat.jpg");

        assert!(coordinator
            .cached(&record, Variant::Thumb)
            .await
            .unwrap()
            .is_none());

        let expected = derived.path().join(format!("{}-thumb.webp", record.id));
        tokio::fs::write(&expected, b"cached").await.unwrap();

        let hit = coordinator
            .cached(&record, Variant::Thumb)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.absolute_path, expected);
        assert_eq!(transform.count(), 0);
    }

    #[tokio::test]
    async fn unsupported_variants_fail_fast() {
        let originals = tempdir().unwrap();
        let derived = tempdir().unwrap();
        let transform = Arc::new(CountingTransform::new());
        let coordinator = coordinator(originals.path(), derived.path(), transform.clone());
        let record = media("cat.mp4");

        let err = coordinator
            .ensure_derivative(&record, Variant::Playback)
            .await
            .unwrap_err();
        assert!(matches!(err, DerivativeError::UnsupportedVariant(_)));
        assert_eq!(transform.count(), 0);
    }

    #[tokio::test]
    async fn failure_is_shared_and_the_entry_is_cleared() {
        let originals = tempdir().unwrap();
        let derived = tempdir().unwrap();
        let transform = Arc::new(CountingTransform::failing());
        let coordinator = Arc::new(coordinator(
            originals.path(),
            derived.path(),
            transform.clone(),
        ));
        let record = media("dog.jpg");

        let calls = (0..4).map(|_| {
            let coordinator = coordinator.clone();
            let record = record.clone();
            async move { coordinator.ensure_derivative(&record, Variant::Thumb).await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(transform.count(), 1);
        for result in &results {
            assert!(matches!(result, Err(DerivativeError::Transcode(_))));
        }

        // A later call is not pinned to the stale failure
        let retry = coordinator
            .ensure_derivative(&record, Variant::Thumb)
            .await;
        assert!(retry.is_err());
        assert_eq!(transform.count(), 2);
    }
}
