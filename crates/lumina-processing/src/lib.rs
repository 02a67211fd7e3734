//! Derivative generation for the media library.
//!
//! The coordinator owns the one piece of explicit in-process concurrency
//! control in the system: a process-wide in-flight map that collapses
//! concurrent builds of the same derivative into a single transcode. Image
//! variants are produced here; playback encoding goes through the
//! [`playback::PlaybackEncoder`] seam.

pub mod coordinator;
pub mod image_ops;
pub mod metadata;
pub mod playback;

use std::path::PathBuf;

use thiserror::Error;

pub use coordinator::{DerivativeCoordinator, ImageVariantTransform};
pub use image_ops::WebpVariantTransform;
pub use metadata::{extract_image_metadata, ImageMetadata};
pub use playback::{FfmpegPlaybackEncoder, PlaybackEncoder};

/// A generated (or already-present) derivative artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeOutput {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub content_type: &'static str,
}

/// Errors from derivative generation.
///
/// Cloneable by design: a single failed build is observed by every caller
/// coalesced onto it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DerivativeError {
    #[error("Unsupported derivative variant: {0}")]
    UnsupportedVariant(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Transcode failed: {0}")]
    Transcode(String),
}

impl From<lumina_storage::StorageError> for DerivativeError {
    fn from(err: lumina_storage::StorageError) -> Self {
        DerivativeError::Path(err.to_string())
    }
}
