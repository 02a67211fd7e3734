//! Source metadata extraction.
//!
//! Best-effort by contract: callers log and continue when extraction fails,
//! so a corrupt EXIF block never blocks derivative generation.

use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::DerivativeError;

/// Metadata pulled from a source image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub taken_at: Option<DateTime<Utc>>,
}

/// Read dimensions and capture time from an image file.
pub async fn extract_image_metadata(path: &Path) -> Result<ImageMetadata, DerivativeError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let (width, height) = image::image_dimensions(&path)
            .map_err(|e| DerivativeError::Transcode(format!("read dimensions: {}", e)))?;
        Ok(ImageMetadata {
            width: Some(width as i32),
            height: Some(height as i32),
            taken_at: read_capture_time(&path),
        })
    })
    .await
    .map_err(|e| DerivativeError::Transcode(format!("metadata task panicked: {}", e)))?
}

/// EXIF `DateTimeOriginal`, treated as UTC. Cameras record local wall-clock
/// time with no zone; UTC is the least-surprising stable interpretation.
fn read_capture_time(path: &Path) -> Option<DateTime<Utc>> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let meta = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = meta.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;
    let raw = field.display_value().to_string();
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y:%m:%d %H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}
