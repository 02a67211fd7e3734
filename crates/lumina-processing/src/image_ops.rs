//! Image variant rendering over the `image` + `webp` codec stack.
//!
//! Two fixed image variants exist: `thumb` is a 320×320 cover crop for grid
//! cells, `small` fits inside 1280×1280 without enlargement for lightbox
//! display. Both re-encode to WebP at a fixed quality.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};

use lumina_core::models::Variant;

use crate::coordinator::ImageVariantTransform;
use crate::DerivativeError;

const THUMB_EDGE: u32 = 320;
const SMALL_EDGE: u32 = 1280;
const WEBP_QUALITY: f32 = 82.0;

/// Production transform: decode, orient, resize, encode WebP.
pub struct WebpVariantTransform;

#[async_trait]
impl ImageVariantTransform for WebpVariantTransform {
    async fn transcode(
        &self,
        source: &Path,
        target: &Path,
        variant: Variant,
    ) -> Result<(), DerivativeError> {
        let source = source.to_path_buf();
        let target = target.to_path_buf();
        // Decode/resize/encode are CPU-bound; keep them off the runtime workers
        tokio::task::spawn_blocking(move || {
            let data = std::fs::read(&source).map_err(|e| {
                DerivativeError::Io(format!("read {}: {}", source.display(), e))
            })?;
            let encoded = render_variant(&data, variant)?;
            std::fs::write(&target, encoded).map_err(|e| {
                DerivativeError::Io(format!("write {}: {}", target.display(), e))
            })?;
            Ok(())
        })
        .await
        .map_err(|e| DerivativeError::Transcode(format!("transcode task panicked: {}", e)))?
    }
}

/// Render one image variant to WebP bytes.
pub fn render_variant(data: &[u8], variant: Variant) -> Result<Vec<u8>, DerivativeError> {
    let img = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| DerivativeError::Transcode(format!("format detection: {}", e)))?
        .decode()
        .map_err(|e| DerivativeError::Transcode(format!("decode: {}", e)))?;

    let img = apply_exif_orientation(img, data);

    let resized = match variant {
        Variant::Thumb => img.resize_to_fill(THUMB_EDGE, THUMB_EDGE, FilterType::Lanczos3),
        Variant::Small => {
            let (width, height) = img.dimensions();
            if width <= SMALL_EDGE && height <= SMALL_EDGE {
                img
            } else {
                img.resize(SMALL_EDGE, SMALL_EDGE, FilterType::Lanczos3)
            }
        }
        other => {
            return Err(DerivativeError::UnsupportedVariant(other.to_string()));
        }
    };

    let rgba = resized.to_rgba8();
    let (width, height) = rgba.dimensions();
    let encoded = webp::Encoder::from_rgba(&rgba, width, height).encode(WEBP_QUALITY);
    Ok(encoded.to_vec())
}

/// Orientation tag from embedded EXIF; 1 (normal) when absent or unreadable.
fn read_exif_orientation(data: &[u8]) -> u8 {
    let mut cursor = Cursor::new(data);
    exif::Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|meta| {
            meta.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(|value| value as u8)
        .unwrap_or(1)
}

/// Bake the EXIF orientation into the pixels so derivatives never depend on
/// viewer-side rotation.
fn apply_exif_orientation(img: DynamicImage, data: &[u8]) -> DynamicImage {
    // (rotate_angle, flip_horizontal, flip_vertical) per EXIF orientation value
    let (rotate, flip_h, flip_v) = match read_exif_orientation(data) {
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(270), true, false),
        6 => (Some(90), false, false),
        7 => (Some(90), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    };

    let mut img = match rotate {
        Some(90) => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
        Some(180) => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
        Some(270) => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
        _ => img,
    };
    if flip_h {
        img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
    }
    if flip_v {
        img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
    }
    img
}
