use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Processing status of a media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Processing,
    Ready,
    Failed,
}

/// Timeline flags carried on every media record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFlags {
    pub favorite: bool,
    pub archived: bool,
    pub hidden: bool,
    pub deleted_soft: bool,
}

/// Unified media record.
///
/// `sort_at` is the authoritative timeline ordering key, derived from capture
/// time, falling back to upload time, falling back to creation time. The row
/// survives soft deletion; only an executed hard-delete command removes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub relative_path: String,
    pub mime_type: String,
    pub status: MediaStatus,
    pub flags: MediaFlags,
    pub sort_at: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub deleted_soft_at: Option<DateTime<Utc>>,
}

impl MediaRecord {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// Content variant requested from the content endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Original,
    Thumb,
    Small,
    Playback,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Thumb => "thumb",
            Variant::Small => "small",
            Variant::Playback => "playback",
        }
    }

    /// Image derivatives are generated on demand and have an original-bytes
    /// fallback; playback does not.
    pub fn is_image_derivative(&self) -> bool {
        matches!(self, Variant::Thumb | Variant::Small)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Variant::Original),
            "thumb" => Ok(Variant::Thumb),
            "small" => Ok(Variant::Small),
            "playback" => Ok(Variant::Playback),
            other => Err(AppError::InvalidInput(format!(
                "Unknown content variant '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_parses_known_names_only() {
        assert_eq!("thumb".parse::<Variant>().unwrap(), Variant::Thumb);
        assert_eq!("playback".parse::<Variant>().unwrap(), Variant::Playback);
        assert!("medium".parse::<Variant>().is_err());
        assert!("THUMB".parse::<Variant>().is_err());
    }

    #[test]
    fn image_derivative_classification() {
        assert!(Variant::Thumb.is_image_derivative());
        assert!(Variant::Small.is_image_derivative());
        assert!(!Variant::Original.is_image_derivative());
        assert!(!Variant::Playback.is_image_derivative());
    }
}
