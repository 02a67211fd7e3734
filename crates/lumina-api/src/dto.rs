//! API response shapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use lumina_core::models::{MediaFlags, MediaRecord};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub taken_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub mime_type: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub flags: MediaFlags,
    pub derivatives: serde_json::Value,
}

impl From<&MediaRecord> for MediaDto {
    fn from(record: &MediaRecord) -> Self {
        let base = format!("/api/v1/media/{}/content", record.id);
        Self {
            id: record.id,
            owner_id: record.owner_id,
            taken_at: record.taken_at,
            uploaded_at: record.uploaded_at,
            mime_type: record.mime_type.clone(),
            width: record.width,
            height: record.height,
            flags: record.flags,
            derivatives: json!({
                "original": format!("{base}?variant=original"),
                "thumb": format!("{base}?variant=thumb"),
                "small": format!("{base}?variant=small"),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    pub items: Vec<MediaDto>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEnvelopeDto {
    pub media: MediaDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceiptDto {
    pub media_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyTrashReceiptDto {
    pub queued_count: usize,
}
