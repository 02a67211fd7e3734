//! Opaque pagination cursors for ordered result sets.
//!
//! A cursor encodes the `(sort key, tie-breaker id)` resume point of a keyset
//! query as URL-safe base64 over a small JSON payload. Ordering is
//! `(sort key DESC, id DESC)` so pagination stays deterministic when sort
//! keys collide. Decoding validates both fields; a malformed token is a
//! client error, never a panic.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePayload {
    sort_at: String,
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrashPayload {
    deleted_at: String,
    id: String,
}

/// Resume point for timeline queries, ordered by `(sort_at DESC, id DESC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineCursor {
    pub sort_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Resume point for trash queries, ordered by `(deleted_at DESC, id DESC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrashCursor {
    pub deleted_at: DateTime<Utc>,
    pub id: Uuid,
}

fn invalid_cursor() -> AppError {
    AppError::InvalidInput("Invalid cursor value".to_string())
}

fn encode_payload<T: Serialize>(payload: &T) -> String {
    // Serializing a two-string struct cannot fail
    let json = serde_json::to_vec(payload).expect("cursor payload serializes");
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_parts<T: for<'de> Deserialize<'de>>(token: &str) -> Result<T, AppError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| invalid_cursor())?;
    serde_json::from_slice(&raw).map_err(|_| invalid_cursor())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| invalid_cursor())
}

fn parse_id(value: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(value).map_err(|_| invalid_cursor())
}

impl TimelineCursor {
    pub fn encode(&self) -> String {
        encode_payload(&TimelinePayload {
            sort_at: self.sort_at.to_rfc3339(),
            id: self.id.to_string(),
        })
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        let payload: TimelinePayload = decode_parts(token)?;
        Ok(Self {
            sort_at: parse_timestamp(&payload.sort_at)?,
            id: parse_id(&payload.id)?,
        })
    }
}

impl TrashCursor {
    pub fn encode(&self) -> String {
        encode_payload(&TrashPayload {
            deleted_at: self.deleted_at.to_rfc3339(),
            id: self.id.to_string(),
        })
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        let payload: TrashPayload = decode_parts(token)?;
        Ok(Self {
            deleted_at: parse_timestamp(&payload.deleted_at)?,
            id: parse_id(&payload.id)?,
        })
    }
}
