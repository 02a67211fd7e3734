//! Command payloads carried over the broker.
//!
//! Payloads are JSON with camelCase keys; the routing key equals the logical
//! queue name. Job ids deduplicate repeated enqueue attempts for the same unit
//! of work, so they must be stable for idempotent commands and unique per
//! event for delete scheduling (a restore followed by a new delete must not
//! collide with the previous cycle's scheduled cleanup).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `media.process` — emitted by ingest once an upload is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProcessCommand {
    pub media_id: Uuid,
    pub owner_id: Uuid,
    pub relative_path: String,
    pub checksum_sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// `media.derivatives.generate` — requested when a derivative is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivativesGenerateCommand {
    pub media_id: Uuid,
    pub owner_id: Uuid,
    pub relative_path: String,
    pub requested_at: DateTime<Utc>,
}

/// `media.cleanup` — scheduled hard delete of a soft-deleted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupCommand {
    pub media_id: Uuid,
    pub owner_id: Uuid,
    pub hard_delete_at: DateTime<Utc>,
}

/// Stable job id for `media.process`; one unit of work per upload.
pub fn process_job_id(media_id: Uuid) -> String {
    format!("media.process:{}", media_id)
}

/// Stable job id for `media.derivatives.generate`; duplicate enqueue attempts
/// for the same media collapse into one job.
pub fn derivatives_job_id(media_id: Uuid) -> String {
    format!("media.derivatives.generate:{}", media_id)
}

/// Job id for `media.cleanup`, unique per delete event so that repeated
/// delete/restore cycles never collide.
pub fn cleanup_job_id(media_id: Uuid, deleted_at: DateTime<Utc>) -> String {
    format!(
        "media.cleanup:{}:{}",
        media_id,
        deleted_at.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn derivatives_job_id_is_stable() {
        let id = Uuid::new_v4();
        assert_eq!(derivatives_job_id(id), derivatives_job_id(id));
        assert_eq!(
            derivatives_job_id(id),
            format!("media.derivatives.generate:{}", id)
        );
    }

    #[test]
    fn cleanup_job_id_differs_per_delete_event() {
        let id = Uuid::new_v4();
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let second = first + chrono::Duration::milliseconds(1);
        assert_ne!(cleanup_job_id(id, first), cleanup_job_id(id, second));
    }

    #[test]
    fn cleanup_command_round_trips_camel_case() {
        let cmd = CleanupCommand {
            media_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            hard_delete_at: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert!(value.get("mediaId").is_some());
        assert!(value.get("hardDeleteAt").is_some());
        let back: CleanupCommand = serde_json::from_value(value).unwrap();
        assert_eq!(back, cmd);
    }
}
