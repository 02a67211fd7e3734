//! Caller identity extraction.
//!
//! Authentication and token issuance live in the upstream gateway; by the
//! time a request reaches this service the authenticated owner id is carried
//! in the `x-owner-id` header. This extractor is the only place that reads it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use lumina_core::AppError;

use crate::error::HttpAppError;

const OWNER_HEADER: &str = "x-owner-id";

/// Authenticated owner of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub Uuid);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized("Missing owner identity".to_string()))
            })?;

        let owner_id = Uuid::parse_str(raw).map_err(|_| {
            HttpAppError(AppError::Unauthorized("Malformed owner identity".to_string()))
        })?;

        Ok(OwnerId(owner_id))
    }
}
