use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::OwnerId;
use crate::dto::{MediaDto, PageDto};
use crate::error::HttpAppError;
use crate::services::library::TimelineQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineParams {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub favorite: Option<bool>,
    pub archived: Option<bool>,
    pub hidden: Option<bool>,
    pub q: Option<String>,
}

/// GET /api/v1/library/timeline
pub async fn get_timeline(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<PageDto>, HttpAppError> {
    let page = state
        .library
        .timeline(
            owner_id,
            TimelineQuery {
                cursor: params.cursor,
                limit: params.limit,
                from: params.from,
                to: params.to,
                favorite: params.favorite,
                archived: params.archived,
                hidden: params.hidden,
                path_query: params.q,
            },
        )
        .await?;

    Ok(Json(PageDto {
        items: page.items.iter().map(MediaDto::from).collect(),
        next_cursor: page.next_cursor,
    }))
}
