use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use dialer_core::{ActivityFilter, ActivityRecord};

use crate::state::AppState;

/// Maximum allowed limit for activity queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for activity queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for activity endpoint
#[derive(Debug, Deserialize)]
pub struct ActivityQueryParams {
    /// Filter by target ID
    pub target_id: Option<String>,
    /// Filter by campaign run ID
    pub campaign_id: Option<String>,
    /// Filter by record kind (e.g. "call_ended", "status_changed")
    pub kind: Option<String>,
    /// Filter records after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter records before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for activity query endpoint
#[derive(Debug, Serialize)]
pub struct ActivityQueryResponse {
    pub records: Vec<ActivityRecord>,
    /// Total number of matching records
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct ActivityErrorResponse {
    pub error: String,
}

/// Query the activity log
pub async fn query_activity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityQueryParams>,
) -> Result<Json<ActivityQueryResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    // Base filter is shared between query and count
    let mut base_filter = ActivityFilter::new();

    if let Some(ref target_id) = params.target_id {
        base_filter = base_filter.with_target_id(target_id);
    }

    if let Some(ref campaign_id) = params.campaign_id {
        base_filter = base_filter.with_campaign_id(campaign_id);
    }

    if let Some(ref kind) = params.kind {
        base_filter = base_filter.with_kind(kind);
    }

    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = base_filter
        .clone()
        .with_limit(limit)
        .with_offset(offset);

    let records = match state.activity_store().query(&query_filter) {
        Ok(records) => records,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActivityErrorResponse {
                    error: format!("Failed to query activity records: {}", e),
                }),
            ));
        }
    };

    let total = match state.activity_store().count(&base_filter) {
        Ok(count) => count,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ActivityErrorResponse {
                    error: format!("Failed to count activity records: {}", e),
                }),
            ));
        }
    };

    Ok(Json(ActivityQueryResponse {
        records,
        total,
        limit,
        offset,
    }))
}
