//! Read-only access to stored call targets.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dialer_core::{CallTarget, Disposition, TargetFilter};

use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct TargetQueryParams {
    /// Disposition name, or "none" for targets never dispositioned.
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TargetListResponse {
    pub targets: Vec<CallTarget>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct TargetErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: String) -> (StatusCode, Json<TargetErrorResponse>) {
    (status, Json(TargetErrorResponse { error: message }))
}

/// List stored targets
pub async fn list_targets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TargetQueryParams>,
) -> Result<Json<TargetListResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TargetFilter::new().with_limit(limit).with_offset(offset);
    match params.status.as_deref() {
        None => {}
        Some("none") => filter = filter.with_status(None),
        Some(name) => match Disposition::parse(name) {
            Some(status) => filter = filter.with_status(Some(status)),
            None => {
                return Err(error(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown status: {}", name),
                ));
            }
        },
    }

    match state.target_store().list(&filter) {
        Ok(targets) => Ok(Json(TargetListResponse {
            targets,
            limit,
            offset,
        })),
        Err(e) => Err(error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list targets: {}", e),
        )),
    }
}

/// Get one stored target
pub async fn get_target(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CallTarget>, impl IntoResponse> {
    match state.target_store().get(&id) {
        Ok(Some(target)) => Ok(Json(target)),
        Ok(None) => Err(error(
            StatusCode::NOT_FOUND,
            format!("Target not found: {}", id),
        )),
        Err(e) => Err(error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to load target: {}", e),
        )),
    }
}
