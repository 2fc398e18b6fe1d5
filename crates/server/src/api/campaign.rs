//! Campaign API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use dialer_core::{
    CallTarget, CampaignError, CampaignState, DispositionEffect, DispositionOutcome, QueueError,
    QueueView, SessionError, TargetFilter,
};

use crate::state::AppState;

/// Most stored targets a campaign started without an explicit list will dial.
const MAX_STORED_TARGETS: i64 = 10_000;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a campaign.
#[derive(Debug, Default, Deserialize)]
pub struct StartCampaignRequest {
    /// Targets to dial, in order. When omitted, every stored target without
    /// a disposition is dialed in insertion order.
    #[serde(default)]
    pub targets: Option<Vec<CallTarget>>,
}

/// Request body for recording a disposition.
#[derive(Debug, Deserialize)]
pub struct DispositionRequest {
    pub target_id: String,
    #[serde(flatten)]
    pub outcome: DispositionOutcome,
    /// "Confirm and continue": lets a qualified lead advance immediately.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct DispositionResponse {
    pub effect: DispositionEffect,
    pub state: CampaignState,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct CampaignErrorResponse {
    pub error: String,
}

fn error_status(err: &CampaignError) -> StatusCode {
    match err {
        CampaignError::Queue(QueueError::EmptyQueue) => StatusCode::BAD_REQUEST,
        CampaignError::Queue(QueueError::TargetNotFound(_)) => StatusCode::NOT_FOUND,
        CampaignError::Queue(QueueError::InvariantViolation { .. }) => StatusCode::CONFLICT,
        CampaignError::Session(SessionError::LineUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        CampaignError::Session(SessionError::DialFailed(_)) => StatusCode::SERVICE_UNAVAILABLE,
        CampaignError::AlreadyRunning => StatusCode::CONFLICT,
        CampaignError::NotRunning => StatusCode::CONFLICT,
        CampaignError::TargetNotInQueue(_) => StatusCode::NOT_FOUND,
        CampaignError::NotYetDialed(_) => StatusCode::CONFLICT,
        CampaignError::NotParked => StatusCode::CONFLICT,
        CampaignError::LineEventsLost(_) => StatusCode::SERVICE_UNAVAILABLE,
        CampaignError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: CampaignError) -> (StatusCode, Json<CampaignErrorResponse>) {
    (
        error_status(&err),
        Json(CampaignErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a campaign over the given (or stored) targets
pub async fn start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartCampaignRequest>>,
) -> Result<Json<CampaignState>, impl IntoResponse> {
    let Json(request) = body.unwrap_or_default();

    let targets = match request.targets {
        Some(targets) => targets,
        None => {
            let filter = TargetFilter::new()
                .with_status(None)
                .with_limit(MAX_STORED_TARGETS);
            match state.target_store().list(&filter) {
                Ok(targets) => targets,
                Err(e) => {
                    return Err((
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(CampaignErrorResponse {
                            error: format!("Failed to load stored targets: {}", e),
                        }),
                    ));
                }
            }
        }
    };

    info!("Starting campaign with {} supplied targets", targets.len());
    state
        .controller()
        .start(targets)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Stop the campaign (idempotent)
pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CampaignState>, impl IntoResponse> {
    state
        .controller()
        .stop()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Get the latest campaign state
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<CampaignState> {
    Json(state.controller().status())
}

/// Get history, active item and upcoming items of the running campaign
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueView>, impl IntoResponse> {
    state
        .controller()
        .queue_view()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Record an operator disposition
pub async fn record_disposition(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispositionRequest>,
) -> Result<Json<DispositionResponse>, (StatusCode, Json<CampaignErrorResponse>)> {
    let controller = state.controller();
    let effect = controller
        .record_disposition(request.target_id, request.outcome, request.confirm)
        .await
        .map_err(error_response)?;

    Ok(Json(DispositionResponse {
        effect,
        state: controller.status(),
    }))
}

/// Release a campaign parked on a qualified lead
pub async fn confirm(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CampaignState>, impl IntoResponse> {
    state
        .controller()
        .confirm()
        .await
        .map(Json)
        .map_err(error_response)
}
