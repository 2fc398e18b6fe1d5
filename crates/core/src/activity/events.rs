use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::Disposition;
use crate::telephony::TerminationReason;

/// What an activity record describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    /// A call reached its terminal state.
    CallEnded {
        reason: TerminationReason,
        duration_secs: u64,
    },
    /// The operator assigned a disposition.
    StatusChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<Disposition>,
        to: Disposition,
        /// Free-form qualification data entered with the disposition.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualification: Option<serde_json::Value>,
    },
    /// The line refused to place a call.
    DialFailed { attempt: u32, error: String },
    /// The campaign moved past a target without a completed call.
    TargetSkipped { reason: String },
}

impl ActivityKind {
    /// Stable name stored alongside the record for filtering.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ActivityKind::CallEnded { .. } => "call_ended",
            ActivityKind::StatusChanged { .. } => "status_changed",
            ActivityKind::DialFailed { .. } => "dial_failed",
            ActivityKind::TargetSkipped { .. } => "target_skipped",
        }
    }

    /// Call duration, for kinds that carry one.
    pub fn duration_secs(&self) -> Option<u64> {
        match self {
            ActivityKind::CallEnded { duration_secs, .. } => Some(*duration_secs),
            _ => None,
        }
    }
}

/// Immutable, append-only log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Assigned by the store on insert.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub target_id: String,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
