//! Types for the campaign controller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::{Disposition, QueueError};
use crate::telephony::{CallLifecycleState, SessionError};

/// Errors returned by campaign commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CampaignError {
    /// Queue snapshot error (empty queue or invariant violation).
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Call session error.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("a campaign is already running")]
    AlreadyRunning,

    #[error("no campaign is running")]
    NotRunning,

    /// Target is not part of the running campaign.
    #[error("target not in queue: {0}")]
    TargetNotInQueue(String),

    /// Target is further down the queue and has not been dialed yet.
    #[error("target not dialed yet: {0}")]
    NotYetDialed(String),

    #[error("campaign is not parked on a qualified lead")]
    NotParked,

    /// The engine fell behind the line's event stream while a call was live.
    #[error("telephony line events lost: {0} missed")]
    LineEventsLost(u64),

    /// The campaign engine has shut down.
    #[error("campaign engine is shut down")]
    Shutdown,
}

/// Lifecycle of one campaign run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Idle,
    Running,
    /// The run ended on its own (queue exhausted or aborted).
    Stopped,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Idle => "idle",
            CampaignStatus::Running => "running",
            CampaignStatus::Stopped => "stopped",
        }
    }
}

/// Read-only projection of the campaign for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignState {
    pub status: CampaignStatus,
    /// Id of the current (or most recent) run.
    pub campaign_id: Option<String>,
    /// Index of the engaged target. Equals `length` once the queue is exhausted.
    pub cursor: usize,
    pub length: usize,
    pub current_call_state: CallLifecycleState,
    /// Target at the cursor, if any.
    pub current_target_id: Option<String>,
    /// Automatic advancement is suspended on a qualified lead.
    pub parked: bool,
    /// Error that aborted the last run.
    pub last_error: Option<String>,
}

impl CampaignState {
    pub fn is_running(&self) -> bool {
        self.status == CampaignStatus::Running
    }
}

/// An operator's judgment on a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionOutcome {
    pub category: Disposition,
    #[serde(default)]
    pub notes: Option<String>,
    /// Free-form qualification data, passed through to the activity log.
    #[serde(default)]
    pub qualification: Option<serde_json::Value>,
}

impl DispositionOutcome {
    pub fn new(category: Disposition) -> Self {
        Self {
            category,
            notes: None,
            qualification: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_qualification(mut self, qualification: serde_json::Value) -> Self {
        self.qualification = Some(qualification);
        self
    }
}

/// What recording a disposition did to the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionEffect {
    /// The call was ended and the campaign moved on.
    Advanced,
    /// Automatic advancement is suspended until confirmed.
    Parked,
    /// Only the status change was recorded.
    Recorded,
}
