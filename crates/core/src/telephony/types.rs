//! Telephony line collaborator contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelephonyError {
    #[error("Line not registered")]
    NotRegistered,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Invite failed: {0}")]
    InviteFailed(String),

    #[error("Unknown call: {0}")]
    UnknownCall(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Identifier the line assigns to a call it placed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineCallId(pub String);

impl std::fmt::Display for LineCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw event kinds emitted by the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineEventKind {
    /// Provisional response (remote is ringing).
    Progress,
    /// Remote answered.
    Accepted,
    /// Remote declined or did not answer.
    Rejected { reason: String },
    /// Transport or signalling failure.
    Failed { reason: String },
    /// Established call ended.
    Terminated,
}

impl LineEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEventKind::Progress => "progress",
            LineEventKind::Accepted => "accepted",
            LineEventKind::Rejected { .. } => "rejected",
            LineEventKind::Failed { .. } => "failed",
            LineEventKind::Terminated => "terminated",
        }
    }
}

/// One event from the line's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEvent {
    pub call_id: LineCallId,
    pub kind: LineEventKind,
}

impl LineEvent {
    pub fn new(call_id: LineCallId, kind: LineEventKind) -> Self {
        Self { call_id, kind }
    }
}

/// A registered outbound line. Only the call session controller talks to it.
#[async_trait]
pub trait TelephonyLine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn register(&self) -> Result<(), TelephonyError>;

    async fn unregister(&self) -> Result<(), TelephonyError>;

    fn is_registered(&self) -> bool;

    /// Place an outbound call. Progress arrives on the event stream.
    async fn invite(&self, number: &str) -> Result<LineCallId, TelephonyError>;

    /// Abandon a call that has not been answered yet.
    async fn cancel(&self, call_id: &LineCallId) -> Result<(), TelephonyError>;

    /// End an established call.
    async fn hangup(&self, call_id: &LineCallId) -> Result<(), TelephonyError>;

    /// Subscribe to the line's event stream.
    fn subscribe(&self) -> broadcast::Receiver<LineEvent>;
}
