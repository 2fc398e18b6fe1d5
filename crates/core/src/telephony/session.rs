//! Call session controller: the sole adapter between the campaign and the line.
//!
//! Owns the single active call. Raw line events are filtered to that call and
//! turned into a typed lifecycle stream; calls ended locally get their
//! terminal event synthesized here so late line events for them are ignored.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::queue::CallTarget;

use super::types::{LineCallId, LineEvent, LineEventKind, TelephonyError, TelephonyLine};

/// Errors from the session façade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A call is already active or the line is not registered.
    #[error("line unavailable: {0}")]
    LineUnavailable(String),

    /// The line refused to place the call.
    #[error("dial failed: {0}")]
    DialFailed(String),
}

/// Lifecycle of the one call the controller may hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallLifecycleState {
    #[default]
    Idle,
    Dialing,
    Ringing,
    Connected,
    Terminating,
    Terminated,
}

impl CallLifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallLifecycleState::Idle => "idle",
            CallLifecycleState::Dialing => "dialing",
            CallLifecycleState::Ringing => "ringing",
            CallLifecycleState::Connected => "connected",
            CallLifecycleState::Terminating => "terminating",
            CallLifecycleState::Terminated => "terminated",
        }
    }
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Answered call ended by either side.
    Completed,
    /// Remote declined or never answered.
    Rejected,
    /// Signalling or transport failure.
    Failed,
    /// Abandoned locally before the remote answered.
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "completed",
            TerminationReason::Rejected => "rejected",
            TerminationReason::Failed => "failed",
            TerminationReason::Cancelled => "cancelled",
        }
    }
}

/// Proof of the single live call. Only this module can mint one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    id: u64,
    target_id: String,
    number: String,
    started_at: DateTime<Utc>,
}

impl CallHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Typed lifecycle event for the active call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEventKind {
    Ringing,
    Connected,
    Terminated {
        reason: TerminationReason,
        /// Talk time; zero when the call was never answered.
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub handle: CallHandle,
    pub kind: CallEventKind,
}

impl CallEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, CallEventKind::Terminated { .. })
    }
}

struct ActiveCall {
    handle: CallHandle,
    line_call_id: LineCallId,
    state: CallLifecycleState,
    connected_at: Option<Instant>,
}

impl ActiveCall {
    fn talk_time(&self) -> Duration {
        self.connected_at
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

/// Façade over the telephony line holding at most one call.
pub struct CallSessionController {
    line: Arc<dyn TelephonyLine>,
    active: Option<ActiveCall>,
    next_handle_id: u64,
}

impl CallSessionController {
    pub fn new(line: Arc<dyn TelephonyLine>) -> Self {
        Self {
            line,
            active: None,
            next_handle_id: 1,
        }
    }

    pub fn line_name(&self) -> &str {
        self.line.name()
    }

    /// Subscribe to the raw line events this controller interprets.
    pub fn subscribe(&self) -> broadcast::Receiver<LineEvent> {
        self.line.subscribe()
    }

    /// Register the line if it is not registered yet.
    pub async fn ensure_registered(&self) -> Result<(), SessionError> {
        if self.line.is_registered() {
            return Ok(());
        }
        info!("Registering telephony line {}", self.line.name());
        self.line
            .register()
            .await
            .map_err(|e| SessionError::LineUnavailable(e.to_string()))
    }

    pub fn state(&self) -> CallLifecycleState {
        self.active
            .as_ref()
            .map(|call| call.state)
            .unwrap_or(CallLifecycleState::Idle)
    }

    pub fn active_handle(&self) -> Option<&CallHandle> {
        self.active.as_ref().map(|call| &call.handle)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Place a call to `target`.
    pub async fn dial(&mut self, target: &CallTarget) -> Result<CallHandle, SessionError> {
        if let Some(call) = &self.active {
            error!(
                "Dial of {} requested while call {} to {} is still active",
                target.id,
                call.handle.id,
                call.handle.target_id
            );
            return Err(SessionError::LineUnavailable(
                "a call is already active".to_string(),
            ));
        }

        if !self.line.is_registered() {
            return Err(SessionError::LineUnavailable(
                TelephonyError::NotRegistered.to_string(),
            ));
        }

        let number = target.dialable_number().ok_or_else(|| {
            SessionError::DialFailed(format!("target {} has no dialable number", target.id))
        })?;

        let line_call_id = self.line.invite(&number).await.map_err(|e| match e {
            TelephonyError::NotRegistered => SessionError::LineUnavailable(e.to_string()),
            other => SessionError::DialFailed(other.to_string()),
        })?;

        let handle = CallHandle {
            id: self.next_handle_id,
            target_id: target.id.clone(),
            number,
            started_at: Utc::now(),
        };
        self.next_handle_id += 1;

        info!(
            "Dialing {} ({}) as call {} [line call {}]",
            handle.target_id, handle.number, handle.id, line_call_id
        );

        self.active = Some(ActiveCall {
            handle: handle.clone(),
            line_call_id,
            state: CallLifecycleState::Dialing,
            connected_at: None,
        });

        Ok(handle)
    }

    /// End the call identified by `handle`.
    ///
    /// Cancels an unanswered call and hangs up an answered one. Returns the
    /// terminal event for the call, or `None` if `handle` is not the live call.
    pub async fn terminate(&mut self, handle: &CallHandle) -> Option<CallEvent> {
        let call = match self.active.as_mut() {
            Some(call) if call.handle.id == handle.id => call,
            _ => {
                debug!("Terminate for call {} ignored: not the active call", handle.id);
                return None;
            }
        };

        let established = call.state == CallLifecycleState::Connected;
        call.state = CallLifecycleState::Terminating;
        let line_call_id = call.line_call_id.clone();

        let result = if established {
            self.line.hangup(&line_call_id).await
        } else {
            self.line.cancel(&line_call_id).await
        };
        if let Err(e) = result {
            warn!("Line failed to end call {}: {}", handle.id, e);
        }

        let reason = if established {
            TerminationReason::Completed
        } else {
            TerminationReason::Cancelled
        };
        self.finish(reason)
    }

    /// Interpret a raw line event. Events for calls other than the active one
    /// are dropped.
    pub fn handle_line_event(&mut self, event: LineEvent) -> Option<CallEvent> {
        let Some(call) = self.active.as_mut() else {
            debug!("Line event {} for {} with no active call", event.kind.as_str(), event.call_id);
            return None;
        };
        if call.line_call_id != event.call_id {
            debug!(
                "Ignoring stale line event {} for {}",
                event.kind.as_str(),
                event.call_id
            );
            return None;
        }

        match event.kind {
            LineEventKind::Progress => {
                if call.state != CallLifecycleState::Dialing {
                    return None;
                }
                call.state = CallLifecycleState::Ringing;
                Some(CallEvent {
                    handle: call.handle.clone(),
                    kind: CallEventKind::Ringing,
                })
            }
            LineEventKind::Accepted => {
                if !matches!(
                    call.state,
                    CallLifecycleState::Dialing | CallLifecycleState::Ringing
                ) {
                    return None;
                }
                call.state = CallLifecycleState::Connected;
                call.connected_at = Some(Instant::now());
                Some(CallEvent {
                    handle: call.handle.clone(),
                    kind: CallEventKind::Connected,
                })
            }
            LineEventKind::Rejected { reason } => {
                debug!("Call {} rejected: {}", call.handle.id, reason);
                self.finish(TerminationReason::Rejected)
            }
            LineEventKind::Failed { reason } => {
                warn!("Call {} failed: {}", call.handle.id, reason);
                self.finish(TerminationReason::Failed)
            }
            LineEventKind::Terminated => {
                let reason = if call.connected_at.is_some() {
                    TerminationReason::Completed
                } else {
                    TerminationReason::Rejected
                };
                self.finish(reason)
            }
        }
    }

    /// Drop the active call and produce its terminal event.
    fn finish(&mut self, reason: TerminationReason) -> Option<CallEvent> {
        let mut call = self.active.take()?;
        call.state = CallLifecycleState::Terminated;
        let duration = call.talk_time();
        info!(
            "Call {} to {} ended: {} after {}s",
            call.handle.id,
            call.handle.target_id,
            reason.as_str(),
            duration.as_secs()
        );
        Some(CallEvent {
            handle: call.handle,
            kind: CallEventKind::Terminated { reason, duration },
        })
    }
}
