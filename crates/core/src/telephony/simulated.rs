//! Simulated telephony line.
//!
//! Plays a fixed script for every call (ring, answer or reject, talk, hang up)
//! so the dialer can run end to end without a SIP stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::types::{LineCallId, LineEvent, LineEventKind, TelephonyError, TelephonyLine};

/// Capacity of the line event channel.
pub(crate) const EVENT_BUFFER: usize = 64;

/// How a scripted call ends once it stops ringing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Answer { talk: Duration },
    Reject { reason: String },
    Fail { reason: String },
}

/// Timeline a scripted call follows after the invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallScript {
    pub ring: Duration,
    pub outcome: ScriptedOutcome,
}

impl CallScript {
    pub fn answer(ring: Duration, talk: Duration) -> Self {
        Self {
            ring,
            outcome: ScriptedOutcome::Answer { talk },
        }
    }

    pub fn reject(ring: Duration, reason: impl Into<String>) -> Self {
        Self {
            ring,
            outcome: ScriptedOutcome::Reject {
                reason: reason.into(),
            },
        }
    }
}

/// Emit the script's events for `call_id` on `tx`.
pub(crate) fn spawn_script(
    tx: broadcast::Sender<LineEvent>,
    call_id: LineCallId,
    script: CallScript,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let emit = |kind: LineEventKind| {
            // No receivers just means nobody is listening yet.
            let _ = tx.send(LineEvent::new(call_id.clone(), kind));
        };

        emit(LineEventKind::Progress);
        tokio::time::sleep(script.ring).await;

        match script.outcome {
            ScriptedOutcome::Answer { talk } => {
                emit(LineEventKind::Accepted);
                tokio::time::sleep(talk).await;
                emit(LineEventKind::Terminated);
            }
            ScriptedOutcome::Reject { reason } => emit(LineEventKind::Rejected { reason }),
            ScriptedOutcome::Fail { reason } => emit(LineEventKind::Failed { reason }),
        }
    })
}

/// Configuration for the simulated line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedLineConfig {
    /// How long each call rings (milliseconds).
    #[serde(default = "default_ring_ms")]
    pub ring_ms: u64,

    /// How long an answered call lasts (milliseconds).
    #[serde(default = "default_talk_ms")]
    pub talk_ms: u64,

    /// Whether calls are answered or rejected after ringing.
    #[serde(default = "default_answer")]
    pub answer: bool,
}

fn default_ring_ms() -> u64 {
    2000
}

fn default_talk_ms() -> u64 {
    10_000
}

fn default_answer() -> bool {
    true
}

impl Default for SimulatedLineConfig {
    fn default() -> Self {
        Self {
            ring_ms: default_ring_ms(),
            talk_ms: default_talk_ms(),
            answer: default_answer(),
        }
    }
}

impl SimulatedLineConfig {
    fn script(&self) -> CallScript {
        let ring = Duration::from_millis(self.ring_ms);
        if self.answer {
            CallScript::answer(ring, Duration::from_millis(self.talk_ms))
        } else {
            CallScript::reject(ring, "480 Temporarily Unavailable")
        }
    }
}

/// A line that plays the configured script for every call.
pub struct SimulatedLine {
    config: SimulatedLineConfig,
    registered: AtomicBool,
    call_counter: AtomicU64,
    calls: Mutex<HashMap<LineCallId, JoinHandle<()>>>,
    events: broadcast::Sender<LineEvent>,
}

impl SimulatedLine {
    pub fn new(config: SimulatedLineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            config,
            registered: AtomicBool::new(false),
            call_counter: AtomicU64::new(0),
            calls: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn end_call(&self, call_id: &LineCallId) -> Result<(), TelephonyError> {
        let task = self
            .calls
            .lock()
            .unwrap()
            .remove(call_id)
            .ok_or_else(|| TelephonyError::UnknownCall(call_id.to_string()))?;
        task.abort();
        let _ = self
            .events
            .send(LineEvent::new(call_id.clone(), LineEventKind::Terminated));
        Ok(())
    }
}

#[async_trait]
impl TelephonyLine for SimulatedLine {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn register(&self) -> Result<(), TelephonyError> {
        self.registered.store(true, Ordering::SeqCst);
        info!("Simulated line registered");
        Ok(())
    }

    async fn unregister(&self) -> Result<(), TelephonyError> {
        self.registered.store(false, Ordering::SeqCst);
        for (_, task) in self.calls.lock().unwrap().drain() {
            task.abort();
        }
        info!("Simulated line unregistered");
        Ok(())
    }

    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn invite(&self, number: &str) -> Result<LineCallId, TelephonyError> {
        if !self.is_registered() {
            return Err(TelephonyError::NotRegistered);
        }
        let n = self.call_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let call_id = LineCallId(format!("sim-{:06}", n));
        debug!("Simulated invite {} -> {}", call_id, number);

        let task = spawn_script(self.events.clone(), call_id.clone(), self.config.script());
        let mut calls = self.calls.lock().unwrap();
        calls.retain(|_, t| !t.is_finished());
        calls.insert(call_id.clone(), task);
        Ok(call_id)
    }

    async fn cancel(&self, call_id: &LineCallId) -> Result<(), TelephonyError> {
        self.end_call(call_id)
    }

    async fn hangup(&self, call_id: &LineCallId) -> Result<(), TelephonyError> {
        self.end_call(call_id)
    }

    fn subscribe(&self) -> broadcast::Receiver<LineEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulatedLineConfig::default();
        assert_eq!(config.ring_ms, 2000);
        assert_eq!(config.talk_ms, 10_000);
        assert!(config.answer);
    }

    #[tokio::test]
    async fn test_invite_requires_registration() {
        let line = SimulatedLine::new(SimulatedLineConfig::default());
        assert_eq!(
            line.invite("5550100").await.unwrap_err(),
            TelephonyError::NotRegistered
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_answered_script_plays_in_order() {
        let line = SimulatedLine::new(SimulatedLineConfig {
            ring_ms: 100,
            talk_ms: 500,
            answer: true,
        });
        line.register().await.unwrap();
        let mut rx = line.subscribe();

        let call_id = line.invite("5550100").await.unwrap();

        let kinds: Vec<LineEventKind> = vec![
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
        ];
        assert_eq!(
            kinds,
            vec![
                LineEventKind::Progress,
                LineEventKind::Accepted,
                LineEventKind::Terminated
            ]
        );
        assert_eq!(call_id.0, "sim-000001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejecting_script() {
        let line = SimulatedLine::new(SimulatedLineConfig {
            ring_ms: 100,
            talk_ms: 500,
            answer: false,
        });
        line.register().await.unwrap();
        let mut rx = line.subscribe();

        line.invite("5550100").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, LineEventKind::Progress);
        assert!(matches!(
            rx.recv().await.unwrap().kind,
            LineEventKind::Rejected { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hangup_stops_script() {
        let line = SimulatedLine::new(SimulatedLineConfig {
            ring_ms: 100,
            talk_ms: 60_000,
            answer: true,
        });
        line.register().await.unwrap();
        let mut rx = line.subscribe();

        let call_id = line.invite("5550100").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, LineEventKind::Progress);
        assert_eq!(rx.recv().await.unwrap().kind, LineEventKind::Accepted);

        line.hangup(&call_id).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, LineEventKind::Terminated);
        assert!(matches!(
            line.hangup(&call_id).await,
            Err(TelephonyError::UnknownCall(_))
        ));
    }
}
