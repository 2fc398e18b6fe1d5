//! Mock telephony line for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::telephony::{
    spawn_script, CallScript, LineCallId, LineEvent, LineEventKind, TelephonyError, TelephonyLine,
    EVENT_BUFFER,
};

/// A recorded invite for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvite {
    /// The number that was dialed.
    pub number: String,
    /// The call id handed back to the caller.
    pub call_id: LineCallId,
    /// When the invite was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the TelephonyLine trait.
///
/// Provides controllable behavior for testing:
/// - Track invites, cancels and hangups for assertions
/// - Drive call events by hand or with per-call scripts
/// - Simulate invite and registration failures
///
/// # Example
///
/// ```rust,ignore
/// let line = MockTelephonyLine::new();
/// line.register().await?;
///
/// // Every call rings for 1s, then talks for 5s.
/// line.set_default_script(Some(CallScript::answer(secs(1), secs(5)))).await;
///
/// // Or drive the last call by hand.
/// let call_id = line.last_call_id().await.unwrap();
/// line.emit(&call_id, LineEventKind::Accepted);
/// ```
pub struct MockTelephonyLine {
    registered: AtomicBool,
    /// Fail the next `register` call.
    fail_register: AtomicBool,
    /// Number of upcoming invites that will fail.
    invite_failures: Arc<RwLock<u32>>,
    invites: Arc<RwLock<Vec<RecordedInvite>>>,
    cancelled: Arc<RwLock<Vec<LineCallId>>>,
    hung_up: Arc<RwLock<Vec<LineCallId>>>,
    /// Scripts consumed one per invite, before the default script.
    queued_scripts: Arc<RwLock<VecDeque<CallScript>>>,
    default_script: Arc<RwLock<Option<CallScript>>>,
    running: Arc<RwLock<HashMap<LineCallId, JoinHandle<()>>>>,
    events: broadcast::Sender<LineEvent>,
}

impl Default for MockTelephonyLine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTelephonyLine {
    /// Create an unregistered mock line with no scripts.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            registered: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            invite_failures: Arc::new(RwLock::new(0)),
            invites: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            hung_up: Arc::new(RwLock::new(Vec::new())),
            queued_scripts: Arc::new(RwLock::new(VecDeque::new())),
            default_script: Arc::new(RwLock::new(None)),
            running: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Make the next `register` call fail.
    pub fn fail_next_register(&self) {
        self.fail_register.store(true, Ordering::SeqCst);
    }

    /// Make the next `count` invites fail.
    pub async fn fail_next_invites(&self, count: u32) {
        *self.invite_failures.write().await = count;
    }

    /// Script played by every call without a queued script. `None` means
    /// calls only progress when the test emits events by hand.
    pub async fn set_default_script(&self, script: Option<CallScript>) {
        *self.default_script.write().await = script;
    }

    /// Queue a script for the next unscripted invite.
    pub async fn push_script(&self, script: CallScript) {
        self.queued_scripts.write().await.push_back(script);
    }

    /// Emit an event for `call_id` as if the line produced it.
    pub fn emit(&self, call_id: &LineCallId, kind: LineEventKind) {
        let _ = self.events.send(LineEvent::new(call_id.clone(), kind));
    }

    /// All recorded invites.
    pub async fn invites(&self) -> Vec<RecordedInvite> {
        self.invites.read().await.clone()
    }

    /// Dialed numbers in order.
    pub async fn dialed_numbers(&self) -> Vec<String> {
        self.invites
            .read()
            .await
            .iter()
            .map(|i| i.number.clone())
            .collect()
    }

    pub async fn invite_count(&self) -> usize {
        self.invites.read().await.len()
    }

    pub async fn last_call_id(&self) -> Option<LineCallId> {
        self.invites.read().await.last().map(|i| i.call_id.clone())
    }

    pub async fn cancelled(&self) -> Vec<LineCallId> {
        self.cancelled.read().await.clone()
    }

    pub async fn hung_up(&self) -> Vec<LineCallId> {
        self.hung_up.read().await.clone()
    }

    async fn stop_script(&self, call_id: &LineCallId) {
        if let Some(task) = self.running.write().await.remove(call_id) {
            task.abort();
        }
    }

    async fn next_script(&self) -> Option<CallScript> {
        if let Some(script) = self.queued_scripts.write().await.pop_front() {
            return Some(script);
        }
        self.default_script.read().await.clone()
    }
}

#[async_trait]
impl TelephonyLine for MockTelephonyLine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn register(&self) -> Result<(), TelephonyError> {
        if self.fail_register.swap(false, Ordering::SeqCst) {
            return Err(TelephonyError::RegistrationFailed(
                "mock registration failure".to_string(),
            ));
        }
        self.registered.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unregister(&self) -> Result<(), TelephonyError> {
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    async fn invite(&self, number: &str) -> Result<LineCallId, TelephonyError> {
        if !self.is_registered() {
            return Err(TelephonyError::NotRegistered);
        }

        {
            let mut failures = self.invite_failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(TelephonyError::InviteFailed(
                    "503 Service Unavailable".to_string(),
                ));
            }
        }

        let call_id = {
            let mut invites = self.invites.write().await;
            let call_id = LineCallId(format!("mock-call-{}", invites.len() + 1));
            invites.push(RecordedInvite {
                number: number.to_string(),
                call_id: call_id.clone(),
                timestamp: Utc::now(),
            });
            call_id
        };

        if let Some(script) = self.next_script().await {
            let task = spawn_script(self.events.clone(), call_id.clone(), script);
            self.running.write().await.insert(call_id.clone(), task);
        }

        Ok(call_id)
    }

    async fn cancel(&self, call_id: &LineCallId) -> Result<(), TelephonyError> {
        self.stop_script(call_id).await;
        self.cancelled.write().await.push(call_id.clone());
        self.emit(call_id, LineEventKind::Terminated);
        Ok(())
    }

    async fn hangup(&self, call_id: &LineCallId) -> Result<(), TelephonyError> {
        self.stop_script(call_id).await;
        self.hung_up.write().await.push(call_id.clone());
        self.emit(call_id, LineEventKind::Terminated);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LineEvent> {
        self.events.subscribe()
    }
}
