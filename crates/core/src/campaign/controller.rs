//! Campaign controller and the engine task behind it.
//!
//! The engine is a single task that owns the queue snapshot, the call session,
//! the advancement coordinator and the recorder. Commands, line events and the
//! coordinator's one pending timer are all handled on that task, one at a time,
//! so no two handlers ever interleave. The [`CampaignController`] handle only
//! sends commands and reads the published [`CampaignState`].

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityKind, DispositionRecorder};
use crate::metrics::{
    ADVANCES, CALLS_ENDED, CALL_DURATION, CAMPAIGNS, DIALS, DISPOSITIONS, TARGETS_SKIPPED,
};
use crate::queue::{CallTarget, Disposition, QueueError, QueueSnapshot, QueueView};
use crate::targets::{StatusWrite, TargetStore};
use crate::telephony::{CallEvent, CallEventKind, CallSessionController, LineEvent, SessionError};

use super::config::CampaignConfig;
use super::coordinator::{
    AdvanceTrigger, AdvancementCoordinator, DialFailureAction, DispositionDecision, TimerAction,
};
use super::types::{
    CampaignError, CampaignState, CampaignStatus, DispositionEffect, DispositionOutcome,
};

const COMMAND_BUFFER: usize = 32;

enum Command {
    Start {
        targets: Vec<CallTarget>,
        reply: oneshot::Sender<Result<CampaignState, CampaignError>>,
    },
    Stop {
        reply: oneshot::Sender<CampaignState>,
    },
    Disposition {
        target_id: String,
        outcome: DispositionOutcome,
        confirm: bool,
        reply: oneshot::Sender<Result<DispositionEffect, CampaignError>>,
    },
    Confirm {
        reply: oneshot::Sender<Result<CampaignState, CampaignError>>,
    },
    Queue {
        reply: oneshot::Sender<QueueView>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a campaign engine. Cheap to clone.
#[derive(Clone)]
pub struct CampaignController {
    tx: mpsc::Sender<Command>,
    state: watch::Receiver<CampaignState>,
}

impl CampaignController {
    /// Create the engine and spawn it on the current runtime.
    pub fn spawn(
        config: CampaignConfig,
        session: CallSessionController,
        recorder: DispositionRecorder,
        target_store: Option<Arc<dyn TargetStore>>,
    ) -> Self {
        let (controller, engine) = create_campaign(config, session, recorder, target_store);
        tokio::spawn(engine.run());
        controller
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CampaignError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CampaignError::Shutdown)?;
        rx.await.map_err(|_| CampaignError::Shutdown)
    }

    /// Build a fresh queue from `targets` and dial the first one.
    pub async fn start(&self, targets: Vec<CallTarget>) -> Result<CampaignState, CampaignError> {
        self.request(|reply| Command::Start { targets, reply }).await?
    }

    /// Stop the campaign from any state. Idempotent.
    pub async fn stop(&self) -> Result<CampaignState, CampaignError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Record an operator disposition for `target_id`.
    ///
    /// `confirm` marks the "confirm and continue" gesture, which lets a
    /// qualified lead advance instead of parking.
    pub async fn record_disposition(
        &self,
        target_id: impl Into<String>,
        outcome: DispositionOutcome,
        confirm: bool,
    ) -> Result<DispositionEffect, CampaignError> {
        let target_id = target_id.into();
        self.request(|reply| Command::Disposition {
            target_id,
            outcome,
            confirm,
            reply,
        })
        .await?
    }

    /// Release a campaign parked on a qualified lead.
    pub async fn confirm(&self) -> Result<CampaignState, CampaignError> {
        self.request(|reply| Command::Confirm { reply }).await?
    }

    /// History, active item and upcoming items of the running campaign.
    pub async fn queue_view(&self) -> Result<QueueView, CampaignError> {
        self.request(|reply| Command::Queue { reply }).await
    }

    /// Latest published state.
    pub fn status(&self) -> CampaignState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<CampaignState> {
        self.state.clone()
    }

    /// Stop any running campaign and end the engine task.
    pub async fn shutdown(&self) -> Result<(), CampaignError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// Create a campaign system.
///
/// Returns:
/// - `CampaignController` - for issuing commands (clone this to share across tasks)
/// - `CampaignEngine` - spawn this as a background task with `tokio::spawn(engine.run())`
pub fn create_campaign(
    config: CampaignConfig,
    session: CallSessionController,
    recorder: DispositionRecorder,
    target_store: Option<Arc<dyn TargetStore>>,
) -> (CampaignController, CampaignEngine) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(CampaignState::default());

    let coordinator = AdvancementCoordinator::new(config.grace_interval(), config.settle_delay());
    let engine = CampaignEngine {
        config,
        session,
        recorder,
        target_store,
        coordinator,
        run: None,
        status: CampaignStatus::Idle,
        last_error: None,
        last_progress: Progress::default(),
        rx,
        state_tx,
    };

    (
        CampaignController {
            tx,
            state: state_rx,
        },
        engine,
    )
}

/// One campaign run.
struct Run {
    id: String,
    snapshot: QueueSnapshot,
}

/// Progress of the most recent run, kept after its snapshot is discarded.
#[derive(Debug, Clone, Default)]
struct Progress {
    campaign_id: Option<String>,
    cursor: usize,
    length: usize,
}

/// Background task that drives campaigns.
pub struct CampaignEngine {
    config: CampaignConfig,
    session: CallSessionController,
    recorder: DispositionRecorder,
    target_store: Option<Arc<dyn TargetStore>>,
    coordinator: AdvancementCoordinator,
    run: Option<Run>,
    status: CampaignStatus,
    last_error: Option<String>,
    last_progress: Progress,
    rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<CampaignState>,
}

impl CampaignEngine {
    /// Run the engine until shut down or every controller handle is dropped.
    pub async fn run(mut self) {
        info!("Campaign engine started on line {}", self.session.line_name());

        let mut line_rx = self.session.subscribe();
        let mut line_open = true;

        loop {
            let deadline = self.coordinator.next_deadline();

            tokio::select! {
                biased;

                command = self.rx.recv() => match command {
                    Some(command) => {
                        let shutdown = matches!(command, Command::Shutdown { .. });
                        self.handle_command(command).await;
                        if shutdown {
                            break;
                        }
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                event = line_rx.recv(), if line_open => match event {
                    Ok(event) => self.handle_line_event(event).await,
                    Err(RecvError::Lagged(missed)) => self.handle_line_lag(missed).await,
                    Err(RecvError::Closed) => {
                        error!("Telephony line event stream closed");
                        line_open = false;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_timer().await;
                }
            }

            self.publish();
        }

        info!("Campaign engine shutting down");
    }

    /// Handle one command. State is published before each reply.
    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { targets, reply } => {
                let result = self.start(targets).await.map(|()| self.project());
                self.publish();
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.stop().await;
                self.publish();
                let _ = reply.send(self.project());
            }
            Command::Disposition {
                target_id,
                outcome,
                confirm,
                reply,
            } => {
                let result = self.record_disposition(&target_id, outcome, confirm).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Confirm { reply } => {
                let result = self.confirm().await.map(|()| self.project());
                self.publish();
                let _ = reply.send(result);
            }
            Command::Queue { reply } => {
                let view = self
                    .run
                    .as_ref()
                    .map(|run| run.snapshot.view())
                    .unwrap_or_default();
                let _ = reply.send(view);
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    async fn start(&mut self, targets: Vec<CallTarget>) -> Result<(), CampaignError> {
        if self.run.is_some() {
            return Err(CampaignError::AlreadyRunning);
        }

        let snapshot = QueueSnapshot::build(targets)?;
        self.session.ensure_registered().await?;
        self.sync_targets(&snapshot);

        let id = Uuid::new_v4().to_string();
        info!(
            "Starting campaign {} with {} targets on line {}",
            id,
            snapshot.len(),
            self.session.line_name()
        );

        self.recorder.set_campaign(Some(id.clone()));
        self.coordinator.reset();
        self.status = CampaignStatus::Running;
        self.last_error = None;
        self.run = Some(Run { id, snapshot });
        CAMPAIGNS.with_label_values(&["started"]).inc();

        self.dial_current().await;
        Ok(())
    }

    async fn stop(&mut self) {
        self.end_active_call().await;
        self.coordinator.reset();

        if let Some(run) = self.retire_run() {
            info!(
                "Stopped campaign {} at {}/{}",
                run.id,
                run.snapshot.cursor(),
                run.snapshot.len()
            );
            CAMPAIGNS.with_label_values(&["stopped"]).inc();
        } else {
            debug!("Stop requested with no campaign running");
        }

        self.recorder.set_campaign(None);
        self.status = CampaignStatus::Idle;
    }

    async fn record_disposition(
        &mut self,
        target_id: &str,
        outcome: DispositionOutcome,
        confirm: bool,
    ) -> Result<DispositionEffect, CampaignError> {
        let run = self.run.as_ref().ok_or(CampaignError::NotRunning)?;
        let cursor = run.snapshot.cursor();
        let engaged = run
            .snapshot
            .current_item()
            .is_some_and(|t| t.id == target_id);
        let position = if engaged {
            cursor
        } else {
            run.snapshot
                .position_of(target_id)
                .ok_or_else(|| CampaignError::TargetNotInQueue(target_id.to_string()))?
        };

        if position > cursor {
            return Err(CampaignError::NotYetDialed(target_id.to_string()));
        }
        if position < cursor {
            self.apply_status(position, target_id, &outcome).await?;
            return Ok(DispositionEffect::Recorded);
        }

        match self
            .coordinator
            .on_disposition(position, outcome.category, confirm)
        {
            DispositionDecision::AdvanceNow(trigger) => {
                info!(
                    "Disposition {} for {} advances the campaign",
                    outcome.category, target_id
                );
                self.end_active_call().await;
                self.apply_status(position, target_id, &outcome).await?;
                self.advance(trigger).await;
                Ok(DispositionEffect::Advanced)
            }
            DispositionDecision::Park => {
                info!(
                    "Qualified lead {} parks the campaign until confirmed",
                    target_id
                );
                self.apply_status(position, target_id, &outcome).await?;
                Ok(DispositionEffect::Parked)
            }
            DispositionDecision::RecordOnly => {
                debug!(
                    "Disposition for {} recorded while an advance is in flight",
                    target_id
                );
                self.apply_status(position, target_id, &outcome).await?;
                Ok(DispositionEffect::Recorded)
            }
        }
    }

    async fn confirm(&mut self) -> Result<(), CampaignError> {
        let run = self.run.as_ref().ok_or(CampaignError::NotRunning)?;
        let cursor = run.snapshot.cursor();

        if !self.coordinator.confirm(cursor) {
            return Err(CampaignError::NotParked);
        }

        info!("Qualified lead at position {} confirmed", cursor);
        self.end_active_call().await;
        self.advance(AdvanceTrigger::Confirm).await;
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    async fn handle_line_event(&mut self, event: LineEvent) {
        let Some(call_event) = self.session.handle_line_event(event) else {
            return;
        };

        match &call_event.kind {
            CallEventKind::Ringing => {
                debug!("Call {} ringing", call_event.handle.id());
            }
            CallEventKind::Connected => {
                info!(
                    "Call {} to {} connected",
                    call_event.handle.id(),
                    call_event.handle.target_id()
                );
            }
            CallEventKind::Terminated { .. } => {
                self.record_call_ended(&call_event);

                let Some(run) = self.run.as_ref() else {
                    return;
                };
                let position = run.snapshot.cursor();
                let engaged = run
                    .snapshot
                    .current_item()
                    .is_some_and(|t| t.id == call_event.handle.target_id());
                if !engaged {
                    debug!(
                        "Terminated call {} does not belong to the engaged item",
                        call_event.handle.id()
                    );
                    return;
                }

                if self.coordinator.on_call_terminated(position, Instant::now()) {
                    debug!(
                        "Grace interval of {}ms armed for position {}",
                        self.config.grace_interval_ms, position
                    );
                }
            }
        }
    }

    /// Line events were dropped. The live call may have ended unseen, so a
    /// running campaign with a call up cannot trust its session any more.
    async fn handle_line_lag(&mut self, missed: u64) {
        warn!("Campaign engine missed {} line events", missed);
        if self.run.is_none() || !self.session.is_active() {
            return;
        }
        self.abort(CampaignError::LineEventsLost(missed)).await;
    }

    async fn handle_timer(&mut self) {
        let Some(run) = self.run.as_ref() else {
            self.coordinator.reset();
            return;
        };
        let cursor = run.snapshot.cursor();

        match self.coordinator.on_timer_elapsed(cursor, Instant::now()) {
            TimerAction::Advance(trigger) => self.advance(trigger).await,
            TimerAction::Dial => self.dial_current().await,
            TimerAction::Nothing => {}
        }
    }

    // =========================================================================
    // Flow
    // =========================================================================

    /// Dial the target at the cursor, or skip it if it must not be called.
    async fn dial_current(&mut self) {
        if let Err(e) = self.refresh_current() {
            self.abort(e.into()).await;
            return;
        }

        let Some(run) = self.run.as_ref() else {
            return;
        };
        let position = run.snapshot.cursor();
        let Some(target) = run.snapshot.current_item().cloned() else {
            return;
        };

        if self.config.skip_do_not_call && target.current_status == Some(Disposition::DoNotCall) {
            self.skip_current(position, &target, "do_not_call", "marked do-not-call")
                .await;
            return;
        }

        match self.session.dial(&target).await {
            Ok(handle) => {
                DIALS.with_label_values(&["issued"]).inc();
                debug!("Dial issued for position {} as call {}", position, handle.id());
                self.coordinator.on_dial_issued();
            }
            Err(e) => self.handle_dial_failure(position, &target, e).await,
        }
    }

    async fn handle_dial_failure(&mut self, position: usize, target: &CallTarget, err: SessionError) {
        let line_unavailable = matches!(err, SessionError::LineUnavailable(_));
        DIALS
            .with_label_values(&[if line_unavailable { "line_unavailable" } else { "failed" }])
            .inc();

        let action = self.coordinator.on_dial_failed(position, Instant::now());
        let attempt = match action {
            DialFailureAction::Retry => 1,
            DialFailureAction::Skip => 2,
        };

        let _ = self.recorder.record(
            &target.id,
            ActivityKind::DialFailed {
                attempt,
                error: err.to_string(),
            },
            format!("Dial attempt {} to {} failed", attempt, target.display_name),
            serde_json::json!({ "phone": target.phone }),
        );

        match action {
            DialFailureAction::Retry => {
                warn!(
                    "Dial of {} failed ({}), retrying once in {}ms",
                    target.id, err, self.config.settle_delay_ms
                );
            }
            DialFailureAction::Skip if line_unavailable => {
                self.abort(err.into()).await;
            }
            DialFailureAction::Skip => {
                self.skip_current(position, target, "dial_failed", "dial failed twice")
                    .await;
            }
        }
    }

    /// Log a skip for the target at `position` and move past it.
    async fn skip_current(&mut self, position: usize, target: &CallTarget, label: &str, reason: &str) {
        warn!("Skipping {} at position {}: {}", target.id, position, reason);
        TARGETS_SKIPPED.with_label_values(&[label]).inc();

        let _ = self.recorder.record(
            &target.id,
            ActivityKind::TargetSkipped {
                reason: reason.to_string(),
            },
            format!("Skipped {}: {}", target.display_name, reason),
            serde_json::Value::Null,
        );

        self.coordinator.begin_skip(position);
        self.advance(AdvanceTrigger::Skip).await;
    }

    /// Move the cursor once. The caller must hold the advance claim.
    async fn advance(&mut self, trigger: AdvanceTrigger) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let from = run.snapshot.cursor();
        let has_next = run.snapshot.advance();
        let cursor = run.snapshot.cursor();
        ADVANCES.with_label_values(&[trigger.as_str()]).inc();

        info!(
            "Advanced {} -> {} of {} ({})",
            from,
            cursor,
            run.snapshot.len(),
            trigger.as_str()
        );

        self.coordinator.on_advanced(has_next, cursor, Instant::now());
        if !has_next {
            self.complete();
        }
    }

    /// The queue is exhausted.
    fn complete(&mut self) {
        if let Some(run) = self.retire_run() {
            info!("Campaign {} completed: {} targets", run.id, run.snapshot.len());
        }
        CAMPAIGNS.with_label_values(&["completed"]).inc();
        self.coordinator.reset();
        self.recorder.set_campaign(None);
        self.status = CampaignStatus::Stopped;
    }

    /// A call-flow-blocking error ends the run and is surfaced in the state.
    async fn abort(&mut self, err: CampaignError) {
        error!("Aborting campaign: {}", err);
        self.end_active_call().await;
        self.coordinator.reset();
        self.retire_run();
        CAMPAIGNS.with_label_values(&["aborted"]).inc();
        self.recorder.set_campaign(None);
        self.last_error = Some(err.to_string());
        self.status = CampaignStatus::Stopped;
    }

    /// Discard the snapshot, keeping its progress for display.
    fn retire_run(&mut self) -> Option<Run> {
        let run = self.run.take()?;
        self.last_progress = Progress {
            campaign_id: Some(run.id.clone()),
            cursor: run.snapshot.cursor(),
            length: run.snapshot.len(),
        };
        Some(run)
    }

    /// Hang up or cancel the live call, if any, and log its end.
    async fn end_active_call(&mut self) {
        let Some(handle) = self.session.active_handle().cloned() else {
            return;
        };
        if let Some(event) = self.session.terminate(&handle).await {
            self.record_call_ended(&event);
        }
    }

    fn record_call_ended(&self, event: &CallEvent) {
        let CallEventKind::Terminated { reason, duration } = &event.kind else {
            return;
        };

        CALLS_ENDED.with_label_values(&[reason.as_str()]).inc();
        if !duration.is_zero() {
            CALL_DURATION
                .with_label_values(&[])
                .observe(duration.as_secs_f64());
        }

        info!(
            "Call {} to {} ended: {} after {}s",
            event.handle.id(),
            event.handle.target_id(),
            reason.as_str(),
            duration.as_secs()
        );

        let _ = self.recorder.record(
            event.handle.target_id(),
            ActivityKind::CallEnded {
                reason: *reason,
                duration_secs: duration.as_secs(),
            },
            format!("Call ended: {}", reason.as_str()),
            serde_json::json!({
                "call": event.handle.id(),
                "number": event.handle.number(),
            }),
        );
    }

    // =========================================================================
    // Targets
    // =========================================================================

    /// Write the run's targets to the target store, keeping stored statuses
    /// the caller did not override.
    fn sync_targets(&self, snapshot: &QueueSnapshot) {
        let Some(store) = &self.target_store else {
            return;
        };

        for target in snapshot.iter() {
            let merged = match store.get(&target.id) {
                Ok(Some(existing)) => CallTarget {
                    current_status: target.current_status.or(existing.current_status),
                    ..target.clone()
                },
                Ok(None) => target.clone(),
                Err(e) => {
                    warn!("Failed to read target {}: {}", target.id, e);
                    continue;
                }
            };
            if let Err(e) = store.upsert(&merged) {
                warn!("Failed to store target {}: {}", target.id, e);
            }
        }
    }

    /// Pull fresh attributes for the target at the cursor.
    fn refresh_current(&mut self) -> Result<(), QueueError> {
        let (Some(store), Some(run)) = (&self.target_store, self.run.as_mut()) else {
            return Ok(());
        };
        let position = run.snapshot.cursor();
        let Some(id) = run.snapshot.current_item().map(|t| t.id.clone()) else {
            return Ok(());
        };

        match store.get(&id) {
            Ok(Some(fresh)) => run.snapshot.refresh(position, &fresh),
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Failed to refresh target {}: {}", id, e);
                Ok(())
            }
        }
    }

    /// Patch the snapshot, write the store and log the status change.
    async fn apply_status(
        &mut self,
        position: usize,
        target_id: &str,
        outcome: &DispositionOutcome,
    ) -> Result<(), CampaignError> {
        let Some(run) = self.run.as_mut() else {
            return Err(CampaignError::NotRunning);
        };
        let previous = run.snapshot.get(position).and_then(|t| t.current_status);

        if let Err(e) = run.snapshot.patch(position, outcome.category) {
            let err = CampaignError::from(e);
            self.abort(err.clone()).await;
            return Err(err);
        }

        if let Some(store) = &self.target_store {
            match store.update_status_if_unchanged(target_id, previous, outcome.category) {
                Ok(StatusWrite::Applied) => {}
                Ok(StatusWrite::Conflict { current }) => {
                    warn!(
                        "Stored status of {} changed underneath the campaign (now {:?}); not overwritten",
                        target_id, current
                    );
                }
                Ok(StatusWrite::Missing) => {
                    if let Some(target) = run.snapshot.get(position) {
                        if let Err(e) = store.upsert(target) {
                            warn!("Failed to store target {}: {}", target_id, e);
                        }
                    }
                }
                Err(e) => warn!("Failed to store status of {}: {}", target_id, e),
            }
        }

        DISPOSITIONS
            .with_label_values(&[outcome.category.as_str()])
            .inc();

        let metadata = match &outcome.notes {
            Some(notes) => serde_json::json!({ "notes": notes }),
            None => serde_json::Value::Null,
        };
        let _ = self.recorder.record(
            target_id,
            ActivityKind::StatusChanged {
                from: previous,
                to: outcome.category,
                qualification: outcome.qualification.clone(),
            },
            format!("Status set to {}", outcome.category),
            metadata,
        );
        Ok(())
    }

    // =========================================================================
    // State
    // =========================================================================

    fn project(&self) -> CampaignState {
        let (campaign_id, cursor, length, current_target_id) = match &self.run {
            Some(run) => (
                Some(run.id.clone()),
                run.snapshot.cursor(),
                run.snapshot.len(),
                run.snapshot.current_item().map(|t| t.id.clone()),
            ),
            None => (
                self.last_progress.campaign_id.clone(),
                self.last_progress.cursor,
                self.last_progress.length,
                None,
            ),
        };

        CampaignState {
            status: self.status,
            campaign_id,
            cursor,
            length,
            current_call_state: self.session.state(),
            current_target_id,
            parked: self.coordinator.is_parked(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        let next = self.project();
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityFilter, ActivityStore, SqliteActivityStore};
    use crate::targets::SqliteTargetStore;
    use crate::telephony::TelephonyLine;
    use crate::testing::{fixtures, MockTelephonyLine};

    struct Harness {
        line: Arc<MockTelephonyLine>,
        activity: Arc<SqliteActivityStore>,
        targets: Arc<SqliteTargetStore>,
        engine: CampaignEngine,
    }

    async fn harness() -> Harness {
        let line = Arc::new(MockTelephonyLine::new());
        line.register().await.unwrap();
        let activity = Arc::new(SqliteActivityStore::in_memory().unwrap());
        let targets = Arc::new(SqliteTargetStore::in_memory().unwrap());

        let (_controller, engine) = create_campaign(
            CampaignConfig::default(),
            CallSessionController::new(Arc::clone(&line) as Arc<dyn TelephonyLine>),
            DispositionRecorder::new(Arc::clone(&activity) as Arc<dyn ActivityStore>),
            Some(Arc::clone(&targets) as Arc<dyn TargetStore>),
        );

        Harness {
            line,
            activity,
            targets,
            engine,
        }
    }

    #[tokio::test]
    async fn test_start_syncs_targets_into_store() {
        let mut h = harness().await;
        h.targets
            .upsert(&CallTarget::new("target-2", "555-0102", "Old Name").with_status(Disposition::Callback))
            .unwrap();

        h.engine.start(fixtures::targets(2)).await.unwrap();

        let stored = h.targets.get("target-2").unwrap().unwrap();
        assert_eq!(stored.display_name, "Target 2");
        assert_eq!(stored.current_status, Some(Disposition::Callback));
        assert!(h.targets.get("target-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invariant_violation_aborts_campaign() {
        let mut h = harness().await;
        h.engine.start(fixtures::targets(3)).await.unwrap();

        if let Some(run) = h.engine.run.as_mut() {
            run.snapshot.corrupt_for_test();
        }

        let err = h
            .engine
            .record_disposition("target-1", DispositionOutcome::new(Disposition::Callback), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CampaignError::Queue(QueueError::InvariantViolation { expected: 3, actual: 2 })
        ));

        let state = h.engine.project();
        assert_eq!(state.status, CampaignStatus::Stopped);
        assert!(state.last_error.unwrap().contains("invariant"));
        assert!(h.engine.run.is_none());
        assert!(!h.engine.session.is_active());
        assert_eq!(h.line.cancelled().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disposition_for_history_item_records_only() {
        let mut h = harness().await;
        h.engine.start(fixtures::targets(3)).await.unwrap();
        h.engine
            .record_disposition("target-1", DispositionOutcome::new(Disposition::Voicemail), false)
            .await
            .unwrap();
        assert_eq!(h.engine.project().cursor, 1);

        let effect = h
            .engine
            .record_disposition("target-1", DispositionOutcome::new(Disposition::Callback), false)
            .await
            .unwrap();
        assert_eq!(effect, DispositionEffect::Recorded);
        assert_eq!(h.engine.project().cursor, 1);

        let stored = h.targets.get("target-1").unwrap().unwrap();
        assert_eq!(stored.current_status, Some(Disposition::Callback));

        let changes = h
            .activity
            .query(&ActivityFilter::new().with_target_id("target-1").with_kind("status_changed"))
            .unwrap();
        assert_eq!(changes.len(), 2);
    }

    #[tokio::test]
    async fn test_lost_line_events_abort_campaign_with_live_call() {
        let mut h = harness().await;

        // Nothing running: a lag is only logged.
        h.engine.handle_line_lag(4).await;
        assert_eq!(h.engine.project().status, CampaignStatus::Idle);

        h.engine.start(fixtures::targets(2)).await.unwrap();
        assert!(h.engine.session.is_active());

        h.engine.handle_line_lag(7).await;

        let state = h.engine.project();
        assert_eq!(state.status, CampaignStatus::Stopped);
        assert_eq!(state.current_call_state, crate::telephony::CallLifecycleState::Idle);
        assert!(state.last_error.unwrap().contains("7 missed"));
        assert!(h.engine.run.is_none());
        assert!(h.engine.coordinator.next_deadline().is_none());
        assert_eq!(h.line.cancelled().await.len(), 1);
    }
}
