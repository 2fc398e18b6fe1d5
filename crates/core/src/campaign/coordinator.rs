//! Advancement coordinator.
//!
//! Arbitrates between the two things that can move a campaign forward: the
//! grace timer that follows a natural hang-up, and an operator disposition.
//! Whichever commits first takes the advance claim; the claim is held until
//! the next dial has been issued (or the run ends) and every other trigger
//! that sees it no-ops.
//!
//! The coordinator owns no clock and no tasks. Timers are deadlines the
//! engine sleeps on, so cancelling one is just forgetting it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::queue::Disposition;

/// What committed to advancing the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceTrigger {
    /// Grace interval elapsed after a natural termination.
    Automatic,
    /// Operator disposition.
    Manual,
    /// Operator released a parked qualified lead.
    Confirm,
    /// Target was not dialable (do-not-call, or dial failed twice).
    Skip,
}

impl AdvanceTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvanceTrigger::Automatic => "automatic",
            AdvanceTrigger::Manual => "manual",
            AdvanceTrigger::Confirm => "confirm",
            AdvanceTrigger::Skip => "skip",
        }
    }
}

/// Who holds the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimHolder {
    Advance(AdvanceTrigger),
    /// Re-dial of the same position after a failed dial.
    Retry,
}

/// The advance claim: at most one exists at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceClaim {
    pub position: usize,
    pub holder: ClaimHolder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Waiting for operator action after a natural termination.
    Grace,
    /// Waiting before dialing the current position.
    Settle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub position: usize,
    pub deadline: Instant,
}

/// Result of a timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Claim taken; advance the cursor.
    Advance(AdvanceTrigger),
    /// Dial the current position (claim stays held until the dial is issued).
    Dial,
    /// Nothing to do: cancelled, stale or early.
    Nothing,
}

/// Result of a disposition on the engaged item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionDecision {
    /// Claim taken; end the call and advance.
    AdvanceNow(AdvanceTrigger),
    /// Qualified lead without confirmation: automatic advance suspended.
    Park,
    /// An advance is already in flight; record the status only.
    RecordOnly,
}

/// Result of a failed dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialFailureAction {
    /// Settle timer armed for one more attempt at the same position.
    Retry,
    /// Retry already spent; the claim is held for a skip.
    Skip,
}

/// Exactly-once advancement arbiter for one campaign run.
#[derive(Debug)]
pub struct AdvancementCoordinator {
    grace: Duration,
    settle: Duration,
    claim: Option<AdvanceClaim>,
    timer: Option<PendingTimer>,
    parked: Option<usize>,
    retry_spent: bool,
}

impl AdvancementCoordinator {
    pub fn new(grace: Duration, settle: Duration) -> Self {
        Self {
            grace,
            settle,
            claim: None,
            timer: None,
            parked: None,
            retry_spent: false,
        }
    }

    pub fn claim(&self) -> Option<AdvanceClaim> {
        self.claim
    }

    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    pub fn pending_timer(&self) -> Option<PendingTimer> {
        self.timer
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(|t| t.deadline)
    }

    pub fn is_parked(&self) -> bool {
        self.parked.is_some()
    }

    /// Take the claim. Succeeds only if nobody holds it; cancels any pending timer.
    fn try_claim(&mut self, position: usize, trigger: AdvanceTrigger) -> bool {
        if let Some(existing) = self.claim {
            debug!(
                "Advance of position {} by {} refused: already claimed by {:?}",
                position,
                trigger.as_str(),
                existing.holder
            );
            return false;
        }
        self.claim = Some(AdvanceClaim {
            position,
            holder: ClaimHolder::Advance(trigger),
        });
        self.timer = None;
        true
    }

    /// A call at `position` ended on its own. Arms the grace timer unless an
    /// advance is in flight or the position is parked. Returns whether it armed.
    pub fn on_call_terminated(&mut self, position: usize, now: Instant) -> bool {
        if self.claim.is_some() {
            debug!("Termination at position {} while advance claimed", position);
            return false;
        }
        if self.parked == Some(position) {
            debug!("Position {} parked; grace timer not armed", position);
            return false;
        }
        self.timer = Some(PendingTimer {
            kind: TimerKind::Grace,
            position,
            deadline: now + self.grace,
        });
        true
    }

    /// The engine's sleep on [`next_deadline`](Self::next_deadline) completed.
    pub fn on_timer_elapsed(&mut self, cursor: usize, now: Instant) -> TimerAction {
        let Some(timer) = self.timer else {
            debug!("Timer fired with nothing pending");
            return TimerAction::Nothing;
        };
        if timer.deadline > now {
            return TimerAction::Nothing;
        }
        self.timer = None;
        if timer.position != cursor {
            debug!(
                "Dropping {:?} timer for position {} (cursor at {})",
                timer.kind, timer.position, cursor
            );
            return TimerAction::Nothing;
        }

        match timer.kind {
            TimerKind::Grace => {
                if self.try_claim(cursor, AdvanceTrigger::Automatic) {
                    TimerAction::Advance(AdvanceTrigger::Automatic)
                } else {
                    TimerAction::Nothing
                }
            }
            TimerKind::Settle => TimerAction::Dial,
        }
    }

    /// An operator disposition for the engaged item at `position`.
    pub fn on_disposition(
        &mut self,
        position: usize,
        category: Disposition,
        confirmed: bool,
    ) -> DispositionDecision {
        if self.claim.is_some() {
            return DispositionDecision::RecordOnly;
        }

        if category.requires_handoff() && !confirmed {
            self.parked = Some(position);
            if matches!(self.timer, Some(t) if t.kind == TimerKind::Grace) {
                self.timer = None;
            }
            return DispositionDecision::Park;
        }

        let trigger = if category.requires_handoff() {
            AdvanceTrigger::Confirm
        } else {
            AdvanceTrigger::Manual
        };
        self.parked = None;
        if self.try_claim(position, trigger) {
            DispositionDecision::AdvanceNow(trigger)
        } else {
            DispositionDecision::RecordOnly
        }
    }

    /// Explicit "confirm and continue" on a parked position.
    pub fn confirm(&mut self, position: usize) -> bool {
        if self.parked != Some(position) {
            return false;
        }
        self.parked = None;
        self.try_claim(position, AdvanceTrigger::Confirm)
    }

    /// Take the claim to skip `position` without dialing it.
    ///
    /// Unconditional: a skip continues whichever advance brought the cursor here.
    pub fn begin_skip(&mut self, position: usize) {
        self.claim = Some(AdvanceClaim {
            position,
            holder: ClaimHolder::Advance(AdvanceTrigger::Skip),
        });
        self.timer = None;
        self.parked = None;
        self.retry_spent = false;
    }

    /// The cursor moved to `cursor`. Arms the settle timer, or winds down at
    /// the end of the queue.
    pub fn on_advanced(&mut self, has_next: bool, cursor: usize, now: Instant) {
        self.parked = None;
        self.retry_spent = false;
        if has_next {
            self.timer = Some(PendingTimer {
                kind: TimerKind::Settle,
                position: cursor,
                deadline: now + self.settle,
            });
        } else {
            self.reset();
        }
    }

    /// The next dial went out; the claim is released.
    pub fn on_dial_issued(&mut self) {
        self.claim = None;
        self.retry_spent = false;
    }

    /// Dialing `position` failed at the telephony layer.
    pub fn on_dial_failed(&mut self, position: usize, now: Instant) -> DialFailureAction {
        self.claim = None;
        if self.retry_spent {
            self.retry_spent = false;
            self.claim = Some(AdvanceClaim {
                position,
                holder: ClaimHolder::Advance(AdvanceTrigger::Skip),
            });
            return DialFailureAction::Skip;
        }

        self.retry_spent = true;
        self.claim = Some(AdvanceClaim {
            position,
            holder: ClaimHolder::Retry,
        });
        self.timer = Some(PendingTimer {
            kind: TimerKind::Settle,
            position,
            deadline: now + self.settle,
        });
        DialFailureAction::Retry
    }

    /// Drop the claim, every pending timer and the parked flag.
    pub fn reset(&mut self) {
        self.claim = None;
        self.timer = None;
        self.parked = None;
        self.retry_spent = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_millis(3000);
    const SETTLE: Duration = Duration::from_millis(1500);

    fn coordinator() -> AdvancementCoordinator {
        AdvancementCoordinator::new(GRACE, SETTLE)
    }

    #[test]
    fn test_grace_timer_claims_automatic_advance() {
        let mut c = coordinator();
        let now = Instant::now();

        assert!(c.on_call_terminated(0, now));
        assert_eq!(c.next_deadline(), Some(now + GRACE));

        // Too early.
        assert_eq!(c.on_timer_elapsed(0, now + GRACE / 2), TimerAction::Nothing);
        assert!(!c.is_claimed());

        assert_eq!(
            c.on_timer_elapsed(0, now + GRACE),
            TimerAction::Advance(AdvanceTrigger::Automatic)
        );
        assert_eq!(
            c.claim(),
            Some(AdvanceClaim {
                position: 0,
                holder: ClaimHolder::Advance(AdvanceTrigger::Automatic)
            })
        );
        assert!(c.next_deadline().is_none());
    }

    #[test]
    fn test_manual_disposition_in_grace_window_wins_once() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_call_terminated(0, now);

        let decision = c.on_disposition(0, Disposition::NoAnswer, false);
        assert_eq!(decision, DispositionDecision::AdvanceNow(AdvanceTrigger::Manual));
        assert!(c.next_deadline().is_none());

        // The grace deadline passing afterwards does nothing.
        assert_eq!(c.on_timer_elapsed(0, now + GRACE * 2), TimerAction::Nothing);

        // A second disposition for the same item only records.
        assert_eq!(
            c.on_disposition(0, Disposition::Voicemail, false),
            DispositionDecision::RecordOnly
        );
    }

    #[test]
    fn test_termination_after_manual_claim_does_not_arm_grace() {
        let mut c = coordinator();
        let now = Instant::now();
        assert!(matches!(
            c.on_disposition(1, Disposition::DoNotCall, false),
            DispositionDecision::AdvanceNow(_)
        ));
        assert!(!c.on_call_terminated(1, now));
        assert!(c.pending_timer().is_none());
    }

    #[test]
    fn test_claim_held_through_settle_until_dial_issued() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_disposition(0, Disposition::Callback, false);
        c.on_advanced(true, 1, now);

        let timer = c.pending_timer().unwrap();
        assert_eq!(timer.kind, TimerKind::Settle);
        assert_eq!(timer.position, 1);
        assert!(c.is_claimed());

        assert_eq!(c.on_timer_elapsed(1, now + SETTLE), TimerAction::Dial);
        assert!(c.is_claimed());

        c.on_dial_issued();
        assert!(!c.is_claimed());
    }

    #[test]
    fn test_end_of_queue_clears_everything() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_call_terminated(2, now);
        c.on_timer_elapsed(2, now + GRACE);
        c.on_advanced(false, 3, now + GRACE);

        assert!(!c.is_claimed());
        assert!(c.pending_timer().is_none());
    }

    #[test]
    fn test_qualified_without_confirm_parks() {
        let mut c = coordinator();
        let now = Instant::now();

        assert_eq!(
            c.on_disposition(0, Disposition::Qualified, false),
            DispositionDecision::Park
        );
        assert!(c.is_parked());
        assert!(!c.is_claimed());

        // Natural hang-up while parked does not arm grace.
        assert!(!c.on_call_terminated(0, now));
        assert!(c.next_deadline().is_none());

        assert!(!c.confirm(1));
        assert!(c.confirm(0));
        assert!(!c.is_parked());
        assert_eq!(
            c.claim().map(|claim| claim.holder),
            Some(ClaimHolder::Advance(AdvanceTrigger::Confirm))
        );
    }

    #[test]
    fn test_qualified_after_grace_armed_cancels_timer() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_call_terminated(0, now);
        c.on_disposition(0, Disposition::Qualified, false);

        assert!(c.next_deadline().is_none());
        assert_eq!(c.on_timer_elapsed(0, now + GRACE), TimerAction::Nothing);
    }

    #[test]
    fn test_confirmed_qualified_advances_immediately() {
        let mut c = coordinator();
        assert_eq!(
            c.on_disposition(0, Disposition::Qualified, true),
            DispositionDecision::AdvanceNow(AdvanceTrigger::Confirm)
        );
    }

    #[test]
    fn test_confirm_without_park_refused() {
        let mut c = coordinator();
        assert!(!c.confirm(0));
    }

    #[test]
    fn test_dial_failure_retries_once_then_skips() {
        let mut c = coordinator();
        let now = Instant::now();

        assert_eq!(c.on_dial_failed(1, now), DialFailureAction::Retry);
        assert_eq!(
            c.claim().map(|claim| claim.holder),
            Some(ClaimHolder::Retry)
        );
        assert_eq!(c.on_timer_elapsed(1, now + SETTLE), TimerAction::Dial);

        assert_eq!(c.on_dial_failed(1, now + SETTLE), DialFailureAction::Skip);
        assert_eq!(
            c.claim().map(|claim| claim.holder),
            Some(ClaimHolder::Advance(AdvanceTrigger::Skip))
        );
    }

    #[test]
    fn test_successful_retry_resets_budget() {
        let mut c = coordinator();
        let now = Instant::now();

        c.on_dial_failed(1, now);
        c.on_timer_elapsed(1, now + SETTLE);
        c.on_dial_issued();

        // Next position gets its own retry.
        c.on_call_terminated(1, now);
        c.on_timer_elapsed(1, now + GRACE);
        c.on_advanced(true, 2, now);
        c.on_timer_elapsed(2, now + SETTLE);
        assert_eq!(c.on_dial_failed(2, now), DialFailureAction::Retry);
    }

    #[test]
    fn test_stale_timer_for_other_position_ignored() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_call_terminated(0, now);

        assert_eq!(c.on_timer_elapsed(1, now + GRACE), TimerAction::Nothing);
        assert!(!c.is_claimed());
        assert!(c.pending_timer().is_none());
    }

    #[test]
    fn test_reset_makes_late_timer_a_no_op() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_call_terminated(0, now);
        c.reset();

        assert_eq!(c.on_timer_elapsed(0, now + GRACE), TimerAction::Nothing);
        assert!(!c.is_claimed());
    }

    #[test]
    fn test_skip_overrides_claim() {
        let mut c = coordinator();
        let now = Instant::now();
        c.on_disposition(0, Disposition::NoAnswer, false);
        c.on_advanced(true, 1, now);
        c.on_timer_elapsed(1, now + SETTLE);

        c.begin_skip(1);
        assert_eq!(
            c.claim(),
            Some(AdvanceClaim {
                position: 1,
                holder: ClaimHolder::Advance(AdvanceTrigger::Skip)
            })
        );
    }
}
