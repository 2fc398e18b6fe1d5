//! Campaign engine for sequential outbound dialing.
//!
//! One campaign run walks a frozen queue of targets, one call at a time:
//! - **Queue**: built once at start, never resized; only the cursor moves
//! - **Advancement**: natural hang-up (after a grace interval) or an operator
//!   disposition, whichever claims first; never both
//! - **Parking**: a qualified lead holds the campaign until confirmed

mod config;
mod controller;
mod coordinator;
mod types;

pub use config::CampaignConfig;
pub use controller::{create_campaign, CampaignController, CampaignEngine};
pub use coordinator::{
    AdvanceClaim, AdvanceTrigger, AdvancementCoordinator, ClaimHolder, DialFailureAction,
    DispositionDecision, PendingTimer, TimerAction, TimerKind,
};
pub use types::{
    CampaignError, CampaignState, CampaignStatus, DispositionEffect, DispositionOutcome,
};
