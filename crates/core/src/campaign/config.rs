//! Campaign configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and policy knobs for a campaign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// How long to wait after a call ends before advancing on our own (milliseconds).
    /// Gives the operator a window to record a disposition first.
    #[serde(default = "default_grace_interval")]
    pub grace_interval_ms: u64,

    /// Pause between advancing and dialing the new current target (milliseconds).
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Skip targets whose stored status is do-not-call instead of dialing them.
    #[serde(default = "default_skip_do_not_call")]
    pub skip_do_not_call: bool,
}

fn default_grace_interval() -> u64 {
    3000 // 3 seconds
}

fn default_settle_delay() -> u64 {
    1500
}

fn default_skip_do_not_call() -> bool {
    true
}

impl CampaignConfig {
    pub fn grace_interval(&self) -> Duration {
        Duration::from_millis(self.grace_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            grace_interval_ms: default_grace_interval(),
            settle_delay_ms: default_settle_delay(),
            skip_do_not_call: default_skip_do_not_call(),
        }
    }
}
