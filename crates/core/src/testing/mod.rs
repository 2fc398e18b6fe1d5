//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable telephony line and target fixtures,
//! allowing whole campaigns to be exercised without a SIP stack.
//!
//! # Example
//!
//! ```rust,ignore
//! use dialer_core::testing::{fixtures, MockTelephonyLine};
//!
//! let line = MockTelephonyLine::new();
//! line.register().await?;
//! line.set_default_script(Some(fixtures::answered_call())).await;
//!
//! let targets = fixtures::targets(3);
//! // Hand `line` to a CallSessionController...
//! ```

mod mock_line;

pub use mock_line::{MockTelephonyLine, RecordedInvite};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::time::Duration;

    use crate::queue::CallTarget;
    use crate::telephony::CallScript;

    /// Create a call target with a dialable number.
    ///
    /// Ids are `target-{n}`, numbers `555-01{nn}`, names `Target {n}`.
    pub fn target(n: usize) -> CallTarget {
        CallTarget::new(
            format!("target-{}", n),
            format!("555-01{:02}", n),
            format!("Target {}", n),
        )
    }

    /// Create `count` dialable targets numbered from 1.
    pub fn targets(count: usize) -> Vec<CallTarget> {
        (1..=count).map(target).collect()
    }

    /// The number the line sees when `target(n)` is dialed.
    pub fn dialed_number(n: usize) -> String {
        format!("55501{:02}", n)
    }

    /// A call that rings for 1s and is answered for 5s.
    pub fn answered_call() -> CallScript {
        CallScript::answer(Duration::from_secs(1), Duration::from_secs(5))
    }

    /// A call that rings for 1s and is answered for a minute.
    pub fn long_call() -> CallScript {
        CallScript::answer(Duration::from_secs(1), Duration::from_secs(60))
    }
}
