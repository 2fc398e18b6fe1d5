//! Telephony: the line collaborator contract and the call session façade.
//!
//! The `TelephonyLine` trait is the narrow contract of the external SIP/WebRTC
//! stack. `CallSessionController` is the only component that talks to it.

mod session;
mod simulated;
mod types;

pub use session::{
    CallEvent, CallEventKind, CallHandle, CallLifecycleState, CallSessionController, SessionError,
    TerminationReason,
};
pub use simulated::{CallScript, ScriptedOutcome, SimulatedLine, SimulatedLineConfig};
pub(crate) use simulated::{spawn_script, EVENT_BUFFER};
pub use types::{LineCallId, LineEvent, LineEventKind, TelephonyError, TelephonyLine};
