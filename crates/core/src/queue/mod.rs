//! Queue snapshot: the frozen, ordered list of call targets for one campaign run.

mod snapshot;
mod types;

pub use snapshot::{QueueError, QueueSnapshot, QueueView};
pub use types::{normalize_phone, CallTarget, Disposition};
