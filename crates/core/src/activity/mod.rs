//! Activity log: the append-only record of call outcomes and status changes.

mod events;
mod recorder;
mod sqlite;
mod store;

pub use events::*;
pub use recorder::*;
pub use sqlite::*;
pub use store::*;
