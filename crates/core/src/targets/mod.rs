//! Call target persistence: attribute reads and optimistic status writes.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteTargetStore;
pub use store::{StatusWrite, TargetFilter, TargetStore, TargetStoreError};
