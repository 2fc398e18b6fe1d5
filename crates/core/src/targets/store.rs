//! Target storage trait and types.

use std::fmt;

use crate::queue::{CallTarget, Disposition};

/// Error type for target store operations.
#[derive(Debug)]
pub enum TargetStoreError {
    /// Target not found.
    NotFound(String),
    /// Database error.
    Database(String),
}

impl fmt::Display for TargetStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetStoreError::NotFound(id) => write!(f, "Target not found: {}", id),
            TargetStoreError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TargetStoreError {}

/// Outcome of an optimistic status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusWrite {
    /// The stored status matched the expectation and was replaced.
    Applied,
    /// Someone else changed the status first; nothing was written.
    Conflict { current: Option<Disposition> },
    /// No such target in the store.
    Missing,
}

/// Filter for listing targets.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    /// Filter by status (`None` inside matches never-called targets).
    pub status: Option<Option<Disposition>>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TargetFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: Option<Disposition>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for call target storage backends.
pub trait TargetStore: Send + Sync {
    /// Get a target by ID.
    fn get(&self, id: &str) -> Result<Option<CallTarget>, TargetStoreError>;

    /// List targets matching the filter, in insertion order.
    fn list(&self, filter: &TargetFilter) -> Result<Vec<CallTarget>, TargetStoreError>;

    /// Insert a target or replace all of its attributes.
    fn upsert(&self, target: &CallTarget) -> Result<(), TargetStoreError>;

    /// Replace the status only if it still equals `expected`.
    fn update_status_if_unchanged(
        &self,
        id: &str,
        expected: Option<Disposition>,
        new_status: Disposition,
    ) -> Result<StatusWrite, TargetStoreError>;
}
