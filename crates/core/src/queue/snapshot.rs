//! Fixed-length queue snapshot with a monotonically increasing cursor.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::types::{CallTarget, Disposition};

/// Errors raised by queue snapshot operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// No target with a dialable phone number was supplied.
    #[error("queue is empty: no dialable targets")]
    EmptyQueue,

    /// The snapshot length changed after a write. Always fatal.
    #[error("queue invariant violated: expected length {expected}, found {actual}")]
    InvariantViolation { expected: usize, actual: usize },

    /// The target is not part of this snapshot.
    #[error("target not in queue: {0}")]
    TargetNotFound(String),
}

/// Read-only view of the queue for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueView {
    /// Targets behind the cursor, in dial order.
    pub history: Vec<CallTarget>,
    /// The target at the cursor, if the queue is not exhausted.
    pub active: Option<CallTarget>,
    /// Targets after the cursor, in dial order.
    pub upcoming: Vec<CallTarget>,
}

/// Ordered, fixed-length arena of call targets captured at campaign start.
///
/// Items are addressed by index. Only `advance` moves the cursor and only
/// non-identity attributes of an item may change after `build`.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    items: Vec<CallTarget>,
    length: usize,
    cursor: usize,
}

impl QueueSnapshot {
    /// Build a snapshot from raw targets, dropping those without a dialable
    /// number and every repeat of an id already queued.
    pub fn build(targets: Vec<CallTarget>) -> Result<Self, QueueError> {
        let supplied = targets.len();
        let mut seen = HashSet::new();
        let items: Vec<CallTarget> = targets
            .into_iter()
            .filter(|t| {
                if t.dialable_number().is_none() {
                    debug!("Dropping target {} without a dialable number", t.id);
                    return false;
                }
                if !seen.insert(t.id.clone()) {
                    warn!("Dropping duplicate target {}", t.id);
                    return false;
                }
                true
            })
            .collect();

        if items.is_empty() {
            return Err(QueueError::EmptyQueue);
        }

        debug!("Built queue snapshot: {} of {} targets dialable", items.len(), supplied);

        let length = items.len();
        Ok(Self {
            items,
            length,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of targets at or after the cursor.
    pub fn remaining(&self) -> usize {
        self.length - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.length
    }

    /// The target at the cursor, or `None` once the queue is exhausted.
    pub fn current_item(&self) -> Option<&CallTarget> {
        self.items.get(self.cursor)
    }

    pub fn get(&self, position: usize) -> Option<&CallTarget> {
        self.items.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallTarget> {
        self.items.iter()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.id == id)
    }

    /// Move the cursor forward by one. Returns whether a next item exists.
    ///
    /// Callers must invoke this exactly once per terminal event; the
    /// advancement coordinator enforces that, not the snapshot.
    pub fn advance(&mut self) -> bool {
        if self.cursor < self.length {
            self.cursor += 1;
        }
        self.cursor < self.length
    }

    /// Update the status of the target at `position` in place.
    pub fn patch(&mut self, position: usize, status: Disposition) -> Result<(), QueueError> {
        if position >= self.length {
            return Err(QueueError::TargetNotFound(format!("position {}", position)));
        }
        self.write(position, |target| target.current_status = Some(status))
    }

    /// Refresh the non-identity attributes of the target at `position`
    /// from a fresher copy of the same record.
    pub fn refresh(&mut self, position: usize, fresh: &CallTarget) -> Result<(), QueueError> {
        let current = self
            .items
            .get(position)
            .ok_or_else(|| QueueError::TargetNotFound(fresh.id.clone()))?;
        if current.id != fresh.id {
            return Err(QueueError::TargetNotFound(fresh.id.clone()));
        }
        self.write(position, |target| {
            target.display_name = fresh.display_name.clone();
            target.current_status = fresh.current_status;
        })
    }

    /// Apply a mutation to one item and verify the arena did not change size.
    fn write<F>(&mut self, position: usize, mutate: F) -> Result<(), QueueError>
    where
        F: FnOnce(&mut CallTarget),
    {
        if let Some(target) = self.items.get_mut(position) {
            mutate(target);
        }
        self.check_length()
    }

    fn check_length(&self) -> Result<(), QueueError> {
        if self.items.len() != self.length {
            error!(
                "Queue snapshot length changed from {} to {}",
                self.length,
                self.items.len()
            );
            return Err(QueueError::InvariantViolation {
                expected: self.length,
                actual: self.items.len(),
            });
        }
        Ok(())
    }

    /// Split the queue around the cursor for display.
    pub fn view(&self) -> QueueView {
        let split = self.cursor.min(self.length);
        QueueView {
            history: self.items[..split].to_vec(),
            active: self.items.get(split).cloned(),
            upcoming: self.items.get(split + 1..).map(<[_]>::to_vec).unwrap_or_default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        self.items.pop();
    }
}
