use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::{ActivityKind, ActivityRecord, ActivityStore};
use crate::metrics::ACTIVITY_WRITE_FAILURES;

/// An activity record could not be persisted.
///
/// Returned as a value so the live call flow can log it and move on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("activity record for {target_id} not persisted: {reason}")]
pub struct PersistenceSoftFailure {
    pub target_id: String,
    pub reason: String,
}

/// Writes one activity record per terminal call event or status change.
///
/// Never fails the caller: persistence errors are logged and handed back as
/// a [`PersistenceSoftFailure`].
pub struct DispositionRecorder {
    store: Arc<dyn ActivityStore>,
    campaign_id: Option<String>,
}

impl DispositionRecorder {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self {
            store,
            campaign_id: None,
        }
    }

    /// Tag subsequent records with the given campaign run.
    pub fn set_campaign(&mut self, campaign_id: Option<String>) {
        self.campaign_id = campaign_id;
    }

    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id.as_deref()
    }

    /// Append one record. Returns the stored record id.
    pub fn record(
        &self,
        target_id: &str,
        kind: ActivityKind,
        description: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<i64, PersistenceSoftFailure> {
        let record = ActivityRecord {
            id: 0,
            timestamp: Utc::now(),
            campaign_id: self.campaign_id.clone(),
            target_id: target_id.to_string(),
            duration_secs: kind.duration_secs(),
            kind,
            description: description.into(),
            metadata,
        };

        match self.store.insert(&record) {
            Ok(id) => {
                tracing::debug!(
                    "Recorded {} for {} (id {})",
                    record.kind.kind_name(),
                    target_id,
                    id
                );
                Ok(id)
            }
            Err(e) => {
                ACTIVITY_WRITE_FAILURES.inc();
                tracing::error!(
                    "Failed to record {} for {}: {}",
                    record.kind.kind_name(),
                    target_id,
                    e
                );
                Err(PersistenceSoftFailure {
                    target_id: target_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::activity::{ActivityError, ActivityFilter};
    use crate::telephony::TerminationReason;

    /// Mock store that records insert calls
    struct MockStore {
        records: Mutex<Vec<ActivityRecord>>,
        should_fail: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                should_fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                should_fail: true,
            }
        }
    }

    impl ActivityStore for MockStore {
        fn insert(&self, record: &ActivityRecord) -> Result<i64, ActivityError> {
            if self.should_fail {
                return Err(ActivityError::Database("Mock failure".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let id = records.len() as i64 + 1;
            let mut stored = record.clone();
            stored.id = id;
            records.push(stored);
            Ok(id)
        }

        fn query(&self, _filter: &ActivityFilter) -> Result<Vec<ActivityRecord>, ActivityError> {
            Ok(self.records.lock().unwrap().clone())
        }

        fn count(&self, _filter: &ActivityFilter) -> Result<i64, ActivityError> {
            Ok(self.records.lock().unwrap().len() as i64)
        }
    }

    fn ended(duration_secs: u64) -> ActivityKind {
        ActivityKind::CallEnded {
            reason: TerminationReason::Completed,
            duration_secs,
        }
    }

    #[test]
    fn test_record_appends_with_campaign_tag() {
        let store = Arc::new(MockStore::new());
        let mut recorder = DispositionRecorder::new(Arc::clone(&store) as Arc<dyn ActivityStore>);
        recorder.set_campaign(Some("campaign-1".to_string()));

        let id = recorder
            .record("t-1", ended(12), "call ended", serde_json::json!({}))
            .unwrap();
        assert_eq!(id, 1);

        let records = store.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].campaign_id.as_deref(), Some("campaign-1"));
        assert_eq!(records[0].duration_secs, Some(12));
        assert_eq!(records[0].description, "call ended");
    }

    #[test]
    fn test_each_call_appends_a_new_record() {
        let store = Arc::new(MockStore::new());
        let recorder = DispositionRecorder::new(Arc::clone(&store) as Arc<dyn ActivityStore>);

        recorder.record("t-1", ended(1), "first", serde_json::Value::Null).unwrap();
        recorder.record("t-1", ended(2), "second", serde_json::Value::Null).unwrap();

        assert_eq!(store.records.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_store_failure_is_soft() {
        let store: Arc<dyn ActivityStore> = Arc::new(MockStore::failing());
        let recorder = DispositionRecorder::new(store);

        let failure = recorder
            .record("t-9", ended(0), "lost", serde_json::Value::Null)
            .unwrap_err();
        assert_eq!(failure.target_id, "t-9");
        assert!(failure.reason.contains("Mock failure"));
        assert!(failure.to_string().contains("not persisted"));
    }
}
