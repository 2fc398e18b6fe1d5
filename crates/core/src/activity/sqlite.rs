use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{ActivityError, ActivityFilter, ActivityKind, ActivityRecord, ActivityStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS activity_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        campaign_id TEXT,
        target_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        duration_secs INTEGER,
        data TEXT NOT NULL,
        metadata TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_records(timestamp);
    CREATE INDEX IF NOT EXISTS idx_activity_target_id ON activity_records(target_id);
    CREATE INDEX IF NOT EXISTS idx_activity_campaign_id ON activity_records(campaign_id);
    CREATE INDEX IF NOT EXISTS idx_activity_kind ON activity_records(kind);
"#;

/// SQLite-backed activity store
pub struct SqliteActivityStore {
    conn: Mutex<Connection>,
}

impl SqliteActivityStore {
    /// Open (or create) the database file and its tables
    pub fn new(path: &Path) -> Result<Self, ActivityError> {
        let conn = Connection::open(path).map_err(|e| ActivityError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// In-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, ActivityError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ActivityError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, ActivityError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| ActivityError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn build_where_clause(filter: &ActivityFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref target_id) = filter.target_id {
            conditions.push("target_id = ?");
            params.push(Box::new(target_id.clone()));
        }

        if let Some(ref campaign_id) = filter.campaign_id {
            conditions.push("campaign_id = ?");
            params.push(Box::new(campaign_id.clone()));
        }

        if let Some(ref kind) = filter.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.clone()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl ActivityStore for SqliteActivityStore {
    fn insert(&self, record: &ActivityRecord) -> Result<i64, ActivityError> {
        let conn = self.conn.lock().unwrap();

        let data_json = serde_json::to_string(&record.kind)
            .map_err(|e| ActivityError::Serialization(e.to_string()))?;
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| ActivityError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO activity_records (timestamp, campaign_id, target_id, kind, description, duration_secs, data, metadata) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.campaign_id,
                record.target_id,
                record.kind.kind_name(),
                record.description,
                record.duration_secs.map(|d| d as i64),
                data_json,
                metadata_json,
            ],
        )
        .map_err(|e| ActivityError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>, ActivityError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT id, timestamp, campaign_id, target_id, description, duration_secs, data, metadata FROM activity_records {} ORDER BY id ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ActivityError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let id: i64 = row.get(0)?;
                let timestamp_str: String = row.get(1)?;
                let campaign_id: Option<String> = row.get(2)?;
                let target_id: String = row.get(3)?;
                let description: String = row.get(4)?;
                let duration_secs: Option<i64> = row.get(5)?;
                let data_json: String = row.get(6)?;
                let metadata_json: String = row.get(7)?;

                Ok((
                    id,
                    timestamp_str,
                    campaign_id,
                    target_id,
                    description,
                    duration_secs,
                    data_json,
                    metadata_json,
                ))
            })
            .map_err(|e| ActivityError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (
                id,
                timestamp_str,
                campaign_id,
                target_id,
                description,
                duration_secs,
                data_json,
                metadata_json,
            ) = row_result.map_err(|e| ActivityError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| ActivityError::Database(format!("Invalid timestamp: {}", e)))?
                .into();

            let kind: ActivityKind = serde_json::from_str(&data_json)
                .map_err(|e| ActivityError::Serialization(e.to_string()))?;
            let metadata: serde_json::Value = serde_json::from_str(&metadata_json)
                .map_err(|e| ActivityError::Serialization(e.to_string()))?;

            records.push(ActivityRecord {
                id,
                timestamp,
                campaign_id,
                target_id,
                kind,
                description,
                duration_secs: duration_secs.map(|d| d as u64),
                metadata,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &ActivityFilter) -> Result<i64, ActivityError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM activity_records {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| ActivityError::Database(e.to_string()))
    }
}
