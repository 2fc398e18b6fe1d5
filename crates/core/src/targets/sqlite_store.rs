//! SQLite-backed target store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StatusWrite, TargetFilter, TargetStore, TargetStoreError};
use crate::queue::{CallTarget, Disposition};

/// SQLite-backed target store.
pub struct SqliteTargetStore {
    conn: Mutex<Connection>,
}

impl SqliteTargetStore {
    /// Create a new SQLite target store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TargetStoreError> {
        let conn =
            Connection::open(path).map_err(|e| TargetStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite target store (useful for testing).
    pub fn in_memory() -> Result<Self, TargetStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TargetStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TargetStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS call_targets (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL,
                display_name TEXT NOT NULL DEFAULT '',
                status TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_call_targets_status ON call_targets(status);
            "#,
        )
        .map_err(|e| TargetStoreError::Database(e.to_string()))
    }

    fn row_to_target(row: &rusqlite::Row) -> rusqlite::Result<CallTarget> {
        let id: String = row.get(0)?;
        let phone: String = row.get(1)?;
        let display_name: String = row.get(2)?;
        let status: Option<String> = row.get(3)?;

        // Unknown status names (e.g. from a newer schema) read as never-called.
        let current_status = status.as_deref().and_then(Disposition::parse);

        Ok(CallTarget {
            id,
            phone,
            display_name,
            current_status,
        })
    }
}

impl TargetStore for SqliteTargetStore {
    fn get(&self, id: &str) -> Result<Option<CallTarget>, TargetStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, phone, display_name, status FROM call_targets WHERE id = ?",
            params![id],
            Self::row_to_target,
        )
        .optional()
        .map_err(|e| TargetStoreError::Database(e.to_string()))
    }

    fn list(&self, filter: &TargetFilter) -> Result<Vec<CallTarget>, TargetStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut params): (&str, Vec<Box<dyn rusqlite::ToSql>>) = match filter.status {
            Some(Some(status)) => ("WHERE status = ?", vec![Box::new(status.as_str().to_string())]),
            Some(None) => ("WHERE status IS NULL", vec![]),
            None => ("", vec![]),
        };
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));

        let sql = format!(
            "SELECT id, phone, display_name, status FROM call_targets {} ORDER BY seq ASC LIMIT ? OFFSET ?",
            where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TargetStoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_target)
            .map_err(|e| TargetStoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| TargetStoreError::Database(e.to_string()))
    }

    fn upsert(&self, target: &CallTarget) -> Result<(), TargetStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO call_targets (id, phone, display_name, status, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                phone = excluded.phone,
                display_name = excluded.display_name,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
            params![
                target.id,
                target.phone,
                target.display_name,
                target.current_status.map(|s| s.as_str()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| TargetStoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn update_status_if_unchanged(
        &self,
        id: &str,
        expected: Option<Disposition>,
        new_status: Disposition,
    ) -> Result<StatusWrite, TargetStoreError> {
        let conn = self.conn.lock().unwrap();

        // `IS` compares NULLs as equal, which is what an expected "never called" needs.
        let updated = conn
            .execute(
                "UPDATE call_targets SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IS ?4",
                params![
                    new_status.as_str(),
                    Utc::now().to_rfc3339(),
                    id,
                    expected.map(|s| s.as_str()),
                ],
            )
            .map_err(|e| TargetStoreError::Database(e.to_string()))?;

        if updated > 0 {
            return Ok(StatusWrite::Applied);
        }

        let current: Option<Option<String>> = conn
            .query_row(
                "SELECT status FROM call_targets WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TargetStoreError::Database(e.to_string()))?;

        Ok(match current {
            None => StatusWrite::Missing,
            Some(status) => StatusWrite::Conflict {
                current: status.as_deref().and_then(Disposition::parse),
            },
        })
    }
}
