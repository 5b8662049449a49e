//! Database operations for the `agent_data` table

use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::AgentResult;
use crate::models::{KeyEntry, Record, RecordStats};

/// A fully prepared row, value and metadata already serialized
#[derive(Debug, Clone)]
pub struct RecordRow<'a> {
    pub id: &'a str,
    pub agent_id: &'a str,
    pub session_id: Option<&'a str>,
    pub key: &'a str,
    pub value: &'a str,
    pub metadata: Option<&'a str>,
    pub now: &'a str,
    pub expires_at: Option<&'a str>,
}

impl Database {
    /// Insert-or-replace on `(agent_id, key)`. The unique constraint is resolved
    /// by the REPLACE conflict clause, so a second store never fails on it.
    pub fn upsert_record(&self, row: &RecordRow<'_>) -> AgentResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO agent_data
                (id, agent_id, session_id, key, value, metadata, created_at, updated_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8)",
            rusqlite::params![
                row.id,
                row.agent_id,
                row.session_id,
                row.key,
                row.value,
                row.metadata,
                row.now,
                row.expires_at
            ],
        )?;
        Ok(())
    }

    /// Most recently updated live row for the key, if any.
    pub fn get_live_record(&self, agent_id: &str, key: &str, now: &str) -> AgentResult<Option<Record>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT id, agent_id, session_id, key, value, metadata, created_at, updated_at, expires_at
                 FROM agent_data
                 WHERE agent_id = ?1 AND key = ?2
                   AND (expires_at IS NULL OR expires_at > ?3)
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT 1",
                rusqlite::params![agent_id, key, now],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, agent_id, session_id, key, value, metadata, created_at, updated_at, expires_at)) = raw
        else {
            return Ok(None);
        };

        Ok(Some(Record {
            id,
            agent_id,
            session_id,
            key,
            value: decode_json(&value),
            metadata: metadata.as_deref().map(decode_json),
            created_at,
            updated_at,
            expires_at,
        }))
    }

    /// Keys with a live record for the agent, newest update first.
    pub fn list_live_keys(&self, agent_id: &str, now: &str) -> AgentResult<Vec<KeyEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, updated_at FROM agent_data
             WHERE agent_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY updated_at DESC, rowid DESC",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![agent_id, now], |row| {
                Ok(KeyEntry {
                    key: row.get(0)?,
                    updated_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn record_stats(&self, agent_id: &str, now: &str) -> AgentResult<RecordStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT key) FROM agent_data
             WHERE agent_id = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            rusqlite::params![agent_id, now],
            |row| {
                Ok(RecordStats {
                    total_records: row.get(0)?,
                    unique_keys: row.get(1)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Physical rows for a key, expired ones included.
    #[cfg(test)]
    pub fn count_record_rows(&self, agent_id: &str, key: &str) -> AgentResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM agent_data WHERE agent_id = ?1 AND key = ?2",
            rusqlite::params![agent_id, key],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Values are written as JSON; anything else (rows written by ad-hoc batches)
/// is returned as a plain string.
fn decode_json(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row<'a>(id: &'a str, key: &'a str, value: &'a str, now: &'a str, expires_at: Option<&'a str>) -> RecordRow<'a> {
        RecordRow {
            id,
            agent_id: "a1",
            session_id: Some("s1"),
            key,
            value,
            metadata: None,
            now,
            expires_at,
        }
    }

    #[test]
    fn test_upsert_replaces_row() {
        let db = Database::in_memory();
        db.upsert_record(&row("id-1", "k1", r#"{"x":1}"#, "2026-01-01T00:00:00.000Z", None))
            .unwrap();
        db.upsert_record(&row("id-2", "k1", r#"{"x":2}"#, "2026-01-01T00:00:01.000Z", None))
            .unwrap();

        assert_eq!(db.count_record_rows("a1", "k1").unwrap(), 1);
        let record = db
            .get_live_record("a1", "k1", "2026-01-01T00:00:02.000Z")
            .unwrap()
            .unwrap();
        assert_eq!(record.id, "id-2");
        assert_eq!(record.value, json!({"x": 2}));
        assert_eq!(record.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_expired_row_is_invisible_but_present() {
        let db = Database::in_memory();
        db.upsert_record(&row(
            "id-1",
            "k1",
            "1",
            "2026-01-01T00:00:00.000Z",
            Some("2026-01-01T00:00:01.000Z"),
        ))
        .unwrap();

        assert!(db.get_live_record("a1", "k1", "2026-01-01T00:00:00.500Z").unwrap().is_some());
        assert!(db.get_live_record("a1", "k1", "2026-01-01T00:00:02.000Z").unwrap().is_none());
        assert_eq!(db.count_record_rows("a1", "k1").unwrap(), 1);
    }

    #[test]
    fn test_list_and_stats_only_count_live_rows() {
        let db = Database::in_memory();
        db.upsert_record(&row("1", "old", "1", "2026-01-01T00:00:00.000Z", None)).unwrap();
        db.upsert_record(&row("2", "new", "2", "2026-01-01T00:00:05.000Z", None)).unwrap();
        db.upsert_record(&row(
            "3",
            "gone",
            "3",
            "2026-01-01T00:00:06.000Z",
            Some("2026-01-01T00:00:07.000Z"),
        ))
        .unwrap();

        let now = "2026-01-01T00:00:10.000Z";
        let keys: Vec<String> = db
            .list_live_keys("a1", now)
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["new", "old"]);

        let stats = db.record_stats("a1", now).unwrap();
        assert_eq!(stats, RecordStats { total_records: 2, unique_keys: 2 });
        assert!(db.list_live_keys("someone-else", now).unwrap().is_empty());
    }

    #[test]
    fn test_non_json_value_is_returned_as_string() {
        assert_eq!(decode_json("plain text"), json!("plain text"));
        assert_eq!(decode_json("[1,2]"), json!([1, 2]));
    }
}
