//! Sync log database operations (append-only)

use crate::db::Database;
use crate::error::AgentResult;
use crate::models::SyncLogEntry;

impl Database {
    pub fn insert_sync_log(&self, entry: &SyncLogEntry) -> AgentResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_logs (id, source_agent, target_agent, operation, data, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.id,
                entry.source_agent,
                entry.target_agent,
                entry.operation,
                entry.data,
                entry.status,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    /// Newest entries first, for auditing.
    pub fn list_sync_logs(&self, limit: usize) -> AgentResult<Vec<SyncLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_agent, target_agent, operation, data, status, created_at
             FROM sync_logs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([limit as i64], |row| {
                Ok(SyncLogEntry {
                    id: row.get(0)?,
                    source_agent: row.get(1)?,
                    target_agent: row.get(2)?,
                    operation: row.get(3)?,
                    data: row.get(4)?,
                    status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
