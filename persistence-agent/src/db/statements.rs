//! Caller-supplied SQL: ad-hoc selects, transactional batches and DDL.

use rusqlite::{params_from_iter, Connection};
use serde_json::Map;

use super::values::{json_args_to_sql, sql_to_json};
use super::Database;
use crate::error::{AgentError, AgentResult};
use crate::models::{BatchOperation, QueryResult};

/// A batch that was rolled back. `attempted` counts the failing operation.
#[derive(Debug)]
pub struct BatchFailure {
    pub attempted: usize,
    pub total: usize,
    pub error: AgentError,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch rolled back after {} of {} operations: {}",
            self.attempted, self.total, self.error
        )
    }
}

impl Database {
    /// Run one statement and collect every row as a column-name keyed map.
    pub fn select_rows(&self, sql: &str, args: &[serde_json::Value]) -> AgentResult<QueryResult> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        let params = json_args_to_sql(args);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Map::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                map.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
            }
            out.push(map);
        }

        Ok(QueryResult {
            rows: out,
            columns,
            rows_affected: 0,
        })
    }

    /// Execute all operations in one transaction. Any failure rolls the whole
    /// batch back (the transaction is dropped without commit).
    pub fn execute_in_transaction(&self, operations: &[BatchOperation]) -> Result<usize, BatchFailure> {
        let total = operations.len();
        let fail = |attempted: usize, error: AgentError| BatchFailure {
            attempted,
            total,
            error,
        };

        let mut conn = self.conn().map_err(|e| fail(0, e))?;
        let tx = conn.transaction().map_err(|e| fail(0, e.into()))?;

        for (idx, op) in operations.iter().enumerate() {
            if let Err(e) = run_operation(&tx, op) {
                return Err(fail(idx + 1, e.into()));
            }
        }

        tx.commit().map_err(|e| fail(total, e.into()))?;
        Ok(total)
    }

    pub fn execute_ddl(&self, sql: &str) -> AgentResult<()> {
        let conn = self.conn()?;
        conn.execute(sql, [])?;
        Ok(())
    }
}

/// Row-returning statements (SELECT, RETURNING) are stepped to completion and
/// their rows discarded.
fn run_operation(conn: &Connection, op: &BatchOperation) -> rusqlite::Result<()> {
    let params = json_args_to_sql(&op.args);
    let mut stmt = conn.prepare(&op.sql)?;
    if stmt.column_count() > 0 {
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while rows.next()?.is_some() {}
    } else {
        stmt.execute(params_from_iter(params.iter()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(sql: &str, args: Vec<serde_json::Value>) -> BatchOperation {
        BatchOperation {
            sql: sql.to_string(),
            args,
        }
    }

    fn count_events(db: &Database) -> i64 {
        let result = db.select_rows("SELECT COUNT(*) AS n FROM events", &[]).unwrap();
        result.rows[0]["n"].as_i64().unwrap()
    }

    #[test]
    fn test_select_rows_with_args() {
        let db = Database::in_memory();
        db.execute_ddl("CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .unwrap();
        db.execute_in_transaction(&[
            op("INSERT INTO events (name, score) VALUES (?1, ?2)", vec![json!("a"), json!(1.5)]),
            op("INSERT INTO events (name, score) VALUES (?1, ?2)", vec![json!("b"), json!(2)]),
        ])
        .unwrap();

        let result = db
            .select_rows("SELECT name, score FROM events WHERE name = ?1", &[json!("a")])
            .unwrap();
        assert_eq!(result.columns, vec!["name", "score"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["name"], json!("a"));
        assert_eq!(result.rows[0]["score"], json!(1.5));
        assert_eq!(result.rows_affected, 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let db = Database::in_memory();
        db.execute_ddl("CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();

        let ops = vec![
            op("INSERT INTO events (name) VALUES ('one')", vec![]),
            op("INSERT INTO events (name) VALUES ('two')", vec![]),
            op("INSERT INTO missing_table (name) VALUES ('three')", vec![]),
            op("INSERT INTO events (name) VALUES ('four')", vec![]),
        ];

        let failure = db.execute_in_transaction(&ops).unwrap_err();
        assert_eq!(failure.attempted, 3);
        assert_eq!(failure.total, 4);
        assert!(failure.to_string().contains("rolled back after 3 of 4"));
        assert_eq!(count_events(&db), 0);
    }

    #[test]
    fn test_batch_commits_when_all_succeed() {
        let db = Database::in_memory();
        db.execute_ddl("CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        let count = db
            .execute_in_transaction(&[
                op("INSERT INTO events (name) VALUES (?1)", vec![json!("x")]),
                op("INSERT INTO events (name) VALUES (?1)", vec![json!("y")]),
            ])
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(count_events(&db), 2);
    }

    #[test]
    fn test_batch_with_row_returning_statements() {
        let db = Database::in_memory();
        db.execute_ddl("CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .unwrap();
        let count = db
            .execute_in_transaction(&[
                op("SELECT 1", vec![]),
                op("INSERT INTO events (name) VALUES (?1)", vec![json!("x")]),
                op("SELECT name FROM events", vec![]),
                op("INSERT INTO events (name) VALUES (?1) RETURNING id", vec![json!("y")]),
            ])
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(count_events(&db), 2);
    }

    #[test]
    fn test_empty_batch() {
        let db = Database::in_memory();
        assert_eq!(db.execute_in_transaction(&[]).unwrap(), 0);
    }
}
