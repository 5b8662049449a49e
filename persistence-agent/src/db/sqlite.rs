use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use crate::config::{Config, DatabaseLocation};
use crate::error::AgentResult;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Pool sizing and driver timeouts
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 16,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_connections: config.max_connections,
            connection_timeout: Duration::from_secs(config.connection_timeout_secs),
            busy_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }
}

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn from_config(config: &Config) -> AgentResult<Self> {
        if config.is_remote_database() {
            log::warn!(
                "Remote database URL {} is served from the local replica at {} (token configured: {})",
                config.database_url,
                config.local_replica_path,
                config.database_auth_token.is_some()
            );
        }
        Self::open(&config.database_location(), &PoolOptions::from_config(config))
    }

    pub fn open(location: &DatabaseLocation, options: &PoolOptions) -> AgentResult<Self> {
        let busy_timeout = options.busy_timeout;

        let (manager, max_size) = match location {
            // Every in-memory connection is its own database, so the pool holds one
            DatabaseLocation::Memory => (SqliteConnectionManager::memory(), 1),
            DatabaseLocation::File(path) => {
                // Create parent directory if it doesn't exist
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).ok();
                    }
                }
                (SqliteConnectionManager::file(path), options.max_connections)
            }
        };

        let is_file = matches!(location, DatabaseLocation::File(_));
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if is_file {
                conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(options.connection_timeout)
            .build(manager)?;

        let db = Self { pool };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::open(&DatabaseLocation::Memory, &PoolOptions::default())
            .expect("in-memory database")
    }

    /// Check out a pooled connection.
    pub fn conn(&self) -> AgentResult<DbConn> {
        Ok(self.pool.get()?)
    }

    fn init(&self) -> AgentResult<()> {
        let conn = self.conn()?;

        // Key/value records, one live row per (agent_id, key)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_data (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                session_id TEXT,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                expires_at TEXT,
                UNIQUE(agent_id, key)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_agent_data_session ON agent_data(session_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_agent_data_expires ON agent_data(expires_at)",
            [],
        )?;

        // Sync audit trail, append-only
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sync_logs (
                id TEXT PRIMARY KEY,
                source_agent TEXT NOT NULL,
                target_agent TEXT,
                operation TEXT NOT NULL,
                data TEXT,
                status TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Liveness check used by the health endpoint.
    pub fn ping(&self) -> bool {
        match self.conn() {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            Err(e) => {
                log::error!("Database ping failed: {}", e);
                false
            }
        }
    }
}
