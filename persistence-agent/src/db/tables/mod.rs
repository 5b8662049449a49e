//! Database model modules - extends Database with domain-specific methods
//!
//! Each module adds `impl Database` blocks with methods for a specific table.

pub mod agent_data; // agent_data (key/value records with TTL)
pub mod sync_logs;  // sync_logs (append-only sync audit trail)
