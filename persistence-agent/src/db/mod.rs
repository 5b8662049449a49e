mod sqlite;
pub mod statements;
pub mod tables;
pub mod values;

pub use sqlite::Database;

use chrono::{DateTime, SecondsFormat, Utc};

/// Canonical timestamp encoding for every TEXT time column.
/// Fixed width + `Z` suffix keeps string comparison chronological.
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
