pub mod query;
mod record;
mod sync_log;

pub use query::{BatchBody, BatchOperation, QueryRequest, QueryResult, SchemaRequest};
pub use record::{KeyEntry, Record, RecordStats, StoreReceipt, StoreRequest};
pub use sync_log::{SyncLogEntry, SyncReceipt, SyncRequest};
