use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Map<String, Value>>,
    pub columns: Vec<String>,
    #[serde(rename = "rowsAffected")]
    pub rows_affected: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchOperation {
    pub sql: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// `POST /api/batch` accepts a bare array or `{"operations": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchBody {
    List(Vec<BatchOperation>),
    Wrapped { operations: Vec<BatchOperation> },
}

impl BatchBody {
    pub fn into_operations(self) -> Vec<BatchOperation> {
        match self {
            BatchBody::List(ops) => ops,
            BatchBody::Wrapped { operations } => operations,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub constraints: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaRequest {
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}
