//! Conversions between JSON request arguments and SQLite values.

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

/// Bind a JSON argument as a SQLite parameter.
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                // u64 beyond i64::MAX and floats both land here
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

pub fn json_args_to_sql(args: &[Value]) -> Vec<SqlValue> {
    args.iter().map(json_to_sql).collect()
}

/// Render a column value for a JSON response.
pub fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::Array(bytes.iter().map(|b| Value::Number((*b).into())).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_sql() {
        assert_eq!(json_to_sql(&Value::Null), SqlValue::Null);
        assert_eq!(json_to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(json_to_sql(&json!(42)), SqlValue::Integer(42));
        assert_eq!(json_to_sql(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(json_to_sql(&json!("a1")), SqlValue::Text("a1".to_string()));
        assert_eq!(
            json_to_sql(&json!({"x": 1})),
            SqlValue::Text(r#"{"x":1}"#.to_string())
        );
    }

    #[test]
    fn test_sql_to_json() {
        assert_eq!(sql_to_json(ValueRef::Null), Value::Null);
        assert_eq!(sql_to_json(ValueRef::Integer(7)), json!(7));
        assert_eq!(sql_to_json(ValueRef::Real(0.25)), json!(0.25));
        assert_eq!(sql_to_json(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(sql_to_json(ValueRef::Text(b"k1")), json!("k1"));
        assert_eq!(sql_to_json(ValueRef::Blob(&[1, 2])), json!([1, 2]));
    }
}
