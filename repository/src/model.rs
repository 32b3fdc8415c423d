//! Model contract
//!
//! Column mapping is serde's job: a model serializes into a JSON object keyed by
//! column name, and rows are deserialized back into it.

use crate::connection::Row;
use crate::errors::QueryError;
use crate::relation::Relationship;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// Capability every persisted entity satisfies
///
/// Usually derived:
/// ```ignore
/// use repository::Model;
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize, Model)]
/// #[model(table = "posts")]
/// pub struct Post {
///     pub id: i64,
///     pub title: String,
///     pub deleted_at: Option<DateTime<Utc>>,
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + Debug + 'static {
    /// The table name in the database
    fn table_name() -> &'static str;

    /// The primary key column
    fn primary_key() -> &'static str {
        "id"
    }

    /// The nullable deleted-at column; `None` makes deletes physical
    fn soft_delete_column() -> Option<&'static str> {
        Some("deleted_at")
    }

    /// Associations that can be loaded with `with`/`then`
    fn relationships() -> Vec<Relationship> {
        Vec::new()
    }
}

/// Whether a serialized field holds its zero value
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Serialize a model into its column map, dropping relationship fields
pub(crate) fn to_columns<M: Model>(model: &M) -> Result<Row, QueryError> {
    let mut row = match serde_json::to_value(model)? {
        Value::Object(row) => row,
        other => {
            return Err(QueryError::Decode {
                table: M::table_name().to_string(),
                message: format!("model serialized to a non-object value: {}", other),
            })
        }
    };

    for relationship in M::relationships() {
        row.remove(relationship.name);
    }

    Ok(row)
}

/// Primary key value of a model, `None` when it is still zero
pub(crate) fn primary_key_value<M: Model>(columns: &Row) -> Option<Value> {
    columns
        .get(M::primary_key())
        .filter(|value| !is_zero(value))
        .cloned()
}

/// Decode a row into a model
pub(crate) fn from_row<M: Model>(row: Row) -> Result<M, QueryError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| QueryError::Decode {
        table: M::table_name().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_values() {
        assert!(is_zero(&json!(null)));
        assert!(is_zero(&json!(false)));
        assert!(is_zero(&json!(0)));
        assert!(is_zero(&json!(0.0)));
        assert!(is_zero(&json!("")));
        assert!(is_zero(&json!([])));
        assert!(is_zero(&json!({})));

        assert!(!is_zero(&json!(true)));
        assert!(!is_zero(&json!(-1)));
        assert!(!is_zero(&json!("x")));
        assert!(!is_zero(&json!([0])));
    }
}
