//! Filter conditions
//!
//! Top-level conditions are AND-ed, members of an OR-group are OR-ed, and raw
//! fragments are inserted as written inside their own parentheses.

use crate::connection::Row;
use crate::model::is_zero;
use serde::Serialize;
use serde_json::Value;

/// Literal SQL fragment with positional `?` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub query: String,
    pub parameters: Vec<Value>,
}

impl Raw {
    pub fn new(query: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            parameters,
        }
    }
}

/// One unit of filter intent
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality on every column in the map (AND-ed)
    Fields(Row),
    /// `(c1 OR c2 OR ...)`
    Or(Vec<Condition>),
    /// Fragment used verbatim, grouped in parentheses
    Raw(Raw),
}

impl Condition {
    /// Equality filter on the populated fields of a model (or any serializable subset)
    ///
    /// Zero-valued fields are skipped, as are nested objects and arrays, so a
    /// partially filled model only filters on what was set.
    pub fn model<T: Serialize>(model: &T) -> Result<Self, serde_json::Error> {
        let fields = match serde_json::to_value(model)? {
            Value::Object(map) => map
                .into_iter()
                .filter(|(_, value)| !is_zero(value) && !value.is_object() && !value.is_array())
                .collect(),
            _ => Row::new(),
        };

        Ok(Self::Fields(fields))
    }

    /// Equality filter on a single column
    ///
    /// On PostgreSQL, string values that parse as RFC 3339 timestamps or UUIDs
    /// are bound as `timestamptz` and `uuid`. Comparing such a value against a
    /// TEXT column fails with `operator does not exist: text = uuid`; cast the
    /// parameter in a raw condition instead:
    ///
    /// ```
    /// use repository::Condition;
    ///
    /// let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
    /// let condition = Condition::raw("external_id = ?::text", vec![id.into()]);
    /// assert!(!condition.is_empty());
    /// ```
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Row::new();
        fields.insert(column.into(), value.into());
        Self::Fields(fields)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::Or(conditions)
    }

    pub fn raw(query: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self::Raw(Raw::new(query, parameters))
    }

    /// Whether this condition contributes nothing to a query
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::Fields(fields) => fields.is_empty(),
            Condition::Or(conditions) => conditions.iter().all(Condition::is_empty),
            Condition::Raw(raw) => raw.query.trim().is_empty(),
        }
    }
}

impl From<Raw> for Condition {
    fn from(raw: Raw) -> Self {
        Condition::Raw(raw)
    }
}
