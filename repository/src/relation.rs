//! Relation descriptors
//!
//! `Relationship` is model metadata (how two tables connect); `Relation` is a
//! per-query request to load one of them.

use crate::condition::Condition;
use crate::connection::Row;
use serde_json::Value;
use std::collections::HashMap;

/// Request to load an association alongside the primary query
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub key: String,
    /// `true`: INNER JOIN, rows without a match are dropped. `false`: secondary fetch only.
    pub eager: bool,
    pub filters: Vec<Condition>,
}

impl Relation {
    pub fn joined(key: impl Into<String>, filters: Vec<Condition>) -> Self {
        Self {
            key: key.into(),
            eager: true,
            filters,
        }
    }

    pub fn preloaded(key: impl Into<String>, filters: Vec<Condition>) -> Self {
        Self {
            key: key.into(),
            eager: false,
            filters,
        }
    }
}

/// How a model's table connects to a related table
///
/// Parent rows match related rows where `parent.local_column = related.foreign_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Field the related data is loaded into, also the join alias
    pub name: &'static str,
    pub table: &'static str,
    pub local_column: &'static str,
    pub foreign_column: &'static str,
    /// Load as a list instead of a single value
    pub many: bool,
    /// Deleted-at column of the related model; rows with it set stay hidden
    pub soft_delete_column: Option<&'static str>,
}

impl Relationship {
    /// The parent holds the foreign key (`posts.author_id -> authors.id`)
    pub fn belongs_to(
        name: &'static str,
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            local_column,
            foreign_column,
            many: false,
            soft_delete_column: None,
        }
    }

    /// The related table holds the foreign key, at most one row
    pub fn has_one(
        name: &'static str,
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            local_column,
            foreign_column,
            many: false,
            soft_delete_column: None,
        }
    }

    /// The related table holds the foreign key, any number of rows
    pub fn has_many(
        name: &'static str,
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            local_column,
            foreign_column,
            many: true,
            soft_delete_column: None,
        }
    }

    /// Scope the related table by its own deleted-at column
    pub fn soft_deleted_by(mut self, column: Option<&'static str>) -> Self {
        self.soft_delete_column = column;
        self
    }

    /// Distinct non-null values of the local column across parent rows, in first-seen order
    pub(crate) fn parent_keys(&self, parents: &[Row]) -> Vec<Value> {
        let mut seen = std::collections::HashSet::new();
        parents
            .iter()
            .filter_map(|row| row.get(self.local_column))
            .filter(|value| !value.is_null())
            .filter(|value| seen.insert(key_of(value)))
            .cloned()
            .collect()
    }

    /// Store related rows into their parents under `name`
    pub(crate) fn attach(&self, parents: &mut [Row], related: Vec<Row>) {
        let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
        for row in related {
            if let Some(key) = row.get(self.foreign_column).map(key_of) {
                grouped.entry(key).or_default().push(Value::Object(row));
            }
        }

        for parent in parents.iter_mut() {
            let matches = parent
                .get(self.local_column)
                .filter(|value| !value.is_null())
                .and_then(|value| grouped.get(&key_of(value)));

            let loaded = match (self.many, matches) {
                (true, Some(rows)) => Value::Array(rows.clone()),
                (true, None) => Value::Array(Vec::new()),
                (false, Some(rows)) => rows.first().cloned().unwrap_or(Value::Null),
                (false, None) => Value::Null,
            };

            parent.insert(self.name.to_string(), loaded);
        }
    }
}

/// Comparable key for a column value; numbers and their string form collide on purpose
fn key_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_relation_constructors() {
        let joined = Relation::joined("author", vec![]);
        assert!(joined.eager);
        assert_eq!(joined.key, "author");

        let preloaded = Relation::preloaded("comments", vec![Condition::eq("approved", true)]);
        assert!(!preloaded.eager);
        assert_eq!(preloaded.filters.len(), 1);
    }

    #[test]
    fn test_soft_deleted_by() {
        let relationship = Relationship::has_many("comments", "comments", "id", "post_id");
        assert_eq!(relationship.soft_delete_column, None);

        let scoped = relationship.soft_deleted_by(Some("deleted_at"));
        assert_eq!(scoped.soft_delete_column, Some("deleted_at"));
        assert!(scoped.many);
    }

    #[test]
    fn test_parent_keys_are_distinct_and_skip_null() {
        let relationship = Relationship::belongs_to("author", "authors", "author_id", "id");
        let parents = vec![
            row(json!({"id": 1, "author_id": 7})),
            row(json!({"id": 2, "author_id": null})),
            row(json!({"id": 3, "author_id": 7})),
            row(json!({"id": 4, "author_id": 9})),
        ];

        assert_eq!(relationship.parent_keys(&parents), vec![json!(7), json!(9)]);
    }

    #[test]
    fn test_attach_many() {
        let relationship = Relationship::has_many("comments", "comments", "id", "post_id");
        let mut parents = vec![row(json!({"id": 1})), row(json!({"id": 2}))];
        let related = vec![
            row(json!({"id": 10, "post_id": 1})),
            row(json!({"id": 11, "post_id": 1})),
        ];

        relationship.attach(&mut parents, related);

        assert_eq!(parents[0]["comments"].as_array().map(Vec::len), Some(2));
        assert_eq!(parents[1]["comments"], json!([]));
    }

    #[test]
    fn test_attach_single() {
        let relationship = Relationship::belongs_to("author", "authors", "author_id", "id");
        let mut parents = vec![
            row(json!({"id": 1, "author_id": 7})),
            row(json!({"id": 2, "author_id": 8})),
        ];
        let related = vec![row(json!({"id": 7, "name": "ada"}))];

        relationship.attach(&mut parents, related);

        assert_eq!(parents[0]["author"], json!({"id": 7, "name": "ada"}));
        assert_eq!(parents[1]["author"], Value::Null);
    }
}
