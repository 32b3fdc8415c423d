//! SQL generation
//!
//! Renders conditions, joins, ordering and write statements. Parameters are
//! collected in the order their placeholders appear in the text.

use crate::condition::{Condition, Raw};
use crate::connection::{Dialect, Row, Statement};
use crate::ordering::Order;
use crate::relation::Relationship;
use serde_json::Value;

pub struct SqlGenerator {
    dialect: Dialect,
    values: Vec<Value>,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Finish with the given SQL text and the parameters collected so far
    pub fn finish(self, sql: String) -> Statement {
        Statement::new(sql, self.values)
    }

    fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    fn column(&self, table: &str, column: &str) -> String {
        format!("{}.{}", self.dialect.quote(table), self.dialect.quote(column))
    }

    /// Render one condition against `table`; empty conditions render as ""
    pub fn condition_sql(&mut self, table: &str, condition: &Condition) -> String {
        match condition {
            Condition::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(column, value)| {
                        let column = self.column(table, column);
                        if value.is_null() {
                            format!("{} IS NULL", column)
                        } else {
                            let param = self.bind(value.clone());
                            format!("{} = {}", column, param)
                        }
                    })
                    .collect();

                match parts.len() {
                    0 => String::new(),
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => format!("({})", parts.join(" AND ")),
                }
            }
            Condition::Or(conditions) => {
                let parts: Vec<String> = conditions
                    .iter()
                    .map(|c| self.condition_sql(table, c))
                    .filter(|s| !s.is_empty())
                    .collect();

                match parts.len() {
                    0 => String::new(),
                    1 => parts.into_iter().next().unwrap_or_default(),
                    _ => format!("({})", parts.join(" OR ")),
                }
            }
            Condition::Raw(raw) => self.raw_sql(raw),
        }
    }

    fn raw_sql(&mut self, raw: &Raw) -> String {
        let query = raw.query.trim();
        if query.is_empty() {
            return String::new();
        }

        let mut rendered = String::with_capacity(query.len() + 8);
        let mut next = self.values.len();
        for c in query.chars() {
            if c == '?' {
                next += 1;
                rendered.push_str(&self.dialect.placeholder(next));
            } else {
                rendered.push(c);
            }
        }
        self.values.extend(raw.parameters.iter().cloned());

        // Always grouped so neighbouring AND terms bind to the whole fragment
        format!("({})", rendered)
    }

    /// AND together all non-empty conditions
    pub fn conditions_sql(&mut self, table: &str, conditions: &[Condition]) -> Vec<String> {
        conditions
            .iter()
            .map(|condition| self.condition_sql(table, condition))
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// `WHERE ...` from conditions plus the soft-delete guard, or "" when there is nothing to filter
    pub fn where_clause(
        &mut self,
        table: &str,
        conditions: &[Condition],
        soft_delete: Option<&str>,
    ) -> String {
        let mut parts = self.conditions_sql(table, conditions);

        if let Some(column) = soft_delete {
            parts.push(self.is_null(table, column));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", parts.join(" AND "))
        }
    }

    /// Key equality, sub-filters and the related soft-delete guard, all against the alias
    fn related_predicates(
        &mut self,
        parent_table: &str,
        relationship: &Relationship,
        filters: &[Condition],
        soft_delete: Option<&str>,
    ) -> Vec<String> {
        let mut on = vec![format!(
            "{} = {}",
            self.column(relationship.name, relationship.foreign_column),
            self.column(parent_table, relationship.local_column)
        )];
        on.extend(self.conditions_sql(relationship.name, filters));
        if let Some(column) = soft_delete {
            on.push(self.is_null(relationship.name, column));
        }
        on
    }

    /// `INNER JOIN "<table>" AS "<name>" ON ...`, sub-filters qualified with the alias
    pub fn join_clause(
        &mut self,
        parent_table: &str,
        relationship: &Relationship,
        filters: &[Condition],
        soft_delete: Option<&str>,
    ) -> String {
        let on = self.related_predicates(parent_table, relationship, filters, soft_delete);

        format!(
            "INNER JOIN {} AS {} ON {}",
            self.dialect.quote(relationship.table),
            self.dialect.quote(relationship.name),
            on.join(" AND ")
        )
    }

    /// `EXISTS (...)` gate for a many-valued relationship
    pub fn exists_clause(
        &mut self,
        parent_table: &str,
        relationship: &Relationship,
        filters: &[Condition],
        soft_delete: Option<&str>,
    ) -> String {
        let on = self.related_predicates(parent_table, relationship, filters, soft_delete);

        format!(
            "EXISTS (SELECT 1 FROM {} AS {} WHERE {})",
            self.dialect.quote(relationship.table),
            self.dialect.quote(relationship.name),
            on.join(" AND ")
        )
    }

    /// `"table"."column" IS NULL`
    pub fn is_null(&self, table: &str, column: &str) -> String {
        format!("{} IS NULL", self.column(table, column))
    }

    /// Build ORDER BY clause
    pub fn order_clause(orders: &[Order]) -> String {
        if orders.is_empty() {
            return String::new();
        }

        let items: Vec<String> = orders.iter().map(Order::to_sql).collect();
        format!("ORDER BY {}", items.join(", "))
    }

    /// Fetch related rows for a set of parent key values, under the same alias joins use
    pub fn select_related(
        mut self,
        relationship: &Relationship,
        keys: Vec<Value>,
        filters: &[Condition],
        soft_delete: Option<&str>,
    ) -> Statement {
        let alias = relationship.name;
        let placeholders: Vec<String> = keys.into_iter().map(|key| self.bind(key)).collect();

        let mut parts = vec![format!(
            "{} IN ({})",
            self.column(alias, relationship.foreign_column),
            placeholders.join(", ")
        )];
        parts.extend(self.conditions_sql(alias, filters));
        if let Some(column) = soft_delete {
            parts.push(self.is_null(alias, column));
        }

        let quoted = self.dialect.quote(alias);
        let sql = format!(
            "SELECT {}.* FROM {} AS {} WHERE {}",
            quoted,
            self.dialect.quote(relationship.table),
            quoted,
            parts.join(" AND ")
        );
        self.finish(sql)
    }

    /// `INSERT INTO t (...) VALUES (...) RETURNING *`
    pub fn insert(mut self, table: &str, columns: &Row) -> Statement {
        let sql = self.insert_sql(table, columns);
        self.finish(format!("{} RETURNING *", sql))
    }

    fn insert_sql(&mut self, table: &str, columns: &Row) -> String {
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.dialect.quote(table));
        }

        let names: Vec<String> = columns.keys().map(|c| self.dialect.quote(c)).collect();
        let placeholders: Vec<String> = columns.values().map(|v| self.bind(v.clone())).collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.quote(table),
            names.join(", "),
            placeholders.join(", ")
        )
    }

    /// Full-row update by primary key; callers skip it when only the key is present
    pub fn update(
        mut self,
        table: &str,
        primary_key: &str,
        columns: &Row,
        soft_delete: Option<&str>,
    ) -> Statement {
        let assignments: Vec<String> = columns
            .iter()
            .filter(|(column, _)| column.as_str() != primary_key)
            .map(|(column, value)| {
                let column = self.dialect.quote(column);
                let param = self.bind(value.clone());
                format!("{} = {}", column, param)
            })
            .collect();

        let id = columns.get(primary_key).cloned().unwrap_or(Value::Null);
        let mut conditions = vec![format!(
            "{} = {}",
            self.column(table, primary_key),
            self.bind(id)
        )];
        if let Some(column) = soft_delete {
            conditions.push(format!("{} IS NULL", self.column(table, column)));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} RETURNING *",
            self.dialect.quote(table),
            assignments.join(", "),
            conditions.join(" AND ")
        );
        self.finish(sql)
    }

    /// Insert including the primary key, overwriting an existing row with the same key
    pub fn upsert(mut self, table: &str, primary_key: &str, columns: &Row) -> Statement {
        let insert = self.insert_sql(table, columns);
        let assignments: Vec<String> = columns
            .keys()
            .filter(|column| column.as_str() != primary_key)
            .map(|column| {
                let column = self.dialect.quote(column);
                format!("{} = EXCLUDED.{}", column, column)
            })
            .collect();

        let conflict = if assignments.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", assignments.join(", "))
        };

        let sql = format!(
            "{} ON CONFLICT ({}) {} RETURNING *",
            insert,
            self.dialect.quote(primary_key),
            conflict
        );
        self.finish(sql)
    }

    /// Mark rows deleted; `where_clause` must come from this generator
    pub fn soft_delete(self, table: &str, column: &str, where_clause: &str) -> Statement {
        let sql = format!(
            "UPDATE {} SET {} = {} {} RETURNING *",
            self.dialect.quote(table),
            self.dialect.quote(column),
            self.dialect.now(),
            where_clause
        );
        self.finish(sql)
    }

    /// Physically remove rows; `where_clause` must come from this generator
    pub fn delete(self, table: &str, where_clause: &str) -> Statement {
        let sql = format!("DELETE FROM {} {}", self.dialect.quote(table), where_clause);
        self.finish(sql)
    }

    /// Clear the deleted-at marker by primary key, ignoring scoping
    pub fn restore(mut self, table: &str, column: &str, primary_key: &str, id: Value) -> Statement {
        let sql = format!(
            "UPDATE {} SET {} = NULL WHERE {} = {} RETURNING *",
            self.dialect.quote(table),
            self.dialect.quote(column),
            self.column(table, primary_key),
            self.bind(id)
        );
        self.finish(sql)
    }
}
