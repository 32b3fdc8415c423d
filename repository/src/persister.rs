//! Repository (query builder)
//!
//! `Repository<M>` accumulates ordering, relations and soft-delete visibility
//! through fluent calls that each return a new value, then composes them into
//! a single statement when a terminal operation runs.

use crate::condition::Condition;
use crate::connection::{BoxError, Connection, Row, Statement};
use crate::errors::{QueryError, RepositoryError};
use crate::model::{from_row, primary_key_value, to_columns, Model};
use crate::ordering::Order;
use crate::relation::{Relation, Relationship};
use crate::sql_generation::SqlGenerator;
use crate::{debug_log, trace_log};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Public repository contract for one entity type
///
/// Fluent methods never mutate the receiver, so one root repository can be
/// shared and specialised per call site.
#[async_trait]
pub trait Persister<M: Model>: Clone + Send + Sync {
    /// Include soft-deleted rows
    fn bypass_delete(&self) -> Self;

    /// Append ordering; repeated calls extend the ORDER BY
    fn order_by(&self, orders: Vec<Order>) -> Self;

    /// Load a relationship through an INNER JOIN; rows without a match are excluded
    fn with(&self, relationship: &str, filters: Vec<Condition>) -> Self;

    /// Load a relationship with a second query after the primary one
    fn then(&self, relationship: &str, filters: Vec<Condition>) -> Self;

    /// Run against another handle, usually a transaction
    fn part_of(&self, connection: Arc<dyn Connection>) -> Self;

    /// Insert a record; the stored row (identity included) is written back into `model`
    async fn create(&self, model: &mut M) -> Result<(), RepositoryError>;

    /// Save every column by primary key, inserting when the row does not exist
    async fn update(&self, model: &mut M) -> Result<(), RepositoryError>;

    /// Soft delete (or physically delete for models without a soft-delete column)
    async fn delete(&self, model: &mut M, filters: Vec<Condition>) -> Result<(), RepositoryError>;

    /// Clear the deleted-at marker of a soft-deleted record
    async fn restore(&self, model: &mut M) -> Result<(), RepositoryError>;

    /// Fetch all matching records; zero rows is `RepositoryError::NoResults`
    async fn get(&self, filters: Vec<Condition>) -> Result<Vec<M>, RepositoryError>;

    /// Fetch the first matching record; zero rows is `RepositoryError::NoResults`
    async fn one(&self, filters: Vec<Condition>) -> Result<M, RepositoryError>;
}

/// Generic repository bound to one model type and one connection handle
pub struct Repository<M: Model> {
    connection: Arc<dyn Connection>,
    pub(crate) order: Vec<Order>,
    pub(crate) relations: Vec<Relation>,
    pub(crate) include_soft_deleted: bool,
    _phantom: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            order: self.order.clone(),
            relations: self.relations.clone(),
            include_soft_deleted: self.include_soft_deleted,
            _phantom: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &M::table_name())
            .field("order", &self.order)
            .field("relations", &self.relations)
            .field("include_soft_deleted", &self.include_soft_deleted)
            .finish()
    }
}

impl<M: Model> Repository<M> {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            order: Vec::new(),
            relations: Vec::new(),
            include_soft_deleted: false,
            _phantom: PhantomData,
        }
    }

    /// The primary SELECT that `get` would run, without executing it
    pub fn select_statement(&self, filters: &[Condition]) -> Result<Statement, QueryError> {
        self.compose(filters, false)
    }

    fn with_relation(&self, relation: Relation) -> Self {
        let mut next = self.clone();
        next.relations.push(relation);
        next
    }

    fn soft_delete_guard(&self) -> Option<&'static str> {
        if self.include_soft_deleted {
            None
        } else {
            M::soft_delete_column()
        }
    }

    /// Related tables follow the same visibility as the root table
    fn related_guard(&self, relationship: &Relationship) -> Option<&'static str> {
        if self.include_soft_deleted {
            None
        } else {
            relationship.soft_delete_column
        }
    }

    fn relationship(key: &str) -> Result<Relationship, QueryError> {
        M::relationships()
            .into_iter()
            .find(|relationship| relationship.name == key)
            .ok_or_else(|| QueryError::UnknownRelationship {
                table: M::table_name().to_string(),
                relationship: key.to_string(),
            })
    }

    /// Build the primary SELECT: joins, filters, soft-delete guard, ordering
    fn compose(&self, filters: &[Condition], first: bool) -> Result<Statement, QueryError> {
        let dialect = self.connection.dialect();
        let mut generator = SqlGenerator::new(dialect);
        let table = M::table_name();
        let quoted = dialect.quote(table);

        let mut sql = format!("SELECT {}.* FROM {}", quoted, quoted);
        let mut parts = Vec::new();

        // Joins precede WHERE in the text, so they bind first. Many-valued
        // relations gate through EXISTS instead of multiplying parent rows.
        let mut gated = Vec::new();
        for relation in &self.relations {
            let relationship = Self::relationship(&relation.key)?;
            if !relation.eager {
                continue;
            }
            if relationship.many {
                gated.push((relationship, relation));
            } else {
                sql.push(' ');
                let guard = self.related_guard(&relationship);
                sql.push_str(&generator.join_clause(
                    table,
                    &relationship,
                    &relation.filters,
                    guard,
                ));
            }
        }

        for (relationship, relation) in gated {
            let guard = self.related_guard(&relationship);
            parts.push(generator.exists_clause(table, &relationship, &relation.filters, guard));
        }

        parts.extend(generator.conditions_sql(table, filters));

        if let Some(column) = self.soft_delete_guard() {
            parts.push(generator.is_null(table, column));
        }

        if !parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&parts.join(" AND "));
        }

        let mut order = self.order.clone();
        if first && order.is_empty() {
            order.push(Order::asc(format!(
                "{}.{}",
                quoted,
                dialect.quote(M::primary_key())
            )));
        }

        let order_clause = SqlGenerator::order_clause(&order);
        if !order_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&order_clause);
        }

        if first {
            sql.push_str(" LIMIT 1");
        }

        Ok(generator.finish(sql))
    }

    /// Run the primary query and every requested secondary fetch
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, BoxError> {
        debug_log!("[FETCH] Table: {}", M::table_name());
        debug_log!("[FETCH] SQL: {}", statement.sql);
        trace_log!("[FETCH] Parameters: {:?}", statement.parameters);

        let mut rows = self.connection.query(statement).await?;
        if rows.is_empty() {
            return Ok(rows);
        }

        for relation in &self.relations {
            let relationship = Self::relationship(&relation.key)?;
            let keys = relationship.parent_keys(&rows);

            let related = if keys.is_empty() {
                Vec::new()
            } else {
                let statement = SqlGenerator::new(self.connection.dialect()).select_related(
                    &relationship,
                    keys,
                    &relation.filters,
                    self.related_guard(&relationship),
                );
                debug_log!("[FETCH] Relation {} SQL: {}", relation.key, statement.sql);
                self.connection.query(&statement).await?
            };

            relationship.attach(&mut rows, related);
        }

        Ok(rows)
    }

    async fn insert(&self, model: &mut M) -> Result<(), BoxError> {
        let mut columns = to_columns(&*model)?;
        if primary_key_value::<M>(&columns).is_none() {
            columns.remove(M::primary_key());
        }

        let statement =
            SqlGenerator::new(self.connection.dialect()).insert(M::table_name(), &columns);
        debug_log!("[CREATE] SQL: {}", statement.sql);

        let rows = self.connection.query(&statement).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(QueryError::NoRowReturned("INSERT"))?;

        write_back(model, row)?;
        Ok(())
    }

    async fn save(&self, model: &mut M) -> Result<(), BoxError> {
        let columns = to_columns(&*model)?;
        if primary_key_value::<M>(&columns).is_none() {
            return self.insert(model).await;
        }

        let dialect = self.connection.dialect();
        let mut rows = Vec::new();
        if columns.keys().any(|column| column.as_str() != M::primary_key()) {
            let statement = SqlGenerator::new(dialect).update(
                M::table_name(),
                M::primary_key(),
                &columns,
                self.soft_delete_guard(),
            );
            debug_log!("[UPDATE] SQL: {}", statement.sql);

            rows = self.connection.query(&statement).await?;
        }

        if rows.is_empty() {
            let statement =
                SqlGenerator::new(dialect).upsert(M::table_name(), M::primary_key(), &columns);
            debug_log!("[UPDATE] No row matched, upserting: {}", statement.sql);
            rows = self.connection.query(&statement).await?;
        }

        if let Some(row) = rows.into_iter().next() {
            write_back(model, row)?;
        }

        Ok(())
    }

    async fn remove(&self, model: &mut M, filters: Vec<Condition>) -> Result<(), BoxError> {
        let columns = to_columns(&*model)?;
        let id = primary_key_value::<M>(&columns);

        let mut conditions = Vec::with_capacity(filters.len() + 1);
        if let Some(id) = &id {
            conditions.push(Condition::eq(M::primary_key(), id.clone()));
        }
        conditions.extend(filters.into_iter().filter(|filter| !filter.is_empty()));

        if conditions.is_empty() {
            return Err(QueryError::MissingWhereClause.into());
        }

        let table = M::table_name();
        let mut generator = SqlGenerator::new(self.connection.dialect());
        let where_clause = generator.where_clause(table, &conditions, self.soft_delete_guard());

        match M::soft_delete_column() {
            Some(column) => {
                let statement = generator.soft_delete(table, column, &where_clause);
                debug_log!("[DELETE] SQL: {}", statement.sql);

                let rows = self.connection.query(&statement).await?;
                let deleted = rows.into_iter().find(|row| match &id {
                    Some(id) => row.get(M::primary_key()) == Some(id),
                    None => false,
                });
                if let Some(row) = deleted {
                    write_back(model, row)?;
                }
            }
            None => {
                let statement = generator.delete(table, &where_clause);
                debug_log!("[DELETE] SQL: {}", statement.sql);

                self.connection.execute(&statement).await?;
            }
        }

        Ok(())
    }

    async fn unmark(&self, model: &mut M) -> Result<(), BoxError> {
        let column = M::soft_delete_column()
            .ok_or_else(|| QueryError::NoSoftDelete(M::table_name().to_string()))?;

        let columns = to_columns(&*model)?;
        let id = primary_key_value::<M>(&columns).ok_or(QueryError::MissingWhereClause)?;

        let statement = SqlGenerator::new(self.connection.dialect()).restore(
            M::table_name(),
            column,
            M::primary_key(),
            id,
        );
        debug_log!("[RESTORE] SQL: {}", statement.sql);

        let rows = self.connection.query(&statement).await?;
        if let Some(row) = rows.into_iter().next() {
            write_back(model, row)?;
        }

        Ok(())
    }
}

/// Overlay a returned row onto the model, keeping fields the row does not carry (loaded relations)
fn write_back<M: Model>(model: &mut M, row: Row) -> Result<(), QueryError> {
    let mut merged = match serde_json::to_value(&*model)? {
        Value::Object(current) => current,
        _ => Row::new(),
    };
    merged.extend(row);

    *model = from_row(merged)?;
    Ok(())
}

#[async_trait]
impl<M: Model> Persister<M> for Repository<M> {
    fn bypass_delete(&self) -> Self {
        let mut next = self.clone();
        next.include_soft_deleted = true;
        next
    }

    fn order_by(&self, orders: Vec<Order>) -> Self {
        let mut next = self.clone();
        next.order.extend(orders);
        next
    }

    fn with(&self, relationship: &str, filters: Vec<Condition>) -> Self {
        self.with_relation(Relation::joined(relationship, filters))
    }

    fn then(&self, relationship: &str, filters: Vec<Condition>) -> Self {
        self.with_relation(Relation::preloaded(relationship, filters))
    }

    fn part_of(&self, connection: Arc<dyn Connection>) -> Self {
        let mut next = self.clone();
        next.connection = connection;
        next
    }

    async fn create(&self, model: &mut M) -> Result<(), RepositoryError> {
        self.insert(model)
            .await
            .map_err(|e| RepositoryError::persistence("unable to create record", e))
    }

    async fn update(&self, model: &mut M) -> Result<(), RepositoryError> {
        self.save(model)
            .await
            .map_err(|e| RepositoryError::persistence("unable to update record", e))
    }

    async fn delete(&self, model: &mut M, filters: Vec<Condition>) -> Result<(), RepositoryError> {
        self.remove(model, filters)
            .await
            .map_err(|e| RepositoryError::persistence("unable to delete record", e))
    }

    async fn restore(&self, model: &mut M) -> Result<(), RepositoryError> {
        self.unmark(model)
            .await
            .map_err(|e| RepositoryError::persistence("unable to restore record", e))
    }

    async fn get(&self, filters: Vec<Condition>) -> Result<Vec<M>, RepositoryError> {
        const CONTEXT: &str = "unable to fetch records";

        let statement = self
            .compose(&filters, false)
            .map_err(|e| RepositoryError::persistence(CONTEXT, e))?;
        let rows = self
            .fetch(&statement)
            .await
            .map_err(|e| RepositoryError::persistence(CONTEXT, e))?;

        if rows.is_empty() {
            return Err(RepositoryError::NoResults);
        }

        rows.into_iter()
            .map(from_row::<M>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryError::persistence(CONTEXT, e))
    }

    async fn one(&self, filters: Vec<Condition>) -> Result<M, RepositoryError> {
        const CONTEXT: &str = "unable to fetch record";

        let statement = self
            .compose(&filters, true)
            .map_err(|e| RepositoryError::persistence(CONTEXT, e))?;
        let rows = self
            .fetch(&statement)
            .await
            .map_err(|e| RepositoryError::persistence(CONTEXT, e))?;

        let row = rows.into_iter().next().ok_or(RepositoryError::NoResults)?;
        from_row(row).map_err(|e| RepositoryError::persistence(CONTEXT, e))
    }
}
