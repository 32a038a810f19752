//! Object operations: rows of class tables read and written as documents.
//!
//! Every operation accepts a class schema in either public or storage form
//! and an optional [`TransactionalSession`] to run inside. A failure inside
//! a session is recorded there and makes the session roll back on commit.

use crate::{
    error::{is_missing_relation, is_undefined_table, translate_unique_violation},
    executor::{self, execute, Executor},
    row, value, PostgresAdapter, TransactionalSession,
};

use docsql_core::{mapper, Document, Error, Result, Schema};
use docsql_sql::{
    compile_aggregate, compile_count, compile_delete, compile_distinct, compile_find,
    compile_insert, compile_update, mutation::upsert_document, query::compile_count_estimate,
    FindOptions,
};
use serde_json::Value as Json;
use tokio_postgres::Row;
use tracing::debug;

impl PostgresAdapter {
    /// Inserts one object. Unique violations fail with `DuplicateValue`.
    pub async fn create_object(
        &self,
        schema: &Schema,
        object: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<Document> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, "create object");

        let mut exec = self.executor(session).await?;
        let result = insert_in(&mut exec, &storage, object, false).await;
        exec.record(result)?;
        Ok(object.clone())
    }

    /// The objects matching `query`. A class without a table has no
    /// objects. With `options.explain` the query plan is returned instead.
    pub async fn find(
        &self,
        schema: &Schema,
        query: &Document,
        options: &FindOptions,
        session: Option<&TransactionalSession>,
    ) -> Result<Vec<Document>> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, explain = options.explain, "find");

        let mut exec = self.executor(session).await?;
        let result = find_in(&mut exec, &storage, query, options).await;
        exec.record(result)
    }

    /// Counts the objects matching `query`. With an empty query and
    /// `estimate` set, the planner's row estimate is used when available.
    pub async fn count(
        &self,
        schema: &Schema,
        query: &Document,
        estimate: bool,
        session: Option<&TransactionalSession>,
    ) -> Result<i64> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, estimate, "count");

        let mut exec = self.executor(session).await?;
        let result = count_in(&mut exec, &storage, query, estimate).await;
        exec.record(result)
    }

    /// The distinct non-null values of `field` among the objects matching
    /// `query`. Array fields yield their elements.
    pub async fn distinct(
        &self,
        schema: &Schema,
        field: &str,
        query: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<Vec<Json>> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, field, "distinct");

        let mut exec = self.executor(session).await?;
        let result = distinct_in(&mut exec, &storage, field, query).await;
        exec.record(result)
    }

    /// Runs an aggregation pipeline.
    pub async fn aggregate(
        &self,
        schema: &Schema,
        pipeline: &[Json],
        explain: bool,
        session: Option<&TransactionalSession>,
    ) -> Result<Vec<Document>> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, stages = pipeline.len(), "aggregate");

        let mut exec = self.executor(session).await?;
        let result = aggregate_in(&mut exec, &storage, pipeline, explain).await;
        exec.record(result)
    }

    /// Applies `update` to every object matching `query`, returning the
    /// updated objects.
    pub async fn update_objects_by_query(
        &self,
        schema: &Schema,
        query: &Document,
        update: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<Vec<Document>> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, "update objects");

        let mut exec = self.executor(session).await?;
        let result = update_in(&mut exec, &storage, query, update).await;
        exec.record(result)
    }

    /// Like [`update_objects_by_query`](Self::update_objects_by_query),
    /// returning the first updated object.
    pub async fn find_one_and_update(
        &self,
        schema: &Schema,
        query: &Document,
        update: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<Option<Document>> {
        let updated = self
            .update_objects_by_query(schema, query, update, session)
            .await?;
        Ok(updated.into_iter().next())
    }

    /// Updates the object matching `query`, inserting it when none does.
    ///
    /// The inserted object is `query`'s literal constraints overlaid with
    /// `update`. A conflicting insert is skipped rather than failed, so the
    /// fallback update also works inside a transactional session.
    pub async fn upsert_one_object(
        &self,
        schema: &Schema,
        query: &Document,
        update: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<()> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, "upsert object");

        let mut exec = self.executor(session).await?;
        let result = upsert_in(&mut exec, &storage, query, update).await;
        exec.record(result)
    }

    /// Deletes every object matching `query`; an empty query deletes all.
    ///
    /// Fails with `ObjectNotFound` when nothing matched. Deleting from a
    /// class without a table does nothing.
    pub async fn delete_objects_by_query(
        &self,
        schema: &Schema,
        query: &Document,
        session: Option<&TransactionalSession>,
    ) -> Result<()> {
        let storage = schema.to_storage();
        debug!(class_name = %storage.class_name, "delete objects");

        let mut exec = self.executor(session).await?;
        let result = delete_in(&mut exec, &storage, query).await;
        exec.record(result)
    }
}

/// Inserts `object`, returning the number of rows written.
async fn insert_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    object: &Document,
    on_conflict_do_nothing: bool,
) -> Result<u64> {
    let compiled =
        compile_insert(storage, object)?.into_statement(&storage.class_name, on_conflict_do_nothing);
    execute(exec.client(), &compiled.sql, &compiled.params)
        .await
        .map_err(translate_unique_violation)
}

async fn find_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    query: &Document,
    options: &FindOptions,
) -> Result<Vec<Document>> {
    let compiled = compile_find(storage, query, options)?;
    let rows = exec
        .query_recovering(&compiled.sql, &compiled.params, is_missing_relation)
        .await?
        .unwrap_or_default();
    if options.explain {
        return plan(&rows);
    }
    rows.iter().map(|row| row::to_document(row, storage)).collect()
}

/// The rows of an `EXPLAIN`, column name to value.
fn plan(rows: &[Row]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        let mut document = Document::new();
        for (name, value) in row::columns(row)? {
            document.insert(name, mapper::decode(None, value));
        }
        documents.push(document);
    }
    Ok(documents)
}

async fn count_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    query: &Document,
    estimate: bool,
) -> Result<i64> {
    if estimate && query.is_empty() {
        let compiled = compile_count_estimate(&storage.class_name);
        let rows = executor::query(exec.client(), &compiled.sql, &compiled.params).await?;
        if let Some(row) = rows.first() {
            let estimate: Option<f32> = row.try_get(0).map_err(Error::driver)?;
            // Tables never analyzed report -1.
            if let Some(estimate) = estimate.filter(|estimate| *estimate >= 0.0) {
                return Ok(estimate as i64);
            }
        }
    }

    let compiled = compile_count(storage, query)?;
    let rows = exec
        .query_recovering(&compiled.sql, &compiled.params, is_missing_relation)
        .await?
        .unwrap_or_default();
    match rows.first() {
        Some(row) => row.try_get(0).map_err(Error::driver),
        None => Ok(0),
    }
}

async fn distinct_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    field: &str,
    query: &Document,
) -> Result<Vec<Json>> {
    let compiled = compile_distinct(storage, field, query)?;
    let rows = exec
        .query_recovering(&compiled.sql, &compiled.params, is_missing_relation)
        .await?
        .unwrap_or_default();

    let ty = if field.contains('.') {
        None
    } else {
        storage.field_type(field)
    };

    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let value = value::decode(row, 0)?;
        if value.is_null() {
            continue;
        }
        values.push(mapper::decode(ty, value));
    }
    Ok(values)
}

async fn aggregate_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    pipeline: &[Json],
    explain: bool,
) -> Result<Vec<Document>> {
    let aggregate = compile_aggregate(storage, pipeline)?;
    let sql = if explain {
        format!("EXPLAIN (ANALYZE, FORMAT JSON) {}", aggregate.sql)
    } else {
        aggregate.sql.clone()
    };

    let rows = exec
        .query_recovering(&sql, &aggregate.params, is_missing_relation)
        .await?
        .unwrap_or_default();
    if explain {
        return plan(&rows);
    }
    rows.iter()
        .map(|row| Ok(aggregate.shape_row(row::to_document(row, storage)?)))
        .collect()
}

async fn update_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    query: &Document,
    update: &Document,
) -> Result<Vec<Document>> {
    let compiled = compile_update(storage, update)?;
    if compiled.is_empty() {
        // Nothing to assign; report the matching objects unchanged.
        return find_in(exec, storage, query, &FindOptions::default()).await;
    }

    let compiled = compiled.into_statement(storage, query)?;
    let rows = executor::query(exec.client(), &compiled.sql, &compiled.params)
        .await
        .map_err(translate_unique_violation)?;
    rows.iter().map(|row| row::to_document(row, storage)).collect()
}

async fn upsert_in(
    exec: &mut Executor<'_>,
    storage: &Schema,
    query: &Document,
    update: &Document,
) -> Result<()> {
    let document = upsert_document(query, update);
    if insert_in(exec, storage, &document, true).await? == 0 {
        update_in(exec, storage, query, update).await?;
    }
    Ok(())
}

/// Deleting from a class without a table is a no-op.
async fn delete_in(exec: &mut Executor<'_>, storage: &Schema, query: &Document) -> Result<()> {
    let compiled = compile_delete(storage, query)?;
    let Some(rows) = exec
        .query_recovering(&compiled.sql, &compiled.params, is_undefined_table)
        .await?
    else {
        return Ok(());
    };

    let deleted: i64 = match rows.first() {
        Some(row) => row.try_get(0).map_err(Error::driver)?,
        None => 0,
    };
    if deleted == 0 {
        return Err(Error::object_not_found("Object not found."));
    }
    Ok(())
}
