//! The schema synchronization engine: class tables, their columns and the
//! `_SCHEMA` catalog kept in step with them.

use crate::{
    error::{is_duplicate_column, is_undefined_table, is_unique_violation, recover_missing},
    executor::{self, batch, execute, query},
    PostgresAdapter,
};

use docsql_core::{
    schema::{is_join_table, CATALOG_TABLE},
    Error, Field, Result, Schema, Value,
};
use docsql_sql::{Serializer, Statement};
use serde_json::Value as Json;
use tokio_postgres::GenericClient;
use tracing::debug;

pub(crate) async fn ensure_catalog<C: GenericClient>(client: &C) -> Result<()> {
    batch(client, &Serializer::postgresql().serialize(&Statement::create_catalog())).await
}

/// Creates the class table and the join tables of its Relation fields.
async fn create_tables<C: GenericClient>(client: &C, storage: &Schema) -> Result<()> {
    let serializer = Serializer::postgresql();
    batch(client, &serializer.serialize(&Statement::create_table(storage))).await?;
    for (field, _) in storage.relations() {
        let stmt = Statement::create_join_table(&storage.class_name, field);
        batch(client, &serializer.serialize(&stmt)).await?;
    }
    Ok(())
}

async fn insert_catalog_row<C: GenericClient>(
    client: &C,
    storage: &Schema,
    on_conflict_do_nothing: bool,
) -> Result<()> {
    let mut sql = format!(
        r#"INSERT INTO "{CATALOG_TABLE}" ("className", "schema", "isParseClass") VALUES ($1, $2, true)"#
    );
    if on_conflict_do_nothing {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }
    let values = [
        Value::from(storage.class_name.as_str()),
        Value::Json(serde_json::to_value(storage)?),
    ];
    execute(client, &sql, &values).await?;
    Ok(())
}

fn parse_schema(row: &tokio_postgres::Row) -> Result<Schema> {
    let json: Json = row.try_get(0).map_err(Error::driver)?;
    Ok(serde_json::from_value(json)?)
}

impl PostgresAdapter {
    /// Creates the table backing a class, its join tables, its declared
    /// indexes and its catalog row, all in one transaction.
    ///
    /// Fails with `DuplicateValue` when the class is already catalogued.
    pub async fn create_class(&self, schema: &Schema) -> Result<Schema> {
        let class_name = schema.class_name.as_str();
        debug!(class_name, "create class");

        let storage = schema.to_storage();
        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;

        ensure_catalog(&tx).await?;
        create_tables(&tx, &storage).await?;
        insert_catalog_row(&tx, &storage, false)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    Error::duplicate_value(format!("Class {class_name} already exists."))
                } else {
                    err
                }
            })?;
        for (name, keys) in &storage.indexes {
            crate::indexes::create_index(&tx, class_name, name, keys).await?;
        }
        executor::commit(tx).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(storage.to_public())
    }

    /// Adds a column for `field`, creating the class when its table does
    /// not exist yet, and records the field in the catalog.
    ///
    /// Adding a field the catalog already holds with the same type does
    /// nothing. Holding it with a different type means another request
    /// added it concurrently and fails with `SchemaConflict`.
    pub async fn add_field_if_not_exists(
        &self,
        class_name: &str,
        field_name: &str,
        field: &Field,
    ) -> Result<()> {
        debug!(class_name, field_name, ty = field.ty.name(), "add field");

        let mut conn = self.pool.get().await?;
        let mut tx = executor::transaction(&mut conn).await?;

        match field.ty.column_type() {
            Some(column_type) => {
                let sql = Serializer::postgresql().serialize(&Statement::add_column(
                    class_name,
                    field_name,
                    column_type,
                ));
                let savepoint = tx.savepoint("add_field").await.map_err(Error::driver)?;
                let result = batch(&savepoint, &sql).await;
                match result {
                    Ok(()) => executor::commit(savepoint).await?,
                    Err(err) if is_undefined_table(&err) => {
                        savepoint.rollback().await.map_err(Error::driver)?;
                        let storage = Schema::new(class_name)
                            .field(field_name, field.ty.clone())
                            .to_storage();
                        ensure_catalog(&tx).await?;
                        create_tables(&tx, &storage).await?;
                        insert_catalog_row(&tx, &storage, true).await?;
                    }
                    Err(err) if is_duplicate_column(&err) => {
                        savepoint.rollback().await.map_err(Error::driver)?;
                    }
                    Err(err) => return Err(err),
                }
            }
            None => {
                let stmt = Statement::create_join_table(class_name, field_name);
                batch(&tx, &Serializer::postgresql().serialize(&stmt)).await?;
            }
        }

        let rows = query(
            &tx,
            &format!(
                r#"SELECT "schema"->'fields'->$2::text FROM "{CATALOG_TABLE}" WHERE "className" = $1 FOR UPDATE"#
            ),
            &[Value::from(class_name), Value::from(field_name)],
        )
        .await?;

        match rows.first() {
            None => {
                let storage = Schema::new(class_name)
                    .field(field_name, field.ty.clone())
                    .to_storage();
                insert_catalog_row(&tx, &storage, true).await?;
            }
            Some(row) => {
                let existing: Option<Json> = row.try_get(0).map_err(Error::driver)?;
                match existing {
                    Some(existing) => {
                        let existing: Field = serde_json::from_value(existing)?;
                        if existing.ty != field.ty {
                            return Err(Error::schema_conflict(class_name, field_name));
                        }
                    }
                    None => {
                        let path = vec!["fields".to_string(), field_name.to_string()];
                        patch_catalog(&tx, class_name, path, serde_json::to_value(field)?).await?;
                    }
                }
            }
        }

        executor::commit(tx).await?;
        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    /// Replaces the catalog options (`required`, `defaultValue`) of an
    /// existing field.
    pub async fn update_field_options(
        &self,
        class_name: &str,
        field_name: &str,
        field: &Field,
    ) -> Result<()> {
        debug!(class_name, field_name, "update field options");

        let conn = self.pool.get().await?;
        let path = vec!["fields".to_string(), field_name.to_string()];
        patch_catalog(conn.client(), class_name, path, serde_json::to_value(field)?).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    /// Adds a column for every declared field missing from the class
    /// table, creating the table first when needed.
    pub async fn schema_upgrade(&self, schema: &Schema) -> Result<()> {
        let class_name = schema.class_name.as_str();
        debug!(class_name, "schema upgrade");

        let conn = self.pool.get().await?;
        let rows = query(
            conn.client(),
            "SELECT column_name::text FROM information_schema.columns WHERE table_name::text = $1",
            &[Value::from(class_name)],
        )
        .await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(row.try_get::<_, String>(0).map_err(Error::driver)?);
        }
        drop(conn);

        for (name, field) in &schema.to_storage().fields {
            if field.is_relation() || columns.iter().any(|column| column == name) {
                continue;
            }
            self.add_field_if_not_exists(class_name, name, field).await?;
        }
        Ok(())
    }

    /// Drops the class table and its join tables and removes the catalog
    /// row. Returns whether the dropped class was a user-defined class
    /// rather than an internal join table.
    pub async fn delete_class(&self, class_name: &str) -> Result<bool> {
        debug!(class_name, "delete class");

        let mut conn = self.pool.get().await?;

        // `None` when the catalog itself does not exist.
        let catalog = recover_missing(get_class_in(conn.client(), class_name).await.map(Some))?;
        let join_tables: Vec<String> = catalog
            .iter()
            .flatten()
            .flat_map(Schema::join_tables)
            .collect();

        let tx = executor::transaction(&mut conn).await?;

        let serializer = Serializer::postgresql();
        for table in std::iter::once(class_name).chain(join_tables.iter().map(String::as_str)) {
            batch(&tx, &serializer.serialize(&Statement::drop_table(table))).await?;
        }

        let mut deleted = 0;
        if catalog.is_some() {
            deleted = execute(
                &tx,
                &format!(r#"DELETE FROM "{CATALOG_TABLE}" WHERE "className" = $1"#),
                &[Value::from(class_name)],
            )
            .await?;
        }
        debug!(class_name, catalogued = deleted > 0, "class deleted");

        executor::commit(tx).await?;
        self.notify_schema_change(Some(class_name)).await;
        Ok(!is_join_table(class_name))
    }

    /// Drops every catalogued class table with its join tables, then the
    /// catalog itself. With `fast` the tables are truncated instead and the
    /// catalog emptied.
    pub async fn delete_all_classes(&self, fast: bool) -> Result<()> {
        debug!(fast, "delete all classes");

        let mut conn = self.pool.get().await?;
        let classes = recover_missing(get_all_classes_in(conn.client()).await)?;

        let mut tables = vec![];
        for schema in &classes {
            tables.push(schema.class_name.clone());
            tables.extend(schema.join_tables());
        }
        if fast {
            tables.push(CATALOG_TABLE.to_string());

            // TRUNCATE has no IF EXISTS.
            let rows = query(
                conn.client(),
                "SELECT table_name::text FROM information_schema.tables WHERE table_name::text = ANY($1)",
                &[Value::StringArray(tables.clone())],
            )
            .await?;
            let mut existing = Vec::with_capacity(rows.len());
            for row in &rows {
                existing.push(row.try_get::<_, String>(0).map_err(Error::driver)?);
            }
            tables.retain(|table| existing.contains(table));
        }

        let tx = executor::transaction(&mut conn).await?;
        let serializer = Serializer::postgresql();
        for table in tables.iter().map(String::as_str) {
            let stmt = if fast {
                Statement::truncate(table)
            } else {
                Statement::drop_table(table)
            };
            batch(&tx, &serializer.serialize(&stmt)).await?;
        }
        if !fast {
            let stmt = Statement::drop_table(CATALOG_TABLE);
            batch(&tx, &serializer.serialize(&stmt)).await?;
        }
        executor::commit(tx).await?;

        self.notify_schema_change(None).await;
        Ok(())
    }

    /// Drops the columns of `field_names` and removes them from the
    /// catalog in one transaction. Relation fields only exist in the
    /// catalog.
    pub async fn delete_fields(&self, class_name: &str, field_names: &[String]) -> Result<()> {
        debug!(class_name, ?field_names, "delete fields");

        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;

        let schema = get_class_in(&tx, class_name)
            .await?
            .ok_or_else(|| Error::invalid_query(format!("Class {class_name} does not exist.")))?;

        let columns: Vec<String> = field_names
            .iter()
            .filter(|name| {
                schema
                    .field_type(name)
                    .map_or(true, |ty| !ty.is_relation())
            })
            .cloned()
            .collect();

        let names: Vec<String> = field_names.to_vec();
        execute(
            &tx,
            &format!(
                r#"UPDATE "{CATALOG_TABLE}" SET "schema" = jsonb_set("schema", '{{fields}}', ("schema"->'fields') - $2::text[]) WHERE "className" = $1"#
            ),
            &[Value::from(class_name), Value::StringArray(names)],
        )
        .await?;

        if !columns.is_empty() {
            let stmt = Statement::drop_columns(class_name, columns);
            batch(&tx, &Serializer::postgresql().serialize(&stmt)).await?;
        }

        executor::commit(tx).await?;
        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    /// The public schema of a class, or `None` when it is not catalogued.
    pub async fn get_class(&self, class_name: &str) -> Result<Option<Schema>> {
        let conn = self.pool.get().await?;
        let schema = recover_missing(get_class_in(conn.client(), class_name).await)?;
        Ok(schema.map(|schema| schema.to_public()))
    }

    pub async fn get_all_classes(&self) -> Result<Vec<Schema>> {
        let conn = self.pool.get().await?;
        let schemas = recover_missing(get_all_classes_in(conn.client()).await)?;
        Ok(schemas.iter().map(Schema::to_public).collect())
    }

    /// Whether a table named `class_name` exists.
    pub async fn class_exists(&self, class_name: &str) -> Result<bool> {
        let conn = self.pool.get().await?;
        let rows = query(
            conn.client(),
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name::text = $1)",
            &[Value::from(class_name)],
        )
        .await?;
        match rows.first() {
            Some(row) => row.try_get(0).map_err(Error::driver),
            None => Ok(false),
        }
    }

    pub async fn set_class_level_permissions(&self, class_name: &str, permissions: &Json) -> Result<()> {
        debug!(class_name, "set class level permissions");

        let conn = self.pool.get().await?;
        let path = vec!["classLevelPermissions".to_string()];
        patch_catalog(conn.client(), class_name, path, permissions.clone()).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }
}

/// Sets the value at `path` inside a class's catalog JSON.
pub(crate) async fn patch_catalog<C: GenericClient>(
    client: &C,
    class_name: &str,
    path: Vec<String>,
    value: Json,
) -> Result<()> {
    execute(
        client,
        &format!(
            r#"UPDATE "{CATALOG_TABLE}" SET "schema" = jsonb_set("schema", $2::text[], $3::jsonb) WHERE "className" = $1"#
        ),
        &[Value::from(class_name), Value::StringArray(path), Value::Json(value)],
    )
    .await?;
    Ok(())
}

pub(crate) async fn get_class_in<C: GenericClient>(client: &C, class_name: &str) -> Result<Option<Schema>> {
    let rows = query(
        client,
        &format!(r#"SELECT "schema" FROM "{CATALOG_TABLE}" WHERE "className" = $1"#),
        &[Value::from(class_name)],
    )
    .await?;
    rows.first().map(parse_schema).transpose()
}

async fn get_all_classes_in<C: GenericClient>(client: &C) -> Result<Vec<Schema>> {
    let rows = query(client, &format!(r#"SELECT "schema" FROM "{CATALOG_TABLE}""#), &[]).await?;
    rows.iter().map(parse_schema).collect()
}

/// Creates the table of a class the host declares but never stores in the
/// catalog, then adds any missing columns.
pub(crate) async fn ensure_volatile_class(adapter: &PostgresAdapter, schema: &Schema) -> Result<()> {
    match adapter.create_class(schema).await {
        Ok(_) => {}
        Err(err) if err.is_duplicate_value() => {}
        Err(err) => return Err(err),
    }
    adapter.schema_upgrade(schema).await
}
