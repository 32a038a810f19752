//! Index management for class tables.

use crate::{
    catalog::patch_catalog,
    error::{is_existing_index, translate_unique_violation},
    executor::{self, batch, query},
    PostgresAdapter,
};

use docsql_core::{schema::IndexKeys, Error, Field, Result, Value};
use docsql_sql::{stmt::IndexColumn, Serializer, Statement};
use indexmap::IndexMap;
use serde_json::{json, Value as Json};
use tokio_postgres::GenericClient;
use tracing::debug;

/// An index as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,

    /// The `CREATE INDEX` statement that would recreate the index.
    pub definition: String,
}

fn sorted_name(class_name: &str, kind: &str, field_names: &[String]) -> String {
    let mut fields = field_names.to_vec();
    fields.sort();
    format!("{class_name}_{kind}_{}", fields.join("_"))
}

fn index_columns(field_names: &[String], case_insensitive: bool) -> Vec<IndexColumn> {
    field_names
        .iter()
        .map(|name| IndexColumn {
            case_insensitive,
            ..IndexColumn::new(name.as_str())
        })
        .collect()
}

/// Runs a `CREATE INDEX`, treating an index that already exists as
/// success and duplicate data under a unique index as `DuplicateValue`.
async fn run_create<C: GenericClient>(client: &C, stmt: Statement, name: &str) -> Result<()> {
    match batch(client, &Serializer::postgresql().serialize(&stmt)).await {
        Ok(()) => Ok(()),
        Err(err) if is_existing_index(&err, name) => {
            debug!(index = name, "index already exists");
            Ok(())
        }
        Err(err) => Err(translate_unique_violation(err)),
    }
}

/// Creates an index from catalog index keys: field name to `1` or `-1`.
pub(crate) async fn create_index<C: GenericClient>(
    client: &C,
    class_name: &str,
    name: &str,
    keys: &IndexKeys,
) -> Result<()> {
    let columns = keys.iter().map(|(field, direction)| IndexColumn {
        descending: direction.as_i64() == Some(-1),
        ..IndexColumn::new(field.as_str())
    });
    let stmt = Statement::create_index(name, class_name, columns, false);
    run_create(client, stmt, name).await
}

/// Index changes validated against the indexes a class already has.
#[derive(Debug, Default, PartialEq)]
struct IndexChanges {
    inserted: IndexMap<String, IndexKeys>,
    deleted: Vec<String>,

    /// The class's indexes once the changes are applied.
    indexes: IndexMap<String, IndexKeys>,
}

impl IndexChanges {
    fn plan(
        submitted: &IndexMap<String, Json>,
        existing: &IndexMap<String, IndexKeys>,
        fields: &IndexMap<String, Field>,
    ) -> Result<IndexChanges> {
        let mut indexes = existing.clone();
        if indexes.is_empty() {
            indexes.insert("_id_".to_string(), IndexKeys::from([("_id".to_string(), json!(1))]));
        }

        let mut changes = IndexChanges::default();
        for (name, index) in submitted {
            let delete = index.get("__op").and_then(Json::as_str) == Some("Delete");
            let exists = indexes.contains_key(name);

            if exists && !delete {
                return Err(Error::invalid_query(format!("Index {name} exists, cannot update.")));
            }
            if !exists && delete {
                return Err(Error::invalid_query(format!(
                    "Index {name} does not exist, cannot delete."
                )));
            }

            if delete {
                indexes.shift_remove(name);
                changes.deleted.push(name.clone());
                continue;
            }

            let keys: IndexKeys = match index {
                Json::Object(keys) => keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => return Err(Error::invalid_query(format!("Index {name} has no keys."))),
            };
            if let Some(key) = keys.keys().find(|key| !fields.contains_key(*key)) {
                return Err(Error::invalid_query(format!(
                    "Field {key} does not exist, cannot add index."
                )));
            }
            indexes.insert(name.clone(), keys.clone());
            changes.inserted.insert(name.clone(), keys);
        }

        changes.indexes = indexes;
        Ok(changes)
    }
}

impl PostgresAdapter {
    /// Creates a plain index over `field_names`, named
    /// `<class>_default_<sorted fields>` unless `index_name` is given.
    /// A case-insensitive index is built over the lowered columns.
    pub async fn ensure_index(
        &self,
        class_name: &str,
        field_names: &[String],
        index_name: Option<&str>,
        case_insensitive: bool,
    ) -> Result<()> {
        let name = match index_name {
            Some(name) => name.to_string(),
            None => sorted_name(class_name, "default", field_names),
        };
        debug!(class_name, index = %name, "ensure index");

        let stmt = Statement::create_index(
            &name,
            class_name,
            index_columns(field_names, case_insensitive),
            false,
        );
        let conn = self.pool.get().await?;
        run_create(conn.client(), stmt, &name).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    /// Creates a unique index over `field_names`. Existing duplicate values
    /// fail with `DuplicateValue`.
    pub async fn ensure_uniqueness(&self, class_name: &str, field_names: &[String]) -> Result<()> {
        let name = sorted_name(class_name, "unique", field_names);
        debug!(class_name, index = %name, "ensure uniqueness");

        let stmt = Statement::create_index(&name, class_name, index_columns(field_names, false), true);
        let conn = self.pool.get().await?;
        run_create(conn.client(), stmt, &name).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    /// Creates each named index in one transaction.
    pub async fn create_indexes(
        &self,
        class_name: &str,
        indexes: &IndexMap<String, IndexKeys>,
    ) -> Result<()> {
        debug!(class_name, count = indexes.len(), "create indexes");

        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;
        for (name, keys) in indexes {
            create_index(&tx, class_name, name, keys).await?;
        }
        executor::commit(tx).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    pub async fn drop_indexes(&self, class_name: &str, names: &[String]) -> Result<()> {
        debug!(class_name, ?names, "drop indexes");

        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;
        drop_indexes_in(&tx, names).await?;
        executor::commit(tx).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }

    pub async fn get_indexes(&self, class_name: &str) -> Result<Vec<IndexInfo>> {
        let conn = self.pool.get().await?;
        let rows = query(
            conn.client(),
            "SELECT indexname::text, indexdef FROM pg_indexes WHERE tablename::text = $1",
            &[Value::from(class_name)],
        )
        .await?;

        rows.iter()
            .map(|row| {
                Ok(IndexInfo {
                    name: row.try_get(0).map_err(Error::driver)?,
                    definition: row.try_get(1).map_err(Error::driver)?,
                })
            })
            .collect()
    }

    /// Applies index changes in catalog format: a submitted index is
    /// created, one given as `{"__op": "Delete"}` dropped. The database
    /// changes and the catalog update happen in one transaction.
    pub async fn set_indexes_with_schema_format(
        &self,
        class_name: &str,
        submitted: &IndexMap<String, Json>,
        existing: &IndexMap<String, IndexKeys>,
        fields: &IndexMap<String, Field>,
    ) -> Result<()> {
        let changes = IndexChanges::plan(submitted, existing, fields)?;
        debug!(
            class_name,
            inserted = changes.inserted.len(),
            deleted = changes.deleted.len(),
            "set indexes"
        );

        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;
        for (name, keys) in &changes.inserted {
            create_index(&tx, class_name, name, keys).await?;
        }
        drop_indexes_in(&tx, &changes.deleted).await?;
        patch_catalog(
            &tx,
            class_name,
            vec!["indexes".to_string()],
            serde_json::to_value(&changes.indexes)?,
        )
        .await?;
        executor::commit(tx).await?;

        self.notify_schema_change(Some(class_name)).await;
        Ok(())
    }
}

async fn drop_indexes_in<C: GenericClient>(client: &C, names: &[String]) -> Result<()> {
    let serializer = Serializer::postgresql();
    for name in names {
        batch(client, &serializer.serialize(&Statement::drop_index(name))).await?;
    }
    Ok(())
}
