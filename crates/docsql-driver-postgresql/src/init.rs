//! Startup and shutdown.

use crate::{
    catalog::{ensure_catalog, ensure_volatile_class},
    executor::{self, batch},
    PostgresAdapter,
};

use docsql_core::{err, Result, Schema};
use tracing::{debug, info};

/// SQL functions the compiled predicates and updates call.
const HELPER_FUNCTIONS: [(&str, &str); 7] = [
    ("json_object_set_key", include_str!("sql/json_object_set_key.sql")),
    ("array_add", include_str!("sql/array_add.sql")),
    ("array_add_unique", include_str!("sql/array_add_unique.sql")),
    ("array_remove", include_str!("sql/array_remove.sql")),
    ("array_contains", include_str!("sql/array_contains.sql")),
    ("array_contains_all", include_str!("sql/array_contains_all.sql")),
    ("array_contains_all_regex", include_str!("sql/array_contains_all_regex.sql")),
];

impl PostgresAdapter {
    /// Prepares the database for use: creates the catalog, creates or
    /// upgrades the tables of `volatile_schemas` (classes the host declares
    /// in code rather than in the catalog), starts listening for schema
    /// changes when enabled and installs the helper functions.
    pub async fn perform_initialization(&self, volatile_schemas: &[Schema]) -> Result<()> {
        debug!(volatile = volatile_schemas.len(), "perform initialization");

        {
            let conn = self.pool.get().await?;
            ensure_catalog(conn.client()).await?;
        }

        for schema in volatile_schemas {
            ensure_volatile_class(self, schema).await?;
        }

        self.start_schema_bus().await?;

        let mut conn = self.pool.get().await?;
        let tx = executor::transaction(&mut conn).await?;
        for (name, sql) in HELPER_FUNCTIONS {
            batch(&tx, sql)
                .await
                .map_err(|e| e.context(err!("failed to install SQL function `{name}`")))?;
        }
        executor::commit(tx).await?;

        info!("initialization completed");
        Ok(())
    }

    /// Stops listening for schema changes and closes the pool. Operations
    /// started afterwards fail.
    pub async fn handle_shutdown(&self) {
        if let Some(bus) = self.bus.get() {
            bus.shutdown();
        }
        self.pool.close();
        debug!("adapter shut down");
    }
}
