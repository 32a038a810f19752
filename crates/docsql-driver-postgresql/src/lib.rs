//! PostgreSQL storage adapter for the docsql document data API.
//!
//! [`PostgresAdapter`] stores each document class in its own table,
//! keeps class schemas in the `_SCHEMA` catalog table, and compiles
//! document queries and updates into parameterized SQL through
//! `docsql_sql`.

mod bus;
pub use bus::SchemaChange;

mod catalog;

mod error;

mod executor;

mod indexes;
pub use indexes::IndexInfo;

mod init;

mod objects;

mod options;
pub use options::Builder;

mod pool;
use pool::Pool;

mod row;

mod session;
pub use session::TransactionalSession;

mod value;

pub use docsql_sql::FindOptions;

use bus::{ObserverSlot, SchemaBus};
use docsql_core::{Result, SchemaCache};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_postgres::Config;

/// Callback invoked when another instance changes a schema.
pub type SchemaObserver = Arc<dyn Fn(SchemaChange) + Send + Sync>;

/// The adapter. Cheap to share behind an `Arc`; every operation borrows a
/// pooled connection for its duration unless it runs inside a
/// [`TransactionalSession`].
pub struct PostgresAdapter {
    pool: Pool,

    /// Used to open the dedicated listen connection.
    config: Config,

    enable_schema_hooks: bool,

    schema_cache: Option<Arc<dyn SchemaCache>>,

    observers: Arc<ObserverSlot>,

    /// Started by `perform_initialization` when schema hooks are enabled.
    bus: OnceCell<SchemaBus>,
}

impl PostgresAdapter {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Connects with default options.
    pub async fn connect(url: &str) -> Result<PostgresAdapter> {
        Builder::default().connect(url).await
    }

    pub(crate) fn new(
        config: Config,
        max_connections: Option<usize>,
        enable_schema_hooks: bool,
        schema_cache: Option<Arc<dyn SchemaCache>>,
        on_schema_change: Option<SchemaObserver>,
    ) -> Result<PostgresAdapter> {
        Ok(PostgresAdapter {
            pool: Pool::new(config.clone(), max_connections)?,
            config,
            enable_schema_hooks,
            schema_cache,
            observers: Arc::new(ObserverSlot::new(on_schema_change)),
            bus: OnceCell::new(),
        })
    }

    /// Registers the observer notified when another instance changes a
    /// schema, replacing any previous one.
    pub fn watch(&self, observer: impl Fn(SchemaChange) + Send + Sync + 'static) {
        self.observers.set(Arc::new(observer));
    }

    async fn start_schema_bus(&self) -> Result<()> {
        if !self.enable_schema_hooks {
            return Ok(());
        }

        self.bus
            .get_or_try_init(|| {
                SchemaBus::listen(
                    &self.config,
                    self.schema_cache.clone(),
                    self.observers.clone(),
                )
            })
            .await?;
        Ok(())
    }

    /// Tells other instances that `class_name` changed. Never fails.
    pub(crate) async fn notify_schema_change(&self, class_name: Option<&str>) {
        if let Some(bus) = self.bus.get() {
            bus.publish(class_name).await;
        }
    }
}

impl std::fmt::Debug for PostgresAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresAdapter")
            .field("pool", &self.pool)
            .field("enable_schema_hooks", &self.enable_schema_hooks)
            .field("listening", &self.bus.initialized())
            .finish()
    }
}
