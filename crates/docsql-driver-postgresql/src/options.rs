use crate::{bus::SchemaChange, PostgresAdapter};

use docsql_core::{Error, Result, SchemaCache};
use std::sync::Arc;
use tokio_postgres::Config;
use url::Url;

/// Configures and connects a [`PostgresAdapter`].
///
/// ```no_run
/// # async fn run() -> docsql_core::Result<()> {
/// let adapter = docsql_driver_postgresql::PostgresAdapter::builder()
///     .max_connections(8)
///     .enable_schema_hooks(true)
///     .connect("postgresql://localhost/app")
///     .await?;
/// adapter.perform_initialization(&[]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Builder {
    max_connections: Option<usize>,
    enable_schema_hooks: bool,
    schema_cache: Option<Arc<dyn SchemaCache>>,
    on_schema_change: Option<crate::SchemaObserver>,
}

impl Builder {
    /// Maximum number of pooled connections. Defaults to twice the number
    /// of logical cores.
    pub fn max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// Listen for schema changes made by other instances.
    pub fn enable_schema_hooks(&mut self, enabled: bool) -> &mut Self {
        self.enable_schema_hooks = enabled;
        self
    }

    /// Cache cleared whenever another instance changes a schema.
    pub fn schema_cache(&mut self, cache: Arc<dyn SchemaCache>) -> &mut Self {
        self.schema_cache = Some(cache);
        self
    }

    pub fn on_schema_change(
        &mut self,
        observer: impl Fn(SchemaChange) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_schema_change = Some(Arc::new(observer));
        self
    }

    pub async fn connect(&self, url: &str) -> Result<PostgresAdapter> {
        let config = parse_url(url)?;
        PostgresAdapter::new(
            config,
            self.max_connections,
            self.enable_schema_hooks,
            self.schema_cache.clone(),
            self.on_schema_change.clone(),
        )
    }
}

/// Parses a `postgres://` or `postgresql://` connection URL.
pub(crate) fn parse_url(url: &str) -> Result<Config> {
    let url = Url::parse(url).map_err(|err| {
        Error::invalid_connection_url(format!("{err}; url={url}"))
    })?;

    if !matches!(url.scheme(), "postgres" | "postgresql") {
        return Err(Error::invalid_connection_url(format!(
            "connection URL does not have a `postgresql` scheme; url={url}"
        )));
    }

    let host = url.host_str().ok_or_else(|| {
        Error::invalid_connection_url(format!("missing host in connection URL; url={url}"))
    })?;

    let database = url.path().trim_start_matches('/');
    if database.is_empty() {
        return Err(Error::invalid_connection_url(format!(
            "no database specified - missing path in connection URL; url={url}"
        )));
    }

    let mut config = Config::new();
    config.host(host);
    config.dbname(database);

    if let Some(port) = url.port() {
        config.port(port);
    }

    if !url.username().is_empty() {
        config.user(url.username());
    }

    if let Some(password) = url.password() {
        config.password(password);
    }

    Ok(config)
}
