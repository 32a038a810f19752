//! Connection pooling over `tokio_postgres` clients.

use std::ops::{Deref, DerefMut};

use deadpool::managed::{Metrics, RecycleError, RecycleResult};
use docsql_core::{err, Error, Result};
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, error};

/// The default maximum size of a pool, `cpu_core_count * 2` including
/// logical cores.
fn get_default_pool_max_size() -> usize {
    deadpool::managed::PoolConfig::default().max_size
}

/// A pooled client plus whether it is inside a transaction nobody has
/// finished yet.
pub(crate) struct Connection {
    client: Client,

    /// Set while a transactional session owns the connection. A connection
    /// returned with this set is discarded instead of reused.
    pub(crate) in_transaction: bool,
}

impl Connection {
    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.client.is_closed())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Deref for Connection {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Client {
        &mut self.client
    }
}

/// Opens a client and drives its connection on a background task.
pub(crate) async fn connect(config: &Config) -> Result<Client> {
    let (client, connection) = config.connect(NoTls).await.map_err(Error::driver)?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "postgres connection error");
        }
    });

    Ok(client)
}

#[derive(Debug)]
pub(crate) struct Manager {
    config: Config,
}

impl deadpool::managed::Manager for Manager {
    type Type = Connection;
    type Error = Error;

    async fn create(&self) -> Result<Connection> {
        debug!("opening pooled connection");
        Ok(Connection {
            client: connect(&self.config).await?,
            in_transaction: false,
        })
    }

    async fn recycle(&self, conn: &mut Connection, _metrics: &Metrics) -> RecycleResult<Error> {
        if conn.is_closed() {
            return Err(RecycleError::Backend(err!("connection closed")));
        }
        if conn.in_transaction {
            return Err(RecycleError::Backend(err!(
                "connection returned with an open transaction"
            )));
        }
        Ok(())
    }
}

/// A connection pool over one database.
#[derive(Debug, Clone)]
pub(crate) struct Pool {
    inner: deadpool::managed::Pool<Manager>,
}

/// A connection checked out of the pool, returned when dropped.
pub(crate) type PoolConnection = deadpool::managed::Object<Manager>;

impl Pool {
    pub(crate) fn new(config: Config, max_connections: Option<usize>) -> Result<Pool> {
        let inner = deadpool::managed::Pool::builder(Manager { config })
            .runtime(deadpool::Runtime::Tokio1)
            .max_size(max_connections.unwrap_or_else(get_default_pool_max_size))
            .build()
            .map_err(Error::connection_pool)?;
        Ok(Pool { inner })
    }

    pub(crate) async fn get(&self) -> Result<PoolConnection> {
        self.inner.get().await.map_err(Error::connection_pool)
    }

    pub(crate) fn close(&self) {
        self.inner.close();
    }
}
