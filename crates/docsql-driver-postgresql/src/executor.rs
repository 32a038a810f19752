//! Where an operation runs: a pooled connection, or the connection pinned
//! by a transactional session.

use crate::{
    pool::PoolConnection,
    session::{SessionState, TransactionalSession},
    value, PostgresAdapter,
};

use docsql_core::{Error, Result, Value};
use tokio::sync::MutexGuard;
use tokio_postgres::{Client, GenericClient, Row, Transaction};

pub(crate) enum Executor<'a> {
    Pooled(PoolConnection),
    Session(MutexGuard<'a, SessionState>),
}

impl PostgresAdapter {
    pub(crate) async fn executor<'a>(
        &self,
        session: Option<&'a TransactionalSession>,
    ) -> Result<Executor<'a>> {
        match session {
            Some(session) => Ok(Executor::Session(session.lock_open().await?)),
            None => Ok(Executor::Pooled(self.pool.get().await?)),
        }
    }
}

impl Executor<'_> {
    pub(crate) fn client(&self) -> &Client {
        match self {
            Executor::Pooled(conn) => conn.client(),
            Executor::Session(state) => state.client(),
        }
    }

    /// Runs a query whose failures accepted by `recover` mean "no result",
    /// returning `None` for them. Inside a session the query runs under a
    /// savepoint, so a recovered failure leaves the transaction usable.
    pub(crate) async fn query_recovering(
        &mut self,
        sql: &str,
        values: &[Value],
        recover: fn(&Error) -> bool,
    ) -> Result<Option<Vec<Row>>> {
        match self {
            Executor::Pooled(conn) => match query(conn.client(), sql, values).await {
                Ok(rows) => Ok(Some(rows)),
                Err(err) if recover(&err) => Ok(None),
                Err(err) => Err(err),
            },
            Executor::Session(state) => state.query_recovering(sql, values, recover).await,
        }
    }

    /// Records the outcome of an operation batched into a session. The
    /// first failure makes the session roll back on commit.
    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let (Executor::Session(state), Err(err)) = (&mut *self, &result) {
            state.record_failure(err.clone());
        }
        result
    }
}

pub(crate) async fn query<C: GenericClient>(client: &C, sql: &str, values: &[Value]) -> Result<Vec<Row>> {
    let params = value::params(values);
    client
        .query(sql, &value::args(&params))
        .await
        .map_err(Error::driver)
}

pub(crate) async fn execute<C: GenericClient>(client: &C, sql: &str, values: &[Value]) -> Result<u64> {
    let params = value::params(values);
    client
        .execute(sql, &value::args(&params))
        .await
        .map_err(Error::driver)
}

/// Runs parameterless statements with the simple query protocol.
pub(crate) async fn batch<C: GenericClient>(client: &C, sql: &str) -> Result<()> {
    client.batch_execute(sql).await.map_err(Error::driver)
}

pub(crate) async fn transaction(conn: &mut PoolConnection) -> Result<Transaction<'_>> {
    conn.transaction().await.map_err(Error::driver)
}

pub(crate) async fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit().await.map_err(Error::driver)
}
