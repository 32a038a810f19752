//! Transactional sessions: a batch of object operations sharing one
//! transaction on a pinned connection.

use crate::{executor, pool::PoolConnection, PostgresAdapter};

use docsql_core::{Error, Result, Value};
use docsql_sql::{stmt::Transaction, Serializer};
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, Row};
use tracing::{debug, warn};

/// An open transaction. Pass it to object operations to run them inside
/// the transaction, then finish it with
/// [`PostgresAdapter::commit_transactional_session`] or
/// [`PostgresAdapter::abort_transactional_session`].
///
/// A session dropped without either is rolled back by closing its
/// connection.
#[derive(Debug)]
pub struct TransactionalSession {
    state: Mutex<SessionState>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    conn: PoolConnection,

    /// The first operation that failed inside the transaction.
    failure: Option<Error>,

    closed: Option<Closed>,

    /// Id of the last savepoint taken.
    savepoints: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closed {
    Committed,
    Aborted,
}

impl SessionState {
    pub(crate) fn client(&self) -> &Client {
        self.conn.client()
    }

    pub(crate) fn record_failure(&mut self, err: Error) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    pub(crate) async fn query_recovering(
        &mut self,
        sql: &str,
        values: &[Value],
        recover: fn(&Error) -> bool,
    ) -> Result<Option<Vec<Row>>> {
        self.savepoints += 1;
        let id = self.savepoints;
        let serializer = Serializer::postgresql();

        let savepoint = serializer.serialize_transaction(&Transaction::Savepoint(id));
        executor::batch(self.client(), &savepoint).await?;

        match executor::query(self.client(), sql, values).await {
            Ok(rows) => {
                let release = serializer.serialize_transaction(&Transaction::ReleaseSavepoint(id));
                executor::batch(self.client(), &release).await?;
                Ok(Some(rows))
            }
            Err(err) if recover(&err) => {
                debug!(%err, "recovered inside transactional session");
                let rollback = serializer.serialize_transaction(&Transaction::RollbackToSavepoint(id));
                executor::batch(self.client(), &rollback).await?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn finish(&mut self, op: Transaction, closed: Closed) -> Result<()> {
        self.closed = Some(closed);
        let sql = Serializer::postgresql().serialize_transaction(&op);
        executor::batch(self.client(), &sql).await?;
        self.conn.in_transaction = false;
        Ok(())
    }
}

fn closed_error(closed: Closed) -> Error {
    match closed {
        Closed::Committed => Error::transaction_committed(),
        Closed::Aborted => Error::transaction_aborted(),
    }
}

impl TransactionalSession {
    /// Locks the session for one operation, failing once it is finished.
    pub(crate) async fn lock_open(&self) -> Result<MutexGuard<'_, SessionState>> {
        let state = self.state.lock().await;
        match state.closed {
            Some(closed) => Err(closed_error(closed)),
            None => Ok(state),
        }
    }
}

impl PostgresAdapter {
    /// Pins a pooled connection and begins a transaction on it.
    pub async fn create_transactional_session(&self) -> Result<TransactionalSession> {
        let mut conn = self.pool.get().await?;
        let sql = Serializer::postgresql().serialize_transaction(&Transaction::Start);
        executor::batch(conn.client(), &sql).await?;
        conn.in_transaction = true;
        debug!("transactional session opened");

        Ok(TransactionalSession {
            state: Mutex::new(SessionState {
                conn,
                failure: None,
                closed: None,
                savepoints: 0,
            }),
        })
    }

    /// Commits the session when every batched operation succeeded.
    /// Otherwise the transaction is rolled back and the first failure is
    /// returned.
    pub async fn commit_transactional_session(&self, session: &TransactionalSession) -> Result<()> {
        let mut state = session.lock_open().await?;

        if let Some(failure) = state.failure.take() {
            warn!(%failure, "rolling back transactional session after a failed operation");
            state.finish(Transaction::Rollback, Closed::Aborted).await?;
            return Err(failure);
        }

        state.finish(Transaction::Commit, Closed::Committed).await?;
        debug!("transactional session committed");
        Ok(())
    }

    pub async fn abort_transactional_session(&self, session: &TransactionalSession) -> Result<()> {
        let mut state = session.lock_open().await?;
        state.finish(Transaction::Rollback, Closed::Aborted).await?;
        debug!("transactional session aborted");
        Ok(())
    }
}
