/// Transaction control for a transactional session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    Start,
    Commit,
    Rollback,

    /// Savepoints are named `sp_{id}`.
    Savepoint(usize),
    ReleaseSavepoint(usize),
    RollbackToSavepoint(usize),
}
