use super::Error;

/// A transactional session was used after it committed or aborted.
#[derive(Debug)]
pub(super) struct TransactionClosedError {
    state: &'static str,
}

impl std::error::Error for TransactionClosedError {}

impl core::fmt::Display for TransactionClosedError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "transactional session already {}", self.state)
    }
}

impl Error {
    pub fn transaction_committed() -> Error {
        Error::from(super::ErrorKind::TransactionClosed(TransactionClosedError {
            state: "committed",
        }))
    }

    pub fn transaction_aborted() -> Error {
        Error::from(super::ErrorKind::TransactionClosed(TransactionClosedError {
            state: "aborted",
        }))
    }

    pub fn is_transaction_closed(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::TransactionClosed(_))
    }
}
