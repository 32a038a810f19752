mod adhoc;
mod connection_pool;
mod driver;
mod duplicate_value;
mod internal_server_error;
mod invalid_connection_url;
mod invalid_json;
mod invalid_nested_key;
mod invalid_query;
mod object_not_found;
mod operation_forbidden;
mod schema_conflict;
mod transaction_closed;

use adhoc::AdhocError;
use connection_pool::ConnectionPoolError;
use driver::DriverError;
use duplicate_value::DuplicateValueError;
use internal_server_error::ServerError;
use invalid_connection_url::InvalidConnectionUrlError;
use invalid_json::InvalidJsonError;
use invalid_nested_key::InvalidNestedKeyError;
use invalid_query::InvalidQueryError;
use object_not_found::ObjectNotFoundError;
use operation_forbidden::OperationForbiddenError;
use schema_conflict::SchemaConflictError;
use std::sync::Arc;
use transaction_closed::TransactionClosedError;

/// Returns early with an ad hoc error built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::from_args(format_args!($($arg)*)))
    };
}

/// Builds an ad hoc error from a format string.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::Error::from_args(format_args!($($arg)*))
    };
}

/// An error returned by the adapter.
///
/// Every public operation fails with one of these. The taxonomy kinds map to
/// numeric document-API codes through [`Error::code`]; engine failures that
/// are not part of the taxonomy stay wrapped as driver errors.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// The most recently added context is displayed first, followed by
    /// earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }
        let inner = err.inner.as_mut().unwrap();
        assert!(
            inner.cause.is_none(),
            "consequent error must not already have a cause"
        );
        Arc::get_mut(inner).unwrap().cause = Some(self);
        err
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }

    /// The numeric document-API code for this error.
    ///
    /// Context layers are skipped: the code comes from the first error in the
    /// chain that belongs to the taxonomy. Anything else reports the internal
    /// server error code.
    pub fn code(&self) -> u32 {
        self.chain()
            .find_map(|err| err.kind().code())
            .unwrap_or(ServerError::CODE)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Driver(err) => Some(err),
            ErrorKind::ConnectionPool(err) => Some(err),
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    Driver(DriverError),
    ConnectionPool(ConnectionPoolError),
    InvalidConnectionUrl(InvalidConnectionUrlError),
    DuplicateValue(DuplicateValueError),
    InvalidQuery(InvalidQueryError),
    InvalidNestedKey(InvalidNestedKeyError),
    OperationForbidden(OperationForbiddenError),
    ObjectNotFound(ObjectNotFoundError),
    InvalidJson(InvalidJsonError),
    InternalServerError(ServerError),
    TransactionClosed(TransactionClosedError),
    SchemaConflict(SchemaConflictError),
    Unknown,
}

impl ErrorKind {
    fn code(&self) -> Option<u32> {
        use self::ErrorKind::*;

        match self {
            DuplicateValue(_) => Some(DuplicateValueError::CODE),
            InvalidQuery(_) => Some(InvalidQueryError::CODE),
            InvalidNestedKey(_) => Some(InvalidNestedKeyError::CODE),
            OperationForbidden(_) => Some(OperationForbiddenError::CODE),
            ObjectNotFound(_) => Some(ObjectNotFoundError::CODE),
            InvalidJson(_) => Some(InvalidJsonError::CODE),
            InternalServerError(_) => Some(ServerError::CODE),
            _ => None,
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Driver(err) => core::fmt::Display::fmt(err, f),
            ConnectionPool(err) => core::fmt::Display::fmt(err, f),
            InvalidConnectionUrl(err) => core::fmt::Display::fmt(err, f),
            DuplicateValue(err) => core::fmt::Display::fmt(err, f),
            InvalidQuery(err) => core::fmt::Display::fmt(err, f),
            InvalidNestedKey(err) => core::fmt::Display::fmt(err, f),
            OperationForbidden(err) => core::fmt::Display::fmt(err, f),
            ObjectNotFound(err) => core::fmt::Display::fmt(err, f),
            InvalidJson(err) => core::fmt::Display::fmt(err, f),
            InternalServerError(err) => core::fmt::Display::fmt(err, f),
            TransactionClosed(err) => core::fmt::Display::fmt(err, f),
            SchemaConflict(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown docsql error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn error_from_args() {
        let err = Error::from_args(format_args!("test error: {}", 42));
        assert_eq!(err.to_string(), "test error: 42");
    }

    #[test]
    fn error_chain_display() {
        let root = Error::from_args(format_args!("root cause"));
        let mid = Error::from_args(format_args!("middle context"));
        let top = Error::from_args(format_args!("top context"));

        let chained = root.context(mid).context(top);
        assert_eq!(
            chained.to_string(),
            "top context: middle context: root cause"
        );
    }

    #[test]
    fn anyhow_bridge() {
        let anyhow_err = anyhow::anyhow!("something failed");
        let our_err: Error = anyhow_err.into();
        assert_eq!(our_err.to_string(), "something failed");
        assert_eq!(our_err.code(), 1);
    }

    #[test]
    fn duplicate_value_with_field() {
        let err = Error::duplicate_value_for("email");
        assert!(err.is_duplicate_value());
        assert_eq!(err.duplicated_field(), Some("email"));
        assert_eq!(err.code(), 137);
        assert_eq!(
            err.to_string(),
            "A duplicate value for a field with unique values was provided"
        );
    }

    #[test]
    fn duplicate_value_without_field() {
        let err = Error::duplicate_value("Class Player already exists.");
        assert_eq!(err.duplicated_field(), None);
        assert_eq!(err.to_string(), "Class Player already exists.");
    }

    #[test]
    fn code_survives_context() {
        let err = Error::object_not_found("Object not found.").context(err!("delete failed"));
        assert_eq!(err.code(), 101);
        assert_eq!(err.to_string(), "delete failed: Object not found.");
    }

    #[test]
    fn taxonomy_codes() {
        assert_eq!(Error::invalid_query("x").code(), 102);
        assert_eq!(Error::invalid_nested_key("x").code(), 121);
        assert_eq!(Error::operation_forbidden("x").code(), 119);
        assert_eq!(Error::invalid_json("x").code(), 107);
        assert_eq!(Error::internal_server_error("x").code(), 1);
    }

    #[test]
    fn schema_conflict_display() {
        let err = Error::schema_conflict("Player", "score");
        assert!(err.is_schema_conflict());
        assert_eq!(
            err.to_string(),
            "schema conflict: field `score` of class `Player` was added concurrently with a different type"
        );
    }

    #[test]
    fn driver_source_is_found_through_context() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::driver(io).context(err!("find failed"));
        let source = err.driver_source().expect("driver source");
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }
}
