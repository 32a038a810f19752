use super::Error;

/// The compiler does not support the given constraint or update shape.
#[derive(Debug)]
pub(super) struct OperationForbiddenError {
    message: Box<str>,
}

impl OperationForbiddenError {
    pub(super) const CODE: u32 = 119;
}

impl std::error::Error for OperationForbiddenError {}

impl core::fmt::Display for OperationForbiddenError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn operation_forbidden(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::OperationForbidden(OperationForbiddenError {
            message: message.into().into(),
        }))
    }

    pub fn is_operation_forbidden(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::OperationForbidden(_)))
    }
}
