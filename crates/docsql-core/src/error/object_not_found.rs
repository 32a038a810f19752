use super::Error;

/// A delete or update matched no rows.
#[derive(Debug)]
pub(super) struct ObjectNotFoundError {
    message: Box<str>,
}

impl ObjectNotFoundError {
    pub(super) const CODE: u32 = 101;
}

impl std::error::Error for ObjectNotFoundError {}

impl core::fmt::Display for ObjectNotFoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn object_not_found(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::ObjectNotFound(ObjectNotFoundError {
            message: message.into().into(),
        }))
    }

    pub fn is_object_not_found(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::ObjectNotFound(_)))
    }
}
