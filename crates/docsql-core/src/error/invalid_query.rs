use super::Error;

/// A constraint tree has a malformed shape or a reserved character in a key.
#[derive(Debug)]
pub(super) struct InvalidQueryError {
    message: Box<str>,
}

impl InvalidQueryError {
    pub(super) const CODE: u32 = 102;
}

impl std::error::Error for InvalidQueryError {}

impl core::fmt::Display for InvalidQueryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn invalid_query(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidQuery(InvalidQueryError {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_query(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::InvalidQuery(_)))
    }
}
