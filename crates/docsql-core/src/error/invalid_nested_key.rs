use super::Error;

/// A nested object key contains `$` or `.`.
#[derive(Debug)]
pub(super) struct InvalidNestedKeyError {
    message: Box<str>,
}

impl InvalidNestedKeyError {
    pub(super) const CODE: u32 = 121;
}

impl std::error::Error for InvalidNestedKeyError {}

impl core::fmt::Display for InvalidNestedKeyError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn invalid_nested_key(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidNestedKey(InvalidNestedKeyError {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_nested_key(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::InvalidNestedKey(_)))
    }
}
