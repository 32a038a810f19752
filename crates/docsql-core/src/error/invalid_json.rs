use super::Error;

/// A malformed geometry, text search or relative time operand.
#[derive(Debug)]
pub(super) struct InvalidJsonError {
    message: Box<str>,
}

impl InvalidJsonError {
    pub(super) const CODE: u32 = 107;
}

impl std::error::Error for InvalidJsonError {}

impl core::fmt::Display for InvalidJsonError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn invalid_json(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidJson(InvalidJsonError {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_json(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::InvalidJson(_)))
    }
}
