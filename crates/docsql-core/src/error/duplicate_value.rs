use super::Error;

/// A unique constraint was hit, on data or on a class or index name.
#[derive(Debug)]
pub(super) struct DuplicateValueError {
    message: Box<str>,
    duplicated_field: Option<Box<str>>,
}

impl DuplicateValueError {
    pub(super) const CODE: u32 = 137;
}

impl std::error::Error for DuplicateValueError {}

impl core::fmt::Display for DuplicateValueError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn duplicate_value(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::DuplicateValue(DuplicateValueError {
            message: message.into().into(),
            duplicated_field: None,
        }))
    }

    /// A unique violation on data where the offending field is known.
    pub fn duplicate_value_for(field: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::DuplicateValue(DuplicateValueError {
            message: "A duplicate value for a field with unique values was provided".into(),
            duplicated_field: Some(field.into().into()),
        }))
    }

    pub fn is_duplicate_value(&self) -> bool {
        self.chain()
            .any(|err| matches!(err.kind(), super::ErrorKind::DuplicateValue(_)))
    }

    /// The field whose unique constraint was violated, when the engine
    /// reported a constraint name that identifies it.
    pub fn duplicated_field(&self) -> Option<&str> {
        self.chain().find_map(|err| match err.kind() {
            super::ErrorKind::DuplicateValue(dup) => dup.duplicated_field.as_deref(),
            _ => None,
        })
    }
}
