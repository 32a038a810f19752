use super::Error;

/// The catalog already holds a field with a different type than the one
/// being added. This is a programmer error and is never retried.
#[derive(Debug)]
pub(super) struct SchemaConflictError {
    class_name: Box<str>,
    field_name: Box<str>,
}

impl std::error::Error for SchemaConflictError {}

impl core::fmt::Display for SchemaConflictError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "schema conflict: field `{}` of class `{}` was added concurrently with a different type",
            self.field_name, self.class_name
        )
    }
}

impl Error {
    pub fn schema_conflict(class_name: impl Into<String>, field_name: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::SchemaConflict(SchemaConflictError {
            class_name: class_name.into().into(),
            field_name: field_name.into().into(),
        }))
    }

    pub fn is_schema_conflict(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::SchemaConflict(_))
    }
}
