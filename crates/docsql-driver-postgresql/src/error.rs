//! Engine error policy: which SQLSTATEs are recovered and how unique
//! violations are reported.

use docsql_core::Error;
use tokio_postgres::error::{DbError, SqlState};

fn db_error(err: &Error) -> Option<&DbError> {
    err.driver_source()?
        .downcast_ref::<tokio_postgres::Error>()?
        .as_db_error()
}

pub(crate) fn sql_state(err: &Error) -> Option<&SqlState> {
    db_error(err).map(DbError::code)
}

fn has_state(err: &Error, state: &SqlState) -> bool {
    sql_state(err) == Some(state)
}

/// `42P01`
pub(crate) fn is_undefined_table(err: &Error) -> bool {
    has_state(err, &SqlState::UNDEFINED_TABLE)
}

/// `42703`
pub(crate) fn is_undefined_column(err: &Error) -> bool {
    has_state(err, &SqlState::UNDEFINED_COLUMN)
}

/// `42P07`
pub(crate) fn is_duplicate_table(err: &Error) -> bool {
    has_state(err, &SqlState::DUPLICATE_TABLE)
}

/// `42701`
pub(crate) fn is_duplicate_column(err: &Error) -> bool {
    has_state(err, &SqlState::DUPLICATE_COLUMN)
}

/// `42710`
pub(crate) fn is_duplicate_object(err: &Error) -> bool {
    has_state(err, &SqlState::DUPLICATE_OBJECT)
}

/// `23505`
pub(crate) fn is_unique_violation(err: &Error) -> bool {
    has_state(err, &SqlState::UNIQUE_VIOLATION)
}

/// A table or column that does not exist yet.
pub(crate) fn is_missing_relation(err: &Error) -> bool {
    is_undefined_table(err) || is_undefined_column(err)
}

/// Reads that hit a table or column that does not exist yet see no rows.
pub(crate) fn recover_missing<T: Default>(result: Result<T, Error>) -> Result<T, Error> {
    match result {
        Err(err) if is_missing_relation(&err) => Ok(T::default()),
        result => result,
    }
}

/// Whether a failed `CREATE ... INDEX` only found the index already
/// there, created by this or a concurrent request.
pub(crate) fn is_existing_index(err: &Error, index_name: &str) -> bool {
    if is_duplicate_table(err) || is_duplicate_object(err) {
        return true;
    }
    // Concurrent creation of the same name collides in the system catalogs.
    is_unique_violation(err)
        && db_error(err)
            .and_then(DbError::constraint)
            .is_some_and(|constraint| constraint != index_name && constraint.starts_with("pg_"))
}

/// Translates a unique violation on data into `DuplicateValue`, naming
/// the field when the constraint follows the `unique_<field>` convention.
/// Other errors are returned unchanged.
pub(crate) fn translate_unique_violation(err: Error) -> Error {
    if !is_unique_violation(&err) {
        return err;
    }
    match db_error(&err)
        .and_then(DbError::constraint)
        .and_then(duplicated_field)
    {
        Some(field) => Error::duplicate_value_for(field),
        None => Error::duplicate_value(
            "A duplicate value for a field with unique values was provided",
        ),
    }
}

/// The field named by a `unique_<field>` constraint, e.g.
/// `_User_unique_email` names `email`.
pub(crate) fn duplicated_field(constraint: &str) -> Option<&str> {
    let (_, rest) = constraint.split_once("unique_")?;
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}
