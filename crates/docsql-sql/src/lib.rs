#[macro_use]
mod macros;

pub mod aggregate;
pub use aggregate::{compile_aggregate, Aggregate};

pub mod mutation;
pub use mutation::{compile_insert, compile_update, Insert, Update};

pub mod predicate;
pub use predicate::{compile_where, Predicate};

pub mod query;
pub use query::{compile_count, compile_delete, compile_distinct, compile_find, FindOptions};

pub mod serializer;
pub use serializer::{Params, Placeholder, Serializer};

pub mod stmt;
pub use stmt::Statement;

use docsql_core::Value;

/// A statement ready to execute: SQL text and the values bound to its
/// positional placeholders, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Value>,
}
