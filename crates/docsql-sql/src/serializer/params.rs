use super::{Formatter, ToSql};

use docsql_core::Value;

/// Values bound to a statement, numbered from a starting placeholder.
///
/// Placeholders are only ever produced by pushing a value, so the number
/// of placeholders a compiler writes always matches the values it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    first: usize,
    values: Vec<Value>,
}

/// A positional placeholder, written as `$n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(pub usize);

/// A value to bind, written as its placeholder.
pub(crate) struct Bind<V>(pub(crate) V);

impl Params {
    pub fn new() -> Params {
        Params::starting_at(1)
    }

    /// Bound values whose first placeholder is `$index`.
    pub fn starting_at(index: usize) -> Params {
        assert!(index > 0, "placeholders are numbered from 1");
        Params {
            first: index,
            values: vec![],
        }
    }

    pub fn push(&mut self, value: Value) -> Placeholder {
        self.values.push(value);
        Placeholder(self.first + self.values.len() - 1)
    }

    /// The placeholder the next pushed value will get.
    pub fn next_index(&self) -> usize {
        self.first + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Default for Params {
    fn default() -> Params {
        Params::new()
    }
}

impl ToSql for Placeholder {
    fn to_sql(self, f: &mut Formatter<'_>) {
        use std::fmt::Write;

        write!(&mut f.dst, "${}", self.0).unwrap();
    }
}

impl<V: Into<Value>> ToSql for Bind<V> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let placeholder = f.push(self.0);
        placeholder.to_sql(f);
    }
}
