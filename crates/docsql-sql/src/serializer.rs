mod delim;
pub(crate) use delim::Comma;

mod ident;
pub(crate) use ident::{Ident, Literal};

mod params;
pub(crate) use params::Bind;
pub use params::{Params, Placeholder};

mod statement;

use crate::stmt::{Statement, Transaction};

/// Serializes DDL and transaction control statements to PostgreSQL.
#[derive(Debug, Default)]
pub struct Serializer {
    _priv: (),
}

/// Accumulates SQL text while pushing bound values to `params`.
pub struct Formatter<'a> {
    /// Where to write the serialized SQL
    dst: String,

    /// Where to store parameters
    params: &'a mut Params,
}

pub(crate) trait ToSql {
    fn to_sql(self, f: &mut Formatter<'_>);
}

impl Serializer {
    pub fn postgresql() -> Serializer {
        Serializer::default()
    }

    pub fn serialize(&self, stmt: &Statement) -> String {
        let mut params = Params::new();
        let mut f = Formatter::new(&mut params);
        stmt.to_sql(&mut f);

        let mut ret = f.finish();
        assert!(params.is_empty(), "DDL statements do not bind values");
        ret.push(';');
        ret
    }

    pub fn serialize_transaction(&self, op: &Transaction) -> String {
        match op {
            Transaction::Start => "BEGIN".to_string(),
            Transaction::Commit => "COMMIT".to_string(),
            Transaction::Rollback => "ROLLBACK".to_string(),
            Transaction::Savepoint(id) => format!("SAVEPOINT sp_{id}"),
            Transaction::ReleaseSavepoint(id) => format!("RELEASE SAVEPOINT sp_{id}"),
            Transaction::RollbackToSavepoint(id) => format!("ROLLBACK TO SAVEPOINT sp_{id}"),
        }
    }
}

impl<'a> Formatter<'a> {
    pub(crate) fn new(params: &'a mut Params) -> Formatter<'a> {
        Formatter {
            dst: String::new(),
            params,
        }
    }

    pub(crate) fn push(&mut self, value: impl Into<docsql_core::Value>) -> Placeholder {
        self.params.push(value.into())
    }

    pub(crate) fn finish(self) -> String {
        self.dst
    }
}

impl ToSql for &str {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push_str(self);
    }
}

impl ToSql for &String {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push_str(self);
    }
}

impl ToSql for String {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push_str(&self);
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        if let Some(fragment) = self {
            fragment.to_sql(f);
        }
    }
}
