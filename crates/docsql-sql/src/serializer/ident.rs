use super::{Formatter, ToSql};

/// A double-quoted identifier.
#[derive(Clone, Copy)]
pub(crate) struct Ident<S>(pub(crate) S);

/// A single-quoted string literal. Only used for trusted constants such as
/// JSON path components that already passed key validation.
#[derive(Clone, Copy)]
pub(crate) struct Literal<S>(pub(crate) S);

impl<S: AsRef<str>> ToSql for Ident<S> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push('"');
        for c in self.0.as_ref().chars() {
            if c == '"' {
                f.dst.push('"');
            }
            f.dst.push(c);
        }
        f.dst.push('"');
    }
}

impl<S: AsRef<str>> ToSql for Literal<S> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        f.dst.push('\'');
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                f.dst.push('\'');
            }
            f.dst.push(c);
        }
        f.dst.push('\'');
    }
}
