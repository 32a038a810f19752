use super::{Comma, Formatter, Ident, ToSql};

use crate::stmt::{self, ColumnDef, IndexColumn, Statement, Type};

impl ToSql for &Statement {
    fn to_sql(self, f: &mut Formatter<'_>) {
        match self {
            Statement::AddColumn(stmt) => stmt.to_sql(f),
            Statement::CreateIndex(stmt) => stmt.to_sql(f),
            Statement::CreateTable(stmt) => stmt.to_sql(f),
            Statement::DropColumns(stmt) => stmt.to_sql(f),
            Statement::DropIndex(stmt) => stmt.to_sql(f),
            Statement::DropTable(stmt) => stmt.to_sql(f),
            Statement::Truncate(stmt) => stmt.to_sql(f),
        }
    }
}

impl ToSql for &stmt::CreateTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let columns = Comma(&self.columns);

        fmt!(f, "CREATE TABLE IF NOT EXISTS " Ident(&self.name) " (" columns);
        if !self.primary_key.is_empty() {
            let pk = Comma(self.primary_key.iter().map(Ident));
            fmt!(f, ", PRIMARY KEY (" pk ")");
        }
        fmt!(f, ")");
    }
}

impl ToSql for &stmt::AddColumn {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let column = &self.column;
        fmt!(f, "ALTER TABLE " Ident(&self.table) " ADD COLUMN IF NOT EXISTS " column);
    }
}

impl ToSql for &stmt::DropColumns {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let drops = Comma(self.columns.iter().map(DropColumn));
        fmt!(f, "ALTER TABLE " Ident(&self.table) " " drops);
    }
}

struct DropColumn<'a>(&'a String);

impl ToSql for DropColumn<'_> {
    fn to_sql(self, f: &mut Formatter<'_>) {
        fmt!(f, "DROP COLUMN IF EXISTS " Ident(self.0));
    }
}

impl ToSql for &stmt::DropTable {
    fn to_sql(self, f: &mut Formatter<'_>) {
        fmt!(f, "DROP TABLE IF EXISTS " Ident(&self.name));
    }
}

impl ToSql for &stmt::Truncate {
    fn to_sql(self, f: &mut Formatter<'_>) {
        fmt!(f, "TRUNCATE TABLE " Ident(&self.name));
    }
}

impl ToSql for &stmt::CreateIndex {
    fn to_sql(self, f: &mut Formatter<'_>) {
        let unique = if self.unique { "UNIQUE " } else { "" };
        let columns = Comma(&self.columns);

        fmt!(
            f, "CREATE " unique "INDEX IF NOT EXISTS " Ident(&self.name) " ON " Ident(&self.on) " (" columns ")"
        );
    }
}

impl ToSql for &stmt::DropIndex {
    fn to_sql(self, f: &mut Formatter<'_>) {
        fmt!(f, "DROP INDEX IF EXISTS " Ident(&self.name));
    }
}

impl ToSql for &IndexColumn {
    fn to_sql(self, f: &mut Formatter<'_>) {
        if self.case_insensitive {
            fmt!(f, "lower(" Ident(&self.name) ") varchar_pattern_ops");
        } else {
            fmt!(f, Ident(&self.name));
        }
        if self.descending {
            fmt!(f, " DESC");
        }
    }
}

impl ToSql for &ColumnDef {
    fn to_sql(self, f: &mut Formatter<'_>) {
        fmt!(f, Ident(&self.name) " " self.ty);
    }
}

impl ToSql for Type {
    fn to_sql(self, f: &mut Formatter<'_>) {
        match self {
            Type::Column(ty) => fmt!(f, ty.as_sql()),
            Type::VarChar(size) => fmt!(f, "varchar(" size.to_string() ")"),
            Type::Boolean => fmt!(f, "boolean"),
            Type::Jsonb => fmt!(f, "jsonb"),
        }
    }
}
