use super::{ColumnDef, Statement, Type};

use docsql_core::schema::ColumnType;

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`
#[derive(Debug, Clone, PartialEq)]
pub struct AddColumn {
    pub table: String,
    pub column: ColumnDef,
}

impl Statement {
    pub fn add_column(table: &str, name: &str, ty: ColumnType) -> Statement {
        AddColumn {
            table: table.to_string(),
            column: ColumnDef::new(name, Type::Column(ty)),
        }
        .into()
    }
}

impl From<AddColumn> for Statement {
    fn from(value: AddColumn) -> Self {
        Self::AddColumn(value)
    }
}
