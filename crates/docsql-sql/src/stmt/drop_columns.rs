use super::Statement;

/// Drops several columns in one `ALTER TABLE`, ignoring missing ones.
#[derive(Debug, Clone, PartialEq)]
pub struct DropColumns {
    pub table: String,
    pub columns: Vec<String>,
}

impl Statement {
    pub fn drop_columns(table: &str, columns: impl IntoIterator<Item = String>) -> Statement {
        DropColumns {
            table: table.to_string(),
            columns: columns.into_iter().collect(),
        }
        .into()
    }
}

impl From<DropColumns> for Statement {
    fn from(value: DropColumns) -> Self {
        Self::DropColumns(value)
    }
}
