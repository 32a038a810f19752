use super::Statement;

/// A statement to drop a SQL table.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    /// Name of the table.
    pub name: String,
}

impl Statement {
    /// Drops a table if it exists.
    pub fn drop_table(name: &str) -> Statement {
        DropTable {
            name: name.to_string(),
        }
        .into()
    }
}

impl From<DropTable> for Statement {
    fn from(value: DropTable) -> Self {
        Self::DropTable(value)
    }
}
