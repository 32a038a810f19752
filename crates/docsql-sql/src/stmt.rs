mod add_column;
pub use add_column::AddColumn;

mod column_def;
pub use column_def::{ColumnDef, Type};

mod create_index;
pub use create_index::{CreateIndex, IndexColumn};

mod create_table;
pub use create_table::CreateTable;

mod drop_columns;
pub use drop_columns::DropColumns;

mod drop_index;
pub use drop_index::DropIndex;

mod drop_table;
pub use drop_table::DropTable;

mod transaction;
pub use transaction::Transaction;

mod truncate;
pub use truncate::Truncate;

/// A schema statement. Every variant is idempotent when replayed.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    AddColumn(AddColumn),
    CreateIndex(CreateIndex),
    CreateTable(CreateTable),
    DropColumns(DropColumns),
    DropIndex(DropIndex),
    DropTable(DropTable),
    Truncate(Truncate),
}
