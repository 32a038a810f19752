use super::Statement;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    /// Name of the index
    pub name: String,

    /// Which table to index
    pub on: String,

    /// The columns to index
    pub columns: Vec<IndexColumn>,

    /// When true, the index is unique
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,

    /// Sort the index entries in descending order.
    pub descending: bool,

    /// Index `lower(column)` with pattern ops for case-insensitive lookups.
    pub case_insensitive: bool,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> IndexColumn {
        IndexColumn {
            name: name.into(),
            descending: false,
            case_insensitive: false,
        }
    }
}

impl Statement {
    pub fn create_index(
        name: &str,
        on: &str,
        columns: impl IntoIterator<Item = IndexColumn>,
        unique: bool,
    ) -> Statement {
        CreateIndex {
            name: name.to_string(),
            on: on.to_string(),
            columns: columns.into_iter().collect(),
            unique,
        }
        .into()
    }
}

impl From<CreateIndex> for Statement {
    fn from(value: CreateIndex) -> Self {
        Self::CreateIndex(value)
    }
}
