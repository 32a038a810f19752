use docsql_core::schema::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,

    /// Column storage type
    pub ty: Type,
}

/// Column types used in DDL. Class columns derive theirs from the field
/// type; the catalog and join tables use bounded varchars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Type {
    Column(ColumnType),
    VarChar(u32),
    Boolean,
    Jsonb,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: Type) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            ty,
        }
    }
}
