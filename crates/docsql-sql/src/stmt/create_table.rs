use super::{ColumnDef, Statement, Type};

use docsql_core::schema::{self, ColumnType, Schema, CATALOG_TABLE};

/// A statement to create a SQL table.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    /// Name of the table
    pub name: String,

    /// Column definitions
    pub columns: Vec<ColumnDef>,

    /// Primary key columns
    pub primary_key: Vec<String>,
}

impl Statement {
    /// Creates the table backing a class from its storage schema.
    ///
    /// Relation fields have no column. The identity class gets its hidden
    /// auth and lockout columns, and `objectId` becomes the primary key.
    pub fn create_table(schema: &Schema) -> Statement {
        let mut columns = vec![];
        let mut primary_key = vec![];

        let hidden = if schema.is_user_class() {
            schema::user_hidden_fields().to_vec()
        } else {
            vec![]
        };

        let declared = schema
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), &field.ty));
        let hidden = hidden
            .iter()
            .filter(|(name, _)| !schema.fields.contains_key(*name))
            .map(|(name, ty)| (*name, ty));

        for (name, ty) in declared.chain(hidden) {
            let Some(column_type) = ty.column_type() else {
                continue;
            };

            // The permission lists are always string arrays, even when the
            // declared schema leaves their contents open.
            let column_type = match name {
                "_rperm" | "_wperm" => ColumnType::TextArray,
                _ => column_type,
            };

            columns.push(ColumnDef::new(name, Type::Column(column_type)));
            if name == "objectId" {
                primary_key.push(name.to_string());
            }
        }

        CreateTable {
            name: schema.class_name.clone(),
            columns,
            primary_key,
        }
        .into()
    }

    /// Creates the join table backing a Relation field.
    pub fn create_join_table(class_name: &str, field: &str) -> Statement {
        CreateTable {
            name: schema::join_table_name(class_name, field),
            columns: vec![
                ColumnDef::new("relatedId", Type::VarChar(120)),
                ColumnDef::new("owningId", Type::VarChar(120)),
            ],
            primary_key: vec!["relatedId".to_string(), "owningId".to_string()],
        }
        .into()
    }

    /// Creates the schema catalog table.
    pub fn create_catalog() -> Statement {
        CreateTable {
            name: CATALOG_TABLE.to_string(),
            columns: vec![
                ColumnDef::new("className", Type::VarChar(120)),
                ColumnDef::new("schema", Type::Jsonb),
                ColumnDef::new("isParseClass", Type::Boolean),
            ],
            primary_key: vec!["className".to_string()],
        }
        .into()
    }
}

impl From<CreateTable> for Statement {
    fn from(value: CreateTable) -> Self {
        Self::CreateTable(value)
    }
}
