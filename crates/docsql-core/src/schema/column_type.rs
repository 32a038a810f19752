/// Storage type of a class column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    TimestampTz,
    Jsonb,
    Boolean,
    DoublePrecision,
    Point,
    Polygon,
    TextArray,
}

impl ColumnType {
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::TimestampTz => "timestamp with time zone",
            ColumnType::Jsonb => "jsonb",
            ColumnType::Boolean => "boolean",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Point => "point",
            ColumnType::Polygon => "polygon",
            ColumnType::TextArray => "text[]",
        }
    }
}
