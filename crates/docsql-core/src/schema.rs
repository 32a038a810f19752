mod class;
pub use class::{IndexKeys, Schema};

mod column_type;
pub use column_type::ColumnType;

mod field;
pub use field::Field;

mod field_type;
pub use field_type::FieldType;

/// The reserved identity class. Equality on its `username` and `email`
/// fields honours case-insensitive queries and its table carries hidden
/// auth and lockout columns.
pub const USER_CLASS: &str = "_User";

/// The persisted schema catalog table.
pub const CATALOG_TABLE: &str = "_SCHEMA";

/// Prefix of the join tables backing Relation fields.
pub const JOIN_TABLE_PREFIX: &str = "_Join:";

/// Name of the join table backing `field` on `class_name`.
pub fn join_table_name(class_name: &str, field: &str) -> String {
    format!("{JOIN_TABLE_PREFIX}{field}:{class_name}")
}

/// Returns `true` for internal join-table class names.
pub fn is_join_table(class_name: &str) -> bool {
    class_name.starts_with(JOIN_TABLE_PREFIX)
}

/// Columns created on the identity class table that never appear in its
/// declared schema.
pub fn user_hidden_fields() -> [(&'static str, FieldType); 8] {
    [
        ("_email_verify_token_expires_at", FieldType::Date),
        ("_email_verify_token", FieldType::String),
        ("_account_lockout_expires_at", FieldType::Date),
        ("_failed_login_count", FieldType::Number),
        ("_perishable_token", FieldType::String),
        ("_perishable_token_expires_at", FieldType::Date),
        ("_password_changed_at", FieldType::Date),
        ("_password_history", FieldType::Object),
    ]
}
