use super::Statement;

/// Empties a table, keeping its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncate {
    pub name: String,
}

impl Statement {
    pub fn truncate(name: &str) -> Statement {
        Truncate {
            name: name.to_string(),
        }
        .into()
    }
}

impl From<Truncate> for Statement {
    fn from(value: Truncate) -> Self {
        Self::Truncate(value)
    }
}
