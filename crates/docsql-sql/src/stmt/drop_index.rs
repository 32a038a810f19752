use super::Statement;

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndex {
    pub name: String,
}

impl Statement {
    pub fn drop_index(name: &str) -> Statement {
        DropIndex {
            name: name.to_string(),
        }
        .into()
    }
}

impl From<DropIndex> for Statement {
    fn from(value: DropIndex) -> Self {
        Self::DropIndex(value)
    }
}
