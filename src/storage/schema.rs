//! Table schema: column types and the ordered column list each table's
//! rows are encoded/decoded against.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub is_primary: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        ColumnSchema {
            name: name.into(),
            col_type,
            nullable: false,
            is_primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.nullable = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self> {
        let primaries = columns.iter().filter(|c| c.is_primary).count();
        if primaries != 1 {
            return Err(Error::SchemaMismatch(format!(
                "table must have exactly one primary key column, found {primaries}"
            )));
        }
        if let Some(pk) = columns.iter().find(|c| c.is_primary) {
            if pk.col_type != ColumnType::Integer {
                return Err(Error::SchemaMismatch(format!(
                    "primary key column {:?} must be INTEGER (the B-tree key is a fixed 8-byte unsigned integer)",
                    pk.name
                )));
            }
        }
        Ok(TableSchema { columns })
    }

    pub fn pkey_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c.is_primary)
            .expect("validated at construction: exactly one primary column")
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Fixed schema backing every catalog record: `catalog_id`, `name`,
    /// `root_pagenum`, `sql_text`.
    pub fn catalog_schema() -> TableSchema {
        TableSchema {
            columns: vec![
                ColumnSchema::new("catalog_id", ColumnType::Integer).primary(),
                ColumnSchema::new("name", ColumnType::Text),
                ColumnSchema::new("root_pagenum", ColumnType::Integer),
                ColumnSchema::new("sql_text", ColumnType::Text),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_or_multiple_primary_keys() {
        let no_pk = vec![ColumnSchema::new("a", ColumnType::Integer)];
        assert!(TableSchema::new(no_pk).is_err());

        let two_pk = vec![
            ColumnSchema::new("a", ColumnType::Integer).primary(),
            ColumnSchema::new("b", ColumnType::Integer).primary(),
        ];
        assert!(TableSchema::new(two_pk).is_err());
    }

    #[test]
    fn pkey_index_finds_the_primary_column() {
        let schema = TableSchema::new(vec![
            ColumnSchema::new("name", ColumnType::Text),
            ColumnSchema::new("id", ColumnType::Integer).primary(),
        ])
        .unwrap();
        assert_eq!(schema.pkey_index(), 1);
    }
}
