//! `Row`: an ordered tuple of decoded [`Value`]s, paired with schema
//! lookups by column name.

use super::codec::Value;
use super::schema::TableSchema;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    pub fn get(&self, schema: &TableSchema, column: &str) -> Option<&Value> {
        let idx = schema.column_index(column)?;
        self.values.get(idx)
    }

    /// The row's primary key, read from whichever column the schema
    /// marks `is_primary`. Primary key columns are always `Integer`.
    pub fn pkey(&self, schema: &TableSchema) -> Result<u64> {
        let idx = schema.pkey_index();
        match self.values.get(idx) {
            Some(Value::Integer(v)) if *v >= 0 => Ok(*v as u64),
            Some(Value::Integer(v)) => Err(Error::SchemaMismatch(format!(
                "primary key values must be non-negative, got {v}"
            ))),
            Some(other) => Err(Error::SchemaMismatch(format!(
                "primary key column must be an integer, got {other:?}"
            ))),
            None => Err(Error::SchemaMismatch("row is missing its primary key column".into())),
        }
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{ColumnSchema, ColumnType};

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new("name", ColumnType::Text),
            ColumnSchema::new("id", ColumnType::Integer).primary(),
        ])
        .unwrap()
    }

    #[test]
    fn pkey_reads_from_the_primary_column_regardless_of_position() {
        let row = Row::new(vec![Value::Text("ada".into()), Value::Integer(7)]);
        assert_eq!(row.pkey(&schema()).unwrap(), 7);
    }

    #[test]
    fn get_looks_up_by_column_name() {
        let row = Row::new(vec![Value::Text("ada".into()), Value::Integer(7)]);
        assert_eq!(row.get(&schema(), "name"), Some(&Value::Text("ada".into())));
        assert_eq!(row.get(&schema(), "missing"), None);
    }

    #[test]
    fn display_pipe_joins_values() {
        let row = Row::new(vec![Value::Text("ada".into()), Value::Integer(7)]);
        assert_eq!(row.to_string(), "ada|7");
    }
}
