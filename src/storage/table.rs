//! `Table`: a catalog entry plus the schema needed to encode and
//! decode its rows. Owns no pager — every operation takes the shared
//! `Pager` by `&mut` reference, the same free-function style `btree`
//! and `cursor` use, so a `Table` is cheap to hand around and never
//! fights the borrow checker over who holds the database file.

use tracing::debug;

use super::btree;
use super::catalog::{Catalog, CatalogEntry};
use super::codec::{self, Value};
use super::cursor::Cursor;
use super::pager::Pager;
use super::row::Row;
use super::schema::TableSchema;
use crate::error::Result;

pub struct Table {
    entry: CatalogEntry,
}

impl Table {
    pub fn open(pager: &mut Pager, name: &str) -> Result<Option<Self>> {
        Ok(Catalog::find_by_name(pager, name)?.map(|entry| Table { entry }))
    }

    pub fn create(pager: &mut Pager, name: &str, schema: TableSchema, sql_text: &str) -> Result<Self> {
        let entry = Catalog::create(pager, name, &schema, sql_text)?;
        Ok(Table { entry })
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.entry.schema
    }

    /// The literal text the table was created with.
    pub fn sql_text(&self) -> &str {
        &self.entry.sql_text
    }

    pub fn root_pagenum(&self) -> u32 {
        self.entry.root_pagenum
    }

    pub fn insert_row(&mut self, pager: &mut Pager, values: Vec<Value>) -> Result<()> {
        let row = Row::new(values);
        let key = row.pkey(&self.entry.schema)?;
        let data = codec::encode_row(&self.entry.schema, &row.values)?;
        debug!(table = %self.entry.name, key, "inserting row");
        let new_root = btree::insert(pager, self.entry.root_pagenum, key, &data)?;
        if new_root != self.entry.root_pagenum {
            debug!(table = %self.entry.name, old = self.entry.root_pagenum, new = new_root, "root changed, republishing to catalog");
            Catalog::update_root(pager, &self.entry, new_root)?;
            self.entry.root_pagenum = new_root;
        }
        Ok(())
    }

    pub fn select_by_pkey(&self, pager: &mut Pager, key: u64) -> Result<Option<Row>> {
        match btree::search(pager, self.entry.root_pagenum, key)? {
            Some(bytes) => Ok(Some(Row::new(codec::decode_row(&self.entry.schema, key, &bytes)?))),
            None => Ok(None),
        }
    }

    pub fn select_all(&self, pager: &mut Pager) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut cursor = Cursor::from_start(pager, self.entry.root_pagenum)?;
        while let Some((key, bytes)) = cursor.value(pager)? {
            rows.push(Row::new(codec::decode_row(&self.entry.schema, key, &bytes)?));
            cursor.advance(pager)?;
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{ColumnSchema, ColumnType};
    use tempfile::NamedTempFile;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer).primary(),
            ColumnSchema::new("name", ColumnType::Text),
        ])
        .unwrap()
    }

    #[test]
    fn insert_and_select_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(tmp.path()).unwrap();
        let mut table = Table::create(&mut pager, "users", schema(), "CREATE TABLE users(...)").unwrap();
        table
            .insert_row(&mut pager, vec![Value::Integer(1), Value::Text("ada".into())])
            .unwrap();
        table
            .insert_row(&mut pager, vec![Value::Integer(2), Value::Text("grace".into())])
            .unwrap();

        let row = table.select_by_pkey(&mut pager, 1).unwrap().unwrap();
        assert_eq!(row.values[1], Value::Text("ada".into()));
        assert!(table.select_by_pkey(&mut pager, 999).unwrap().is_none());

        let all = table.select_all(&mut pager).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn duplicate_primary_key_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(tmp.path()).unwrap();
        let mut table = Table::create(&mut pager, "users", schema(), "CREATE TABLE users(...)").unwrap();
        table
            .insert_row(&mut pager, vec![Value::Integer(1), Value::Text("ada".into())])
            .unwrap();
        let err = table
            .insert_row(&mut pager, vec![Value::Integer(1), Value::Text("again".into())])
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::DuplicateKey(1)));
    }

    #[test]
    fn root_page_change_from_a_split_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(tmp.path()).unwrap();
            let mut table = Table::create(&mut pager, "wide", schema(), "CREATE TABLE wide(...)").unwrap();
            let big_name = "x".repeat(500);
            for id in 0..50 {
                table
                    .insert_row(&mut pager, vec![Value::Integer(id), Value::Text(big_name.clone())])
                    .unwrap();
            }
            pager.flush_all().unwrap();
        }
        let mut pager = Pager::open(tmp.path()).unwrap();
        let table = Table::open(&mut pager, "wide").unwrap().unwrap();
        assert_eq!(table.select_all(&mut pager).unwrap().len(), 50);
    }
}
