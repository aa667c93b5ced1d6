//! Catalog: a B-tree rooted permanently at page 0, mapping a
//! locally-incrementing catalog id to each table's name, root page
//! number, and column definition text.
//! Table lookups by name are a linear scan plus string compare — the
//! catalog's own B-tree key is the id, not the name, so there is no
//! faster path without a secondary index (explicitly out of scope).

use super::btree;
use super::codec::{self, Value};
use super::node::Node;
use super::page::PageNum;
use super::pager::Pager;
use super::schema::{ColumnSchema, ColumnType, TableSchema};
use crate::error::{Error, Result};

const CATALOG_ROOT: PageNum = 0;

/// Separates the caller's literal `sql_text` from the derived
/// `col:TYPE[:null]` schema encoding packed alongside it in the
/// catalog's single `sql_text` column (see `pack_sql_text`/
/// `unpack_sql_text` below). Not expected to appear in real SQL text.
const SQL_TEXT_SCHEMA_SEP: char = '\u{1e}';

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub catalog_id: u64,
    pub name: String,
    pub root_pagenum: PageNum,
    pub schema: TableSchema,
    pub sql_text: String,
}

pub struct Catalog;

impl Catalog {
    pub fn list(pager: &mut Pager) -> Result<Vec<CatalogEntry>> {
        btree::scan(pager, CATALOG_ROOT)?
            .into_iter()
            .map(|(id, bytes)| Self::decode_entry(id, &bytes))
            .collect()
    }

    pub fn find_by_name(pager: &mut Pager, name: &str) -> Result<Option<CatalogEntry>> {
        Ok(Self::list(pager)?.into_iter().find(|e| e.name == name))
    }

    /// Registers a new table, allocating its initial (empty, leaf)
    /// root page and recording its catalog entry, including the
    /// literal `sql_text` the caller created the table with.
    pub fn create(pager: &mut Pager, name: &str, schema: &TableSchema, sql_text: &str) -> Result<CatalogEntry> {
        if Self::find_by_name(pager, name)?.is_some() {
            return Err(Error::SchemaMismatch(format!("table {name:?} already exists")));
        }
        let catalog_id = Self::list(pager)?
            .iter()
            .map(|e| e.catalog_id)
            .max()
            .map_or(1, |max| max + 1);

        let (root_pagenum, handle) = pager.new_page()?;
        Node::new(&mut handle.borrow_mut()).init_leaf(0, true);

        let entry = CatalogEntry {
            catalog_id,
            name: name.to_string(),
            root_pagenum,
            schema: schema.clone(),
            sql_text: sql_text.to_string(),
        };
        let bytes = codec::encode_row(&TableSchema::catalog_schema(), &Self::entry_to_values(&entry))?;
        btree::insert(pager, CATALOG_ROOT, catalog_id, &bytes)?;
        Ok(entry)
    }

    pub fn drop_table(pager: &mut Pager, _name: &str) -> Result<()> {
        Err(Error::SchemaMismatch(
            "dropping tables is not supported: the catalog has no delete operation".into(),
        ))
    }

    /// Republishes `entry`'s current `root_pagenum` after a table's
    /// root changed underneath it (e.g. from a split). The encoded
    /// record is the same length before and after since only the
    /// fixed-width root page number column changes.
    pub fn update_root(pager: &mut Pager, entry: &CatalogEntry, new_root: PageNum) -> Result<()> {
        let mut updated = entry.clone();
        updated.root_pagenum = new_root;
        let bytes = codec::encode_row(&TableSchema::catalog_schema(), &Self::entry_to_values(&updated))?;
        btree::update_in_place(pager, CATALOG_ROOT, entry.catalog_id, &bytes)
    }

    fn entry_to_values(entry: &CatalogEntry) -> Vec<Value> {
        vec![
            Value::Integer(entry.catalog_id as i64),
            Value::Text(entry.name.clone()),
            Value::Integer(entry.root_pagenum as i64),
            Value::Text(pack_sql_text(&entry.sql_text, &entry.schema)),
        ]
    }

    fn decode_entry(catalog_id: u64, bytes: &[u8]) -> Result<CatalogEntry> {
        let values = codec::decode_row(&TableSchema::catalog_schema(), catalog_id, bytes)?;
        let name = values[1]
            .as_text()
            .ok_or_else(|| Error::CorruptNode {
                page: 0,
                reason: "catalog record's name column is not text".into(),
            })?
            .to_string();
        let root_pagenum = values[2]
            .as_integer()
            .ok_or_else(|| Error::CorruptNode {
                page: 0,
                reason: "catalog record's root_pagenum column is not an integer".into(),
            })? as PageNum;
        let packed = values[3].as_text().unwrap_or_default();
        let (sql_text, schema) = unpack_sql_text(packed)?;
        Ok(CatalogEntry {
            catalog_id,
            name,
            root_pagenum,
            schema,
            sql_text,
        })
    }
}

/// Packs the caller's literal `sql_text` together with the schema's
/// own `col:TYPE[:null]` encoding into the single TEXT column the
/// catalog's record layout allots for `sql_text`, so both the text a
/// table was created with and the column types needed to decode its
/// rows survive a reopen.
fn pack_sql_text(sql_text: &str, schema: &TableSchema) -> String {
    format!("{sql_text}{SQL_TEXT_SCHEMA_SEP}{}", schema_to_text(schema))
}

/// Inverse of `pack_sql_text`.
fn unpack_sql_text(packed: &str) -> Result<(String, TableSchema)> {
    let (sql_text, schema_text) = packed.split_once(SQL_TEXT_SCHEMA_SEP).ok_or_else(|| Error::CorruptNode {
        page: 0,
        reason: "catalog record's sql_text column is missing its packed schema encoding".into(),
    })?;
    let schema = schema_from_text(schema_text)?;
    Ok((sql_text.to_string(), schema))
}

/// Renders a schema as the same `col:TYPE[:nullable]` form the demo
/// CLI's `.create` command accepts, so the catalog's stored definition
/// text round-trips through the same tiny grammar a user typed.
pub fn schema_to_text(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| {
            let ty = match c.col_type {
                ColumnType::Integer => "INTEGER",
                ColumnType::Text => "TEXT",
            };
            if c.nullable {
                format!("{}:{}:null", c.name, ty)
            } else {
                format!("{}:{}", c.name, ty)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the text `schema_to_text` produces. The first column is
/// always the table's primary key.
pub fn schema_from_text(text: &str) -> Result<TableSchema> {
    let mut columns = Vec::new();
    for (i, part) in text.split(',').enumerate() {
        let mut fields = part.split(':');
        let name = fields
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::SchemaMismatch(format!("malformed column definition {part:?}")))?;
        let ty = fields
            .next()
            .ok_or_else(|| Error::SchemaMismatch(format!("column {name:?} is missing a type")))?;
        let col_type = match ty {
            "INTEGER" => ColumnType::Integer,
            "TEXT" => ColumnType::Text,
            other => {
                return Err(Error::SchemaMismatch(format!(
                    "unknown column type {other:?} for column {name:?}"
                )))
            }
        };
        let nullable = fields.next() == Some("null");
        let mut col = ColumnSchema::new(name, col_type);
        if nullable {
            col = col.nullable();
        }
        if i == 0 {
            col = col.primary();
        }
        columns.push(col);
    }
    TableSchema::new(columns)
}
