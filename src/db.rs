//! `DbHandle`: the public API surface external collaborators (a SQL
//! parser, a REPL) drive the storage engine through.

use tracing::info;

use crate::error::Result;
use crate::storage::catalog::Catalog;
use crate::storage::pager::Pager;
use crate::storage::row::Row;
use crate::storage::schema::TableSchema;
use crate::storage::table::Table;
use crate::storage::Value;

/// An open database file. Single-writer, single-threaded: no internal
/// synchronization guards concurrent access to the same handle, so a
/// caller sharing one across threads must wrap it in its own `Mutex`.
pub struct DbHandle {
    pager: Pager,
}

/// A handle to one table within an open database, carrying its own
/// schema and catalog bookkeeping.
pub struct TableHandle {
    table: Table,
}

impl DbHandle {
    /// Opens (or creates) the database file at `path`.
    pub fn open_db(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let pager = Pager::open(path)?;
        Ok(DbHandle { pager })
    }

    /// Creates a new table named `name` with the given schema,
    /// recording `sql_text` as its catalog entry's definition text.
    pub fn create_table(
        &mut self,
        name: &str,
        schema: TableSchema,
        sql_text: &str,
    ) -> Result<TableHandle> {
        info!(table = %name, "creating table");
        let table = Table::create(&mut self.pager, name, schema, sql_text)?;
        Ok(TableHandle { table })
    }

    /// Looks up an existing table by name, if the catalog has one.
    pub fn open_table(&mut self, name: &str) -> Result<Option<TableHandle>> {
        Ok(Table::open(&mut self.pager, name)?.map(|table| TableHandle { table }))
    }

    /// Inserts one row into `table`. Fails with `DuplicateKey` if the
    /// row's primary key already exists.
    pub fn insert(&mut self, table: &mut TableHandle, row_values: Vec<Value>) -> Result<()> {
        table.table.insert_row(&mut self.pager, row_values)
    }

    /// Every row in `table`, in ascending primary-key order.
    pub fn select_all(&mut self, table: &TableHandle) -> Result<Vec<Row>> {
        table.table.select_all(&mut self.pager)
    }

    /// The row with primary key `key` in `table`, if any.
    pub fn select_by_pkey(&mut self, table: &TableHandle, key: u64) -> Result<Option<Row>> {
        table.table.select_by_pkey(&mut self.pager, key)
    }

    /// The catalog entries for every table currently registered.
    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(Catalog::list(&mut self.pager)?.into_iter().map(|e| e.name).collect())
    }

    /// Flushes every dirty page and the file header to disk.
    pub fn close_db(mut self) -> Result<()> {
        self.pager.flush_all()
    }
}

impl TableHandle {
    pub fn name(&self) -> &str {
        self.table.name()
    }

    pub fn schema(&self) -> &TableSchema {
        self.table.schema()
    }

    /// The literal text the table was created with.
    pub fn sql_text(&self) -> &str {
        self.table.sql_text()
    }
}
