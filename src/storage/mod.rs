//! Storage engine core: a page buffer, a disk-backed pager, B-tree
//! node and tree operations, a cursor, the record codec, and the
//! catalog that names tables, composed into [`table::Table`].

pub mod btree;
pub mod catalog;
pub mod codec;
pub mod cursor;
pub mod node;
pub mod page;
pub mod pager;
pub mod row;
pub mod schema;
pub mod table;

pub use catalog::Catalog;
pub use codec::Value;
pub use cursor::Cursor;
pub use pager::Pager;
pub use row::Row;
pub use schema::{ColumnSchema, ColumnType, TableSchema};
pub use table::Table;
