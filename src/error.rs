//! Crate-wide error type.
//!
//! Every fallible operation in the storage engine returns `Result<T, Error>`.
//! Errors are surfaced unchanged to the caller; nothing is retried
//! internally.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The file's first four bytes are not `"kdb0"`.
    #[error("bad magic bytes in database file")]
    BadMagic,

    /// The file is nonempty but shorter than the 100-byte header.
    #[error("database file header is truncated")]
    ShortHeader,

    /// Any I/O failure while reading, writing, or flushing the file.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// A structural invariant was violated while interpreting a page as a node.
    #[error("corrupt node at page {page}: {reason}")]
    CorruptNode { page: u32, reason: String },

    /// Insert where an equal key already exists.
    #[error("duplicate key {0}")]
    DuplicateKey(u64),

    /// A row's column count or types don't match the table schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Not enough bytes remained while decoding a cell.
    #[error("truncated record: {0}")]
    Truncated(String),

    /// A TEXT value exceeded the `u16` length limit.
    #[error("text value of {len} bytes overflows the u16 length prefix")]
    Overflow { len: usize },

    /// A catalog lookup for an unknown table name.
    #[error("no such table: {0}")]
    NotFound(String),

    /// Internal invariant: a page was re-borrowed or evicted while still
    /// pinned by an in-flight mutable borrow. Never expected to surface
    /// across the public API under correct single-writer use.
    #[error("page {0} is still pinned")]
    PagePinned(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
