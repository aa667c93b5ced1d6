//! `kdb`: a single-file embedded relational store, organized around a
//! paged, disk-resident B-tree per table plus a catalog B-tree that
//! names them. This crate is the storage engine core; a SQL-ish parser
//! or REPL is an external collaborator that drives it through
//! [`db::DbHandle`].

pub mod db;
pub mod error;
pub mod repl;
pub mod storage;
