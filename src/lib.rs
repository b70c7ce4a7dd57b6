//! # KDB — Single-File Embedded Relational Store
//!
//! KDB stores every table as a paged, disk-resident B-tree inside one
//! database file, with a catalog B-tree (created with the file on page 0)
//! mapping table names to their root pages. The crate is the storage
//! engine: the on-disk format, the pager, the B-tree, the record codec,
//! and the cursor/table API that a SQL front end or REPL builds on.
//!
//! ## Quick Start
//!
//! ```ignore
//! use kdb::{ColumnDef, Database, DataType, Value};
//!
//! let mut db = Database::open("app.kdb")?;
//! let mut users = db.create_table(
//!     "users",
//!     vec![
//!         ColumnDef::new("id", DataType::Integer),
//!         ColumnDef::nullable("name", DataType::Text),
//!     ],
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
//! )?;
//!
//! db.insert(&mut users, &[Value::Int(1), Value::from("ada")])?;
//! assert!(db.select_by_pkey(&users, 1)?.is_some());
//! db.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Public API (Database / Table)     │
//! ├─────────────────────────────────────┤
//! │   Catalog (names -> root pages)     │
//! ├─────────────────────────────────────┤
//! │   Record Codec (rows <-> cells)     │
//! ├─────────────────────────────────────┤
//! │   B-Tree (nodes, splits, cursor)    │
//! ├─────────────────────────────────────┤
//! │   Pager (LRU cache + allocator)     │
//! ├─────────────────────────────────────┤
//! │   One file: header + 4KB pages      │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Scope
//!
//! Insert, point lookup, and in-order scan — no deletion, no transactions,
//! no WAL, no concurrent writers. The engine is single-threaded
//! cooperative: it performs no internal synchronization and assumes
//! exclusive ownership of the file between open and close. Callers on
//! multiple threads wrap the handle in their own mutex.
//!
//! ## Module Overview
//!
//! - [`storage`]: file header, page buffers, the pager
//! - [`btree`]: leaf/internal nodes, tree operations, the cursor
//! - [`records`]: schema-driven row encode/decode
//! - [`catalog`]: the table-of-tables on page 0
//! - [`database`]: the `Database`/`Table`/`Row` surface
//! - [`errors`]: typed error kinds carried inside `eyre` reports

#[macro_use]
mod macros;

pub mod btree;
pub mod catalog;
pub mod config;
pub mod database;
pub mod errors;
pub mod records;
pub mod storage;

pub use database::{Database, Row, Rows, Table};
pub use errors::Error;
pub use records::{ColumnDef, DataType, Schema, Value};
