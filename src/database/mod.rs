//! # Database Module
//!
//! The high-level API that external collaborators (a SQL front end, a
//! REPL) program against. It wires the pager, the catalog, the record
//! codec, and the per-table B-trees into a handful of calls:
//!
//! ```ignore
//! use kdb::{ColumnDef, Database, DataType, Value};
//!
//! let mut db = Database::open("app.kdb")?;
//! let mut table = db.create_table(
//!     "users",
//!     vec![
//!         ColumnDef::new("id", DataType::Integer),
//!         ColumnDef::nullable("name", DataType::Text),
//!     ],
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
//! )?;
//!
//! db.insert(&mut table, &[Value::Int(1), Value::from("ada")])?;
//! for row in db.select_all(&table)? {
//!     let row = row?;
//!     println!("{} -> {:?}", row.get_int(0)?, row.get_text(1));
//! }
//! db.close()?;
//! ```
//!
//! ## Table Handles and Root Refresh
//!
//! A [`Table`] remembers its tree's root PageNum. Inserting enough rows
//! splits the root and moves it; `insert` takes `&mut Table` exactly so it
//! can refresh the handle in place and rewrite the table's catalog record
//! in the same call. The engine is single-writer: holding two handles to
//! one table and mutating through both is outside the supported
//! discipline.
//!
//! ## Durability
//!
//! Nothing is flushed until [`Database::flush`] or [`Database::close`];
//! dropping the handle without closing loses unflushed pages.

mod row;

pub use row::Row;

use std::path::Path;

use eyre::Result;

use crate::btree::{BTree, Cursor};
use crate::catalog::{Catalog, CatalogEntry};
use crate::errors::Error;
use crate::records::{ColumnDef, RecordBuilder, RecordView, Schema, Value};
use crate::storage::Pager;

/// Handle on one user table.
#[derive(Debug, Clone)]
pub struct Table {
    entry: CatalogEntry,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn root_page(&self) -> u32 {
        self.entry.root_page
    }

    pub fn schema(&self) -> &Schema {
        &self.entry.schema
    }

    pub fn sql(&self) -> &str {
        &self.entry.sql
    }
}

#[derive(Debug)]
pub struct Database {
    pager: Pager,
}

impl Database {
    /// Opens a database file, creating it (with an empty catalog on page
    /// 0) when absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pager = Pager::open(path)?;
        if pager.created() {
            BTree::create_at(&mut pager, 0)?;
        }
        Ok(Self { pager })
    }

    pub fn path(&self) -> &Path {
        self.pager.path()
    }

    /// Defines a new table. The first column is the INTEGER primary key;
    /// `sql` is stored verbatim in the catalog for front ends that want to
    /// reproduce the original statement.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnDef>,
        sql: &str,
    ) -> Result<Table> {
        let schema = Schema::new(columns)?;
        let entry = Catalog::new(&mut self.pager).create(name, &schema, sql)?;
        Ok(Table { entry })
    }

    /// Looks a table up by name; `None` when it does not exist.
    pub fn open_table(&mut self, name: &str) -> Result<Option<Table>> {
        Ok(Catalog::new(&mut self.pager)
            .get(name)?
            .map(|entry| Table { entry }))
    }

    /// Like [`Database::open_table`], but a missing table surfaces as
    /// [`Error::NotFound`].
    pub fn table(&mut self, name: &str) -> Result<Table> {
        let entry = Catalog::new(&mut self.pager).require(name)?;
        Ok(Table { entry })
    }

    /// Names of all tables in the catalog, in creation order.
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        Ok(Catalog::new(&mut self.pager)
            .all()?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Inserts one row. A duplicate primary key fails with
    /// [`Error::DuplicateKey`] and mutates nothing. If the insert split
    /// the table's root, the handle and the catalog record are refreshed
    /// before returning.
    pub fn insert(&mut self, table: &mut Table, row: &[Value]) -> Result<()> {
        let (key, data) = RecordBuilder::new(&table.entry.schema).encode(row)?;

        let mut tree = BTree::new(&mut self.pager, table.entry.root_page);
        tree.insert(key, &data)?;
        let new_root = tree.root_page();

        if new_root != table.entry.root_page {
            Catalog::new(&mut self.pager).update_root(&table.entry, new_root)?;
            table.entry.root_page = new_root;
        }
        Ok(())
    }

    /// Lazy in-order scan. Each item is one decoded row; decode failures
    /// surface per row.
    pub fn select_all(&mut self, table: &Table) -> Result<Rows<'_>> {
        let cursor = Cursor::from_start(&mut self.pager, table.entry.root_page)?;
        Ok(Rows {
            cursor,
            schema: table.entry.schema.clone(),
            poisoned: false,
        })
    }

    /// Point lookup by primary key.
    pub fn select_by_pkey(&mut self, table: &Table, key: u64) -> Result<Option<Row>> {
        let mut tree = BTree::new(&mut self.pager, table.entry.root_page);
        match tree.search(key)? {
            Some(data) => {
                let values = RecordView::new(&table.entry.schema, key, &data)?.decode()?;
                Ok(Some(Row::new(values)))
            }
            None => Ok(None),
        }
    }

    /// Writes all dirty pages and the header to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush_all()
    }

    /// Flushes and closes the database.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }
}

/// Iterator over a table scan; see [`Database::select_all`].
pub struct Rows<'a> {
    cursor: Cursor<'a>,
    schema: Schema,
    poisoned: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned || self.cursor.end_of_table() {
            return None;
        }

        let item = (|| -> Result<Row> {
            let (key, data) = self.cursor.value()?;
            let values = RecordView::new(&self.schema, key, &data)?.decode()?;
            self.cursor.advance()?;
            Ok(Row::new(values))
        })();

        if item.is_err() {
            self.poisoned = true;
        }
        Some(item)
    }
}
