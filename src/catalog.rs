//! # Catalog
//!
//! The catalog is itself a B-tree, created together with the file on page
//! 0, whose records describe every user table:
//!
//! ```text
//! (id INTEGER PRIMARY KEY, name TEXT, root_page INTEGER, sql TEXT, columns TEXT)
//! ```
//!
//! `columns` persists the table's column definitions in a compact one-line
//! form — `"id INTEGER, name TEXT NULL"` — so a table opened later can be
//! decoded without re-parsing its SQL text. Records are encoded with the
//! ordinary record codec; the catalog is a table like any other, it just
//! has a fixed schema and its root PageNum lives in the file header.
//!
//! ## Root Changes
//!
//! A user table's root moves when its root splits; the catalog record is
//! then rewritten in place (the `root_page` column is fixed-width, so the
//! record's size never changes and no delete support is needed). When the
//! catalog's own root splits, the new root PageNum is written back to the
//! file header.

use eyre::{bail, ensure, Result, WrapErr};
use tracing::debug;

use crate::btree::{BTree, Cursor};
use crate::errors::Error;
use crate::records::{ColumnDef, DataType, RecordBuilder, RecordView, Schema, Value};
use crate::storage::Pager;

/// One catalog record, decoded.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    pub root_page: u32,
    pub sql: String,
    pub schema: Schema,
}

pub struct Catalog<'a> {
    pager: &'a mut Pager,
}

fn catalog_schema() -> Schema {
    Schema::new(vec![
        ColumnDef::new("id", DataType::Integer),
        ColumnDef::new("name", DataType::Text),
        ColumnDef::new("root_page", DataType::Integer),
        ColumnDef::new("sql", DataType::Text),
        ColumnDef::new("columns", DataType::Text),
    ])
    .unwrap_or_else(|_| unreachable!("the catalog schema is well-formed"))
}

/// `"name TYPE [NULL]"` entries joined by `", "`.
fn format_columns(schema: &Schema) -> String {
    schema
        .columns()
        .iter()
        .map(|col| {
            if col.nullable {
                format!("{} {} NULL", col.name, col.data_type)
            } else {
                format!("{} {}", col.name, col.data_type)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_columns(text: &str) -> Result<Schema> {
    let mut columns = Vec::new();
    for part in text.split(", ") {
        let mut tokens = part.split(' ');
        let (name, type_name) = match (tokens.next(), tokens.next()) {
            (Some(name), Some(type_name)) => (name, type_name),
            _ => bail!("malformed catalog column entry '{}'", part),
        };
        let data_type: DataType = type_name.parse()?;
        let column = match tokens.next() {
            None => ColumnDef::new(name, data_type),
            Some("NULL") => ColumnDef::nullable(name, data_type),
            Some(other) => bail!("unexpected token '{}' in catalog column entry", other),
        };
        columns.push(column);
    }
    Ok(Schema::new(columns)?)
}

fn decode_entry(schema: &Schema, key: u64, data: &[u8]) -> Result<CatalogEntry> {
    let values = RecordView::new(schema, key, data)?.decode()?;
    match &values[..] {
        [Value::Int(id), Value::Text(name), Value::Int(root_page), Value::Text(sql), Value::Text(columns)] =>
        {
            ensure!(
                *root_page <= u32::MAX as u64,
                "catalog root_page {} does not fit a PageNum",
                root_page
            );
            Ok(CatalogEntry {
                id: *id,
                name: name.clone(),
                root_page: *root_page as u32,
                sql: sql.clone(),
                schema: parse_columns(columns)
                    .wrap_err_with(|| format!("bad column list for table '{}'", name))?,
            })
        }
        _ => bail!("catalog record {} has an unexpected shape", key),
    }
}

impl<'a> Catalog<'a> {
    pub fn new(pager: &'a mut Pager) -> Self {
        Self { pager }
    }

    /// All catalog entries, in id order.
    pub fn all(&mut self) -> Result<Vec<CatalogEntry>> {
        let schema = catalog_schema();
        let root = self.pager.catalog_root();
        let mut cursor = Cursor::from_start(&mut *self.pager, root)?;

        let mut entries = Vec::new();
        while !cursor.end_of_table() {
            let (key, data) = cursor.value()?;
            entries.push(decode_entry(&schema, key, &data)?);
            cursor.advance()?;
        }
        Ok(entries)
    }

    pub fn get(&mut self, name: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.all()?.into_iter().find(|entry| entry.name == name))
    }

    /// Like [`Catalog::get`] but a missing table is an error.
    pub fn require(&mut self, name: &str) -> Result<CatalogEntry> {
        self.get(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()).into())
    }

    /// Registers a new table: allocates its root leaf and inserts the
    /// catalog record. The table name must be unused.
    pub fn create(&mut self, name: &str, schema: &Schema, sql: &str) -> Result<CatalogEntry> {
        ensure!(!name.is_empty(), "table name cannot be empty");
        for col in schema.columns() {
            ensure!(
                !col.name.is_empty() && !col.name.contains([',', ' ']),
                "column name '{}' is not storable in the catalog",
                col.name
            );
        }

        let existing = self.all()?;
        ensure!(
            existing.iter().all(|entry| entry.name != name),
            "table '{}' already exists",
            name
        );
        let id = existing.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;

        let root_page = BTree::create(&mut *self.pager)?.root_page();

        let entry = CatalogEntry {
            id,
            name: name.to_string(),
            root_page,
            sql: sql.to_string(),
            schema: schema.clone(),
        };
        self.insert_entry(&entry)?;

        debug!(table = name, id, root_page, "created table");
        Ok(entry)
    }

    /// Rewrites a table's catalog record after its root split. The record
    /// keeps its size (only the fixed-width `root_page` column changes),
    /// so this never splits the catalog.
    pub fn update_root(&mut self, entry: &CatalogEntry, new_root: u32) -> Result<()> {
        let schema = catalog_schema();
        let (key, data) = RecordBuilder::new(&schema).encode(&[
            Value::Int(entry.id),
            Value::Text(entry.name.clone()),
            Value::Int(new_root as u64),
            Value::Text(entry.sql.clone()),
            Value::Text(format_columns(&entry.schema)),
        ])?;

        let root = self.pager.catalog_root();
        BTree::new(&mut *self.pager, root).update_in_place(key, &data)?;
        debug!(table = %entry.name, new_root, "updated table root");
        Ok(())
    }

    fn insert_entry(&mut self, entry: &CatalogEntry) -> Result<()> {
        let schema = catalog_schema();
        let (key, data) = RecordBuilder::new(&schema).encode(&[
            Value::Int(entry.id),
            Value::Text(entry.name.clone()),
            Value::Int(entry.root_page as u64),
            Value::Text(entry.sql.clone()),
            Value::Text(format_columns(&entry.schema)),
        ])?;

        let root = self.pager.catalog_root();
        let mut tree = BTree::new(&mut *self.pager, root);
        tree.insert(key, &data)?;

        let new_root = tree.root_page();
        if new_root != root {
            self.pager.set_catalog_root(new_root);
        }
        Ok(())
    }
}
