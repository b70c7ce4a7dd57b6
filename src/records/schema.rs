//! # Schema Definition
//!
//! A validated, ordered column list. Column 0 is the table's primary key
//! and must be a non-nullable INTEGER — its value becomes the cell key.

use crate::errors::Error;
use crate::records::types::{ColumnDef, DataType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self, Error> {
        let pkey = columns
            .first()
            .ok_or_else(|| Error::SchemaMismatch("a table needs at least one column".into()))?;

        if pkey.data_type != DataType::Integer {
            return Err(Error::SchemaMismatch(format!(
                "primary key column '{}' must be INTEGER",
                pkey.name
            )));
        }
        if pkey.nullable {
            return Err(Error::SchemaMismatch(format!(
                "primary key column '{}' cannot be nullable",
                pkey.name
            )));
        }

        Ok(Self { columns })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.get(index)
    }

    pub fn pkey(&self) -> &ColumnDef {
        &self.columns[0]
    }

    pub fn null_bitmap_size(column_count: usize) -> usize {
        column_count.div_ceil(8)
    }
}
