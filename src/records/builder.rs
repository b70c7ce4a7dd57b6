//! # RecordBuilder — Row Encoding
//!
//! Turns a row of [`Value`]s into the `(key, data)` pair a leaf cell
//! stores. The builder is stateless beyond its schema reference; encoding
//! validates the row against the schema as it walks the columns.

use eyre::Result;

use crate::errors::Error;
use crate::records::schema::Schema;
use crate::records::types::{DataType, Value};

pub struct RecordBuilder<'a> {
    schema: &'a Schema,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Encodes one row. `values` must match the schema's columns in
    /// declared order; the first value becomes the cell key.
    pub fn encode(&self, values: &[Value]) -> Result<(u64, Vec<u8>)> {
        let column_count = self.schema.column_count();
        if values.len() != column_count {
            return Err(Error::SchemaMismatch(format!(
                "row has {} values, table has {} columns",
                values.len(),
                column_count
            ))
            .into());
        }

        let key = match &values[0] {
            Value::Int(key) => *key,
            other => {
                return Err(Error::SchemaMismatch(format!(
                    "primary key '{}' must be an integer, got {:?}",
                    self.schema.pkey().name,
                    other
                ))
                .into())
            }
        };

        let bitmap_size = Schema::null_bitmap_size(column_count);
        let mut data = vec![0u8; bitmap_size];

        for (index, value) in values.iter().enumerate().skip(1) {
            let column = self
                .schema
                .column(index)
                .unwrap_or_else(|| unreachable!("arity checked above"));

            match value {
                Value::Null => {
                    if !column.nullable {
                        return Err(Error::SchemaMismatch(format!(
                            "column '{}' is not nullable",
                            column.name
                        ))
                        .into());
                    }
                    data[index / 8] |= 1 << (index % 8);
                }
                Value::Int(v) => {
                    if column.data_type != DataType::Integer {
                        return Err(Error::SchemaMismatch(format!(
                            "column '{}' expects {}, got an integer",
                            column.name, column.data_type
                        ))
                        .into());
                    }
                    data.extend_from_slice(&v.to_le_bytes());
                }
                Value::Text(s) => {
                    if column.data_type != DataType::Text {
                        return Err(Error::SchemaMismatch(format!(
                            "column '{}' expects {}, got text",
                            column.name, column.data_type
                        ))
                        .into());
                    }
                    if s.len() > u16::MAX as usize {
                        return Err(Error::Overflow(s.len()).into());
                    }
                    data.extend_from_slice(&(s.len() as u16).to_le_bytes());
                    data.extend_from_slice(s.as_bytes());
                }
            }
        }

        Ok((key, data))
    }
}
