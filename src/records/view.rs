//! # RecordView — Row Decoding
//!
//! Reads a cell's `(key, data)` bytes back into [`Value`]s, driven by the
//! caller's schema. The view checks the bitmap and every length prefix
//! against the buffer and surfaces shortfalls as `Truncated`; bytes left
//! over after the last column mean the schema does not match the record
//! and surface as `SchemaMismatch`.

use eyre::Result;

use crate::errors::Error;
use crate::records::schema::Schema;
use crate::records::types::{DataType, Value};

#[derive(Debug)]
pub struct RecordView<'a> {
    schema: &'a Schema,
    key: u64,
    data: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn new(schema: &'a Schema, key: u64, data: &'a [u8]) -> Result<Self> {
        let bitmap_size = Schema::null_bitmap_size(schema.column_count());
        if data.len() < bitmap_size {
            return Err(Error::Truncated(format!(
                "record of {} bytes is shorter than its {}-byte null bitmap",
                data.len(),
                bitmap_size
            ))
            .into());
        }
        Ok(Self { schema, key, data })
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.data[index / 8] & (1 << (index % 8)) != 0
    }

    /// Decodes the whole row, primary key first.
    pub fn decode(&self) -> Result<Vec<Value>> {
        let column_count = self.schema.column_count();
        let mut values = Vec::with_capacity(column_count);
        values.push(Value::Int(self.key));

        let mut offset = Schema::null_bitmap_size(column_count);

        for index in 1..column_count {
            let column = self
                .schema
                .column(index)
                .unwrap_or_else(|| unreachable!("index bounded by column_count"));

            if self.is_null(index) {
                if !column.nullable {
                    return Err(Error::SchemaMismatch(format!(
                        "column '{}' is not nullable but the record marks it NULL",
                        column.name
                    ))
                    .into());
                }
                values.push(Value::Null);
                continue;
            }

            match column.data_type {
                DataType::Integer => {
                    let bytes = self.take(&mut offset, 8, &column.name)?;
                    let array: [u8; 8] = bytes
                        .try_into()
                        .unwrap_or_else(|_| unreachable!("take() returned 8 bytes"));
                    values.push(Value::Int(u64::from_le_bytes(array)));
                }
                DataType::Text => {
                    let prefix = self.take(&mut offset, 2, &column.name)?;
                    let len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
                    let bytes = self.take(&mut offset, len, &column.name)?;
                    let text = std::str::from_utf8(bytes).map_err(|_| {
                        Error::SchemaMismatch(format!(
                            "column '{}' holds invalid UTF-8",
                            column.name
                        ))
                    })?;
                    values.push(Value::Text(text.to_string()));
                }
            }
        }

        if offset != self.data.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} trailing bytes after the last column",
                self.data.len() - offset
            ))
            .into());
        }

        Ok(values)
    }

    fn take(&self, offset: &mut usize, len: usize, column: &str) -> Result<&'a [u8]> {
        let end = *offset + len;
        if end > self.data.len() {
            return Err(Error::Truncated(format!(
                "column '{}' needs {} bytes at offset {}, record has {}",
                column,
                len,
                offset,
                self.data.len()
            ))
            .into());
        }
        let bytes = &self.data[*offset..end];
        *offset = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::builder::RecordBuilder;
    use crate::records::types::ColumnDef;

    fn users_schema() -> Schema {
        Schema::new(vec![
            ColumnDef::new("id", DataType::Integer),
            ColumnDef::nullable("name", DataType::Text),
            ColumnDef::nullable("age", DataType::Integer),
        ])
        .unwrap()
    }

    fn round_trip(schema: &Schema, row: Vec<Value>) -> Vec<Value> {
        let (key, data) = RecordBuilder::new(schema).encode(&row).unwrap();
        RecordView::new(schema, key, &data).unwrap().decode().unwrap()
    }

    #[test]
    fn full_row_round_trips() {
        let schema = users_schema();
        let row = vec![Value::Int(1), Value::from("grace"), Value::Int(85)];
        assert_eq!(round_trip(&schema, row.clone()), row);
    }

    #[test]
    fn nulls_round_trip() {
        let schema = users_schema();
        let row = vec![Value::Int(2), Value::Null, Value::Null];
        assert_eq!(round_trip(&schema, row.clone()), row);
    }

    #[test]
    fn empty_text_round_trips() {
        let schema = users_schema();
        let row = vec![Value::Int(3), Value::from(""), Value::Int(0)];
        assert_eq!(round_trip(&schema, row.clone()), row);
    }

    #[test]
    fn key_only_schema_round_trips() {
        let schema = Schema::new(vec![ColumnDef::new("id", DataType::Integer)]).unwrap();
        let row = vec![Value::Int(u64::MAX)];
        assert_eq!(round_trip(&schema, row.clone()), row);
    }

    #[test]
    fn cut_payload_is_truncated() {
        let schema = users_schema();
        let (key, data) = RecordBuilder::new(&schema)
            .encode(&[Value::Int(1), Value::from("somebody"), Value::Int(1)])
            .unwrap();

        let err = RecordView::new(&schema, key, &data[..data.len() - 4])
            .unwrap()
            .decode()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Truncated(_))
        ));
    }

    #[test]
    fn missing_bitmap_is_truncated() {
        let schema = users_schema();
        let err = RecordView::new(&schema, 1, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Truncated(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_a_schema_mismatch() {
        let schema = users_schema();
        let (key, mut data) = RecordBuilder::new(&schema)
            .encode(&[Value::Int(1), Value::from("a"), Value::Int(2)])
            .unwrap();
        data.push(0xFF);

        let err = RecordView::new(&schema, key, &data)
            .unwrap()
            .decode()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SchemaMismatch(_))
        ));
    }
}
