//! # Record Codec
//!
//! Schema-driven serialization of typed rows into the `(key, data)` byte
//! fields of a leaf cell.
//!
//! ## Record Binary Layout
//!
//! ```text
//! key  (8 bytes)     the first column's INTEGER value, little-endian;
//!                    stored as the cell key and NOT repeated in data
//! data:
//! +------------------+--------------------------------------------+
//! | Null bitmap      | Columns 1..N in declared order             |
//! | ceil(N/8) bytes  |   INTEGER -> 8 bytes LE                    |
//! |                  |   TEXT    -> u16 length prefix + bytes     |
//! |                  |   NULL    -> no bytes (bitmap bit set)     |
//! +------------------+--------------------------------------------+
//! ```
//!
//! Bit `i` of the bitmap corresponds to column `i`; the primary key
//! occupies bit 0 and is never set. Decoding is driven entirely by the
//! schema the caller supplies — no type tags are stored per row.
//!
//! ## Module Structure
//!
//! - `types`: `DataType`, `ColumnDef`, and the runtime `Value`
//! - `schema`: validated column list (column 0 is the integer primary key)
//! - `builder`: `RecordBuilder` — row values in, `(key, data)` out
//! - `view`: `RecordView` — cell bytes in, row values out

pub mod builder;
pub mod schema;
pub mod types;
pub mod view;

pub use builder::RecordBuilder;
pub use schema::Schema;
pub use types::{ColumnDef, DataType, Value};
pub use view::RecordView;
