//! # Error Kinds
//!
//! Typed failure kinds for the storage engine. The crate plumbs errors with
//! [`eyre::Result`] so context can be attached cheaply at each layer; the
//! variants here are constructed at the point the condition arises and ride
//! inside the `eyre::Report`, so callers that need to dispatch on kind can
//! recover them:
//!
//! ```ignore
//! match db.insert(&mut table, &row) {
//!     Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::DuplicateKey(_))) => {
//!         // expected, non-fatal
//!     }
//!     other => other?,
//! }
//! ```
//!
//! ## Fatality
//!
//! `DuplicateKey` and `NotFound` are expected outcomes and mutate nothing.
//! `CorruptNode` aborts the current operation without mutating state. An
//! `Io` error during a mutating operation leaves the in-memory cache
//! potentially out of sync with disk; the handle should be dropped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The file does not start with the `"kdb0"` magic.
    #[error("not a kdb database file (bad magic)")]
    BadMagic,

    /// The file is non-empty but shorter than the 100-byte header.
    #[error("file header truncated: {0} bytes")]
    ShortHeader(u64),

    #[error("i/o error")]
    Io(#[from] std::io::Error),

    /// A page violated a structural invariant while being read.
    #[error("corrupt node on page {page}: {reason}")]
    CorruptNode { page: u32, reason: String },

    /// Insert of a key that is already present.
    #[error("duplicate key {0}")]
    DuplicateKey(u64),

    /// Row shape does not match the table schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Record payload ended before the schema said it would.
    #[error("record truncated: {0}")]
    Truncated(String),

    /// TEXT value longer than its u16 length prefix can carry.
    #[error("text value of {0} bytes exceeds the u16 length prefix")]
    Overflow(usize),

    /// Catalog lookup for a table name that does not exist.
    #[error("no such table: {0}")]
    NotFound(String),
}

impl Error {
    pub(crate) fn corrupt(page: u32, reason: impl Into<String>) -> Self {
        Error::CorruptNode {
            page,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_survive_an_eyre_roundtrip() {
        let report: eyre::Report = Error::DuplicateKey(7).into();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::DuplicateKey(7))
        ));
    }

    #[test]
    fn corrupt_node_carries_page_and_reason() {
        let err = Error::corrupt(3, "pointer array overlaps cells");
        assert_eq!(
            err.to_string(),
            "corrupt node on page 3: pointer array overlaps cells"
        );
    }
}
