//! # File Header
//!
//! The 100-byte header at the start of every database file.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field           Description
//! ------  ----  --------------  ----------------------------------------
//! 0       4     magic           "kdb0"
//! 4       4     next_free_page  Next PageNum the pager will hand out
//! 8       1     has_free_list   Reserved; always 0 (deletion unsupported)
//! 9       3     padding         Zero
//! 12      4     catalog_root    PageNum of the catalog tree's root
//! 16      84    reserved        Zero
//! ```
//!
//! All multi-byte fields are little-endian. `catalog_root` starts at 0 (the
//! page created with the file) and is rewritten when the catalog root
//! splits.

use eyre::Result;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::FILE_HEADER_SIZE;
use crate::errors::Error;

pub const MAGIC: &[u8; 4] = b"kdb0";

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    magic: [u8; 4],
    next_free_page: U32,
    has_free_list: u8,
    padding: [u8; 3],
    catalog_root: U32,
    reserved: [u8; 84],
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    /// Header for a freshly created file: page 0 is the catalog root and
    /// the next allocation will return page 1.
    pub fn new() -> Self {
        Self {
            magic: *MAGIC,
            next_free_page: U32::new(1),
            has_free_list: 0,
            padding: [0; 3],
            catalog_root: U32::new(0),
            reserved: [0; 84],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(Error::ShortHeader(bytes.len() as u64).into());
        }

        let header = Self::read_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse file header: {:?}", e))?;

        if &header.magic != MAGIC {
            return Err(Error::BadMagic.into());
        }

        Ok(header)
    }

    zerocopy_accessors! {
        next_free_page: u32,
        catalog_root: u32,
    }

    pub fn has_free_list(&self) -> bool {
        self.has_free_list != 0
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
