//! # Node Headers
//!
//! Zerocopy views over the fixed-offset node headers. Both node kinds share
//! a 6-byte prefix (`node_type`, `is_root`, `parent`), which lets code that
//! only walks the parent chain stay agnostic of the kind.
//!
//! Offsets are part of the file format:
//!
//! ```text
//! Leaf                         Internal
//! 0  node_type: u8 (= 1)       0  node_type: u8 (= 2)
//! 1  is_root:   u8             1  is_root:   u8
//! 2  parent:    u32            2  parent:    u32
//! 6  num_cells: u16            6  num_keys:  u16
//! 8  alloc_ptr: u16            8  right_child: u32
//! 10 cell_pointers...          12 entries...
//! ```

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    CELL_HEADER_SIZE, CELL_POINTER_SIZE, INTERNAL_HEADER_SIZE, KEY_SIZE, LEAF_HEADER_SIZE,
    PAGE_SIZE,
};
use crate::errors::Error;

/// Largest data payload a single cell can carry: one cell must fit in an
/// otherwise empty leaf.
pub const MAX_CELL_DATA: usize =
    PAGE_SIZE - LEAF_HEADER_SIZE - CELL_POINTER_SIZE - CELL_HEADER_SIZE - KEY_SIZE;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf = 1,
    Internal = 2,
}

impl NodeType {
    pub fn from_page(page_no: u32, data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        match data[0] {
            1 => Ok(NodeType::Leaf),
            2 => Ok(NodeType::Internal),
            other => {
                Err(Error::corrupt(page_no, format!("unknown node type {:#04x}", other)).into())
            }
        }
    }
}

/// The 6-byte prefix common to both node kinds.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodePrefix {
    node_type: u8,
    is_root: u8,
    parent: U32,
}

impl NodePrefix {
    pub fn from_bytes(data: &[u8]) -> &Self {
        Self::ref_from_bytes(&data[..size_of::<Self>()])
            .unwrap_or_else(|_| unreachable!("page is larger than the node prefix"))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> &mut Self {
        Self::mut_from_bytes(&mut data[..size_of::<Self>()])
            .unwrap_or_else(|_| unreachable!("page is larger than the node prefix"))
    }

    pub fn is_root(&self) -> bool {
        self.is_root != 0
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root as u8;
    }

    zerocopy_accessors! {
        parent: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LeafHeader {
    node_type: u8,
    is_root: u8,
    parent: U32,
    num_cells: U16,
    alloc_ptr: U16,
}

const _: () = assert!(std::mem::size_of::<LeafHeader>() == LEAF_HEADER_SIZE);

impl LeafHeader {
    pub fn init(data: &mut [u8], parent: u32, is_root: bool) {
        let header = Self::from_bytes_mut(data);
        header.node_type = NodeType::Leaf as u8;
        header.is_root = is_root as u8;
        header.parent = U32::new(parent);
        header.num_cells = U16::new(0);
        header.alloc_ptr = U16::new(PAGE_SIZE as u16);
    }

    pub fn from_bytes(data: &[u8]) -> &Self {
        Self::ref_from_bytes(&data[..LEAF_HEADER_SIZE])
            .unwrap_or_else(|_| unreachable!("page is larger than the leaf header"))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> &mut Self {
        Self::mut_from_bytes(&mut data[..LEAF_HEADER_SIZE])
            .unwrap_or_else(|_| unreachable!("page is larger than the leaf header"))
    }

    pub fn is_root(&self) -> bool {
        self.is_root != 0
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root as u8;
    }

    zerocopy_accessors! {
        parent: u32,
        num_cells: u16,
        alloc_ptr: u16,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct InternalHeader {
    node_type: u8,
    is_root: u8,
    parent: U32,
    num_keys: U16,
    right_child: U32,
}

const _: () = assert!(std::mem::size_of::<InternalHeader>() == INTERNAL_HEADER_SIZE);

impl InternalHeader {
    pub fn init(data: &mut [u8], parent: u32, is_root: bool, right_child: u32) {
        let header = Self::from_bytes_mut(data);
        header.node_type = NodeType::Internal as u8;
        header.is_root = is_root as u8;
        header.parent = U32::new(parent);
        header.num_keys = U16::new(0);
        header.right_child = U32::new(right_child);
    }

    pub fn from_bytes(data: &[u8]) -> &Self {
        Self::ref_from_bytes(&data[..INTERNAL_HEADER_SIZE])
            .unwrap_or_else(|_| unreachable!("page is larger than the internal header"))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> &mut Self {
        Self::mut_from_bytes(&mut data[..INTERNAL_HEADER_SIZE])
            .unwrap_or_else(|_| unreachable!("page is larger than the internal header"))
    }

    pub fn is_root(&self) -> bool {
        self.is_root != 0
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root as u8;
    }

    zerocopy_accessors! {
        parent: u32,
        num_keys: u16,
        right_child: u32,
    }
}

/// One internal-node entry: the child whose subtree holds keys `<= key`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ChildEntry {
    child: U32,
    key: U64,
}

impl ChildEntry {
    pub fn new(child: u32, key: u64) -> Self {
        Self {
            child: U32::new(child),
            key: U64::new(key),
        }
    }

    pub fn child(&self) -> u32 {
        self.child.get()
    }

    pub fn key(&self) -> u64 {
        self.key.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes_match_the_file_format() {
        assert_eq!(size_of::<LeafHeader>(), 10);
        assert_eq!(size_of::<InternalHeader>(), 12);
        assert_eq!(size_of::<ChildEntry>(), 12);
        assert_eq!(size_of::<NodePrefix>(), 6);
    }

    #[test]
    fn node_type_round_trips_through_page_bytes() {
        let mut page = vec![0u8; PAGE_SIZE];
        LeafHeader::init(&mut page, 3, true);

        assert_eq!(NodeType::from_page(0, &page).unwrap(), NodeType::Leaf);
        let prefix = NodePrefix::from_bytes(&page);
        assert!(prefix.is_root());
        assert_eq!(prefix.parent(), 3);
    }

    #[test]
    fn unknown_node_type_is_corrupt() {
        let mut page = vec![0u8; PAGE_SIZE];
        page[0] = 0x7F;

        let err = NodeType::from_page(5, &page).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CorruptNode { page: 5, .. })
        ));
    }

    #[test]
    fn leaf_init_points_alloc_at_page_end() {
        let mut page = vec![0u8; PAGE_SIZE];
        LeafHeader::init(&mut page, 0, false);

        let header = LeafHeader::from_bytes(&page);
        assert_eq!(header.num_cells(), 0);
        assert_eq!(header.alloc_ptr(), PAGE_SIZE as u16);
        assert!(!header.is_root());
    }

    #[test]
    fn internal_init_records_right_child() {
        let mut page = vec![0u8; PAGE_SIZE];
        InternalHeader::init(&mut page, 9, true, 42);

        let header = InternalHeader::from_bytes(&page);
        assert_eq!(header.num_keys(), 0);
        assert_eq!(header.right_child(), 42);
        assert_eq!(header.parent(), 9);
    }
}
