//! # B-Tree Implementation
//!
//! Disk-resident B-tree: every node occupies exactly one page, nodes refer
//! to each other by PageNum through the pager, and each table (plus the
//! catalog) is one tree identified by its root PageNum.
//!
//! ## Node Kinds
//!
//! - **Leaf nodes** hold the records as cells — `[key_size | data_size |
//!   key | data]` bodies growing down from the end of the page, addressed
//!   by a sorted u16 pointer array growing up after the header.
//! - **Internal nodes** hold `(child, key)` separator entries plus a
//!   `right_child`. The subtree under `child_i` contains only keys
//!   `<= key_i`; `right_child` covers keys greater than the last separator.
//!
//! ## Parent Pointers, Not Sibling Pointers
//!
//! Every non-root node stores its parent's PageNum (a root points at
//! itself). There are no next-leaf links: the in-order scan climbs the
//! parent chain and descends into the next sibling subtree. Splits
//! therefore never have a sibling pointer to re-link, at a constant cost in
//! scan.
//!
//! ## Root Mutability
//!
//! Splitting a root allocates a fresh page for the new internal root, so a
//! tree's root PageNum changes over its life. [`BTree::insert`] leaves the
//! current root in the handle; callers that persist a root (the table
//! handle, the catalog record, the file header for the catalog tree) read
//! it back after every mutating call.
//!
//! ## Layout Summary
//!
//! ```text
//! Leaf page                          Internal page
//! +--------------------------+      +--------------------------+
//! | node_type=1  (u8)        |      | node_type=2  (u8)        |
//! | is_root      (u8)        |      | is_root      (u8)        |
//! | parent       (u32)       |      | parent       (u32)       |
//! | num_cells    (u16)       |      | num_keys     (u16)       |
//! | alloc_ptr    (u16)       |      | right_child  (u32)       |
//! +--------------------------+      +--------------------------+
//! | cell_pointers[num_cells] |      | (child u32, key u64)     |
//! | (u16 each, key order)    |      |  x num_keys, key order   |
//! +--------------------------+      +--------------------------+
//! | free space               |      | free space               |
//! +--------------------------+      +--------------------------+
//! | cells (grow downward)    |
//! +--------------------------+
//! ```

mod cursor;
mod internal;
mod leaf;
mod node;
mod tree;

pub use cursor::Cursor;
pub use internal::{ChildSlot, InternalNode, InternalNodeMut};
pub use leaf::{LeafNode, LeafNodeMut, SearchResult};
pub use node::{NodeType, MAX_CELL_DATA};
pub use tree::BTree;
