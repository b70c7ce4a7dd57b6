//! # Cursor
//!
//! A position inside one tree: `(page_no, cell_index, end_of_table)`.
//! Cursors drive the in-order scan and point lookups for the table layer.
//!
//! ## Advancing Without Sibling Pointers
//!
//! Leaves do not link to their neighbors. Stepping past the last cell of a
//! leaf climbs the parent chain instead:
//!
//! ```text
//! 1. If the current page is the root, the scan is over
//! 2. Find the current page among its parent's children
//! 3. Sitting in entry i: descend to the leftmost leaf of the subtree to
//!    the right (entry i+1, or right_child after the last entry)
//! 4. Sitting in right_child: the parent is exhausted too; climb again
//! ```
//!
//! Non-root leaves are never empty (splits leave at least one cell on each
//! side), so landing on a leaf always lands on a cell.
//!
//! ## Invalidations
//!
//! `insert` delegates to the tree and may split pages, which moves cells
//! between leaves; the cursor's position is meaningless afterwards and is
//! dropped to `end_of_table`. Callers that need a position re-`find`.

use eyre::{ensure, Result};

use super::internal::{ChildSlot, InternalNode};
use super::leaf::{LeafNode, SearchResult};
use super::node::{NodePrefix, NodeType};
use super::tree::BTree;
use crate::storage::Pager;

pub struct Cursor<'a> {
    pager: &'a mut Pager,
    root_page: u32,
    page_no: u32,
    cell_index: u16,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions at the first cell in key order (the leftmost leaf's cell
    /// 0). An empty tree starts exhausted.
    pub fn from_start(pager: &'a mut Pager, root_page: u32) -> Result<Self> {
        let leaf_page = BTree::new(&mut *pager, root_page).leftmost_leaf()?;

        let num_cells = {
            let data = pager.page(leaf_page)?;
            LeafNode::from_page(leaf_page, data)?.num_cells()
        };

        Ok(Self {
            pager,
            root_page,
            page_no: leaf_page,
            cell_index: 0,
            end_of_table: num_cells == 0,
        })
    }

    /// Positions at the cell where `key` is, or where it would be
    /// inserted. The position is exhausted when the key would land past
    /// the end of its leaf.
    pub fn find(pager: &'a mut Pager, root_page: u32, key: u64) -> Result<Self> {
        let leaf_page = BTree::new(&mut *pager, root_page).find_leaf(key)?;

        let (index, num_cells) = {
            let data = pager.page(leaf_page)?;
            let leaf = LeafNode::from_page(leaf_page, data)?;
            let index = match leaf.find_cell(key)? {
                SearchResult::Found(index) | SearchResult::NotFound(index) => index,
            };
            (index, leaf.num_cells() as usize)
        };

        Ok(Self {
            pager,
            root_page,
            page_no: leaf_page,
            cell_index: index as u16,
            end_of_table: index >= num_cells,
        })
    }

    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    pub fn cell_index(&self) -> u16 {
        self.cell_index
    }

    /// The (possibly refreshed) root this cursor reads from.
    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// The cell under the cursor, copied out.
    pub fn value(&mut self) -> Result<(u64, Vec<u8>)> {
        ensure!(!self.end_of_table, "cursor is past the end of the table");

        let data = self.pager.page(self.page_no)?;
        let leaf = LeafNode::from_page(self.page_no, data)?;
        let (key, payload) = leaf.cell(self.cell_index as usize)?;
        Ok((key, payload.to_vec()))
    }

    /// Moves to the next cell in key order, climbing to the next leaf via
    /// the parent chain when this one is exhausted.
    pub fn advance(&mut self) -> Result<()> {
        if self.end_of_table {
            return Ok(());
        }

        self.cell_index += 1;
        let num_cells = {
            let data = self.pager.page(self.page_no)?;
            LeafNode::from_page(self.page_no, data)?.num_cells()
        };
        if self.cell_index < num_cells {
            return Ok(());
        }

        let mut current = self.page_no;
        loop {
            let (is_root, parent) = {
                let data = self.pager.page(current)?;
                let prefix = NodePrefix::from_bytes(data);
                (prefix.is_root(), prefix.parent())
            };

            if is_root {
                self.end_of_table = true;
                return Ok(());
            }

            let next_subtree = {
                let data = self.pager.page(parent)?;
                let node = InternalNode::from_page(parent, data)?;
                match node.slot_of(current)? {
                    ChildSlot::Entry(i) => {
                        if i + 1 < node.num_keys() as usize {
                            Some(node.entry(i + 1)?.child())
                        } else {
                            Some(node.right_child())
                        }
                    }
                    ChildSlot::Right => None,
                }
            };

            match next_subtree {
                Some(subtree) => {
                    self.page_no = self.descend_leftmost(subtree)?;
                    self.cell_index = 0;
                    return Ok(());
                }
                None => current = parent,
            }
        }
    }

    /// Inserts through the tree. Splits may shuffle cells between leaves,
    /// so the cursor's position is invalidated; the (possibly new) root is
    /// returned and also remembered by the cursor.
    pub fn insert(&mut self, key: u64, data: &[u8]) -> Result<u32> {
        let mut tree = BTree::new(&mut *self.pager, self.root_page);
        tree.insert(key, data)?;
        self.root_page = tree.root_page();
        self.end_of_table = true;
        Ok(self.root_page)
    }

    fn descend_leftmost(&mut self, from: u32) -> Result<u32> {
        let mut current = from;
        loop {
            let data = self.pager.page(current)?;
            match NodeType::from_page(current, data)? {
                NodeType::Leaf => return Ok(current),
                NodeType::Internal => {
                    let node = InternalNode::from_page(current, data)?;
                    current = if node.num_keys() > 0 {
                        node.entry(0)?.child()
                    } else {
                        node.right_child()
                    };
                }
            }
        }
    }
}
