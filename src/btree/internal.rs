//! # Internal Node Operations
//!
//! Internal nodes hold `num_keys` entries of `(child PageNum, separator
//! key)` in ascending key order, plus a `right_child` for keys greater than
//! the last separator. Every separator equals the maximum key of its left
//! subtree, so navigation for a key K picks the first entry with
//! `key_i >= K` and falls through to `right_child`.
//!
//! Entries are fixed 12-byte records directly after the header, which keeps
//! inserts a single `copy_within` and lets navigation binary-search without
//! touching a cell area.

use eyre::{ensure, Result};
use zerocopy::{FromBytes, IntoBytes};

use super::node::{ChildEntry, InternalHeader, NodeType};
use crate::config::{INTERNAL_ENTRY_SIZE, INTERNAL_HEADER_SIZE, INTERNAL_MAX_KEYS, PAGE_SIZE};
use crate::errors::Error;

/// Where a child page sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSlot {
    /// `entries[i].child`.
    Entry(usize),
    /// The `right_child` pointer.
    Right,
}

#[derive(Debug)]
pub struct InternalNode<'a> {
    data: &'a [u8],
    page_no: u32,
}

pub struct InternalNodeMut<'a> {
    data: &'a mut [u8],
    page_no: u32,
}

fn validate(page_no: u32, data: &[u8]) -> Result<()> {
    if NodeType::from_page(page_no, data)? != NodeType::Internal {
        return Err(Error::corrupt(page_no, "expected an internal node").into());
    }

    let header = InternalHeader::from_bytes(data);
    let entries_end =
        INTERNAL_HEADER_SIZE + header.num_keys() as usize * INTERNAL_ENTRY_SIZE;
    if entries_end > PAGE_SIZE {
        return Err(Error::corrupt(
            page_no,
            format!("{} entries extend past the page end", header.num_keys()),
        )
        .into());
    }
    Ok(())
}

fn entry_offset(index: usize) -> usize {
    INTERNAL_HEADER_SIZE + index * INTERNAL_ENTRY_SIZE
}

fn entry_at(data: &[u8], index: usize) -> ChildEntry {
    let offset = entry_offset(index);
    ChildEntry::read_from_bytes(&data[offset..offset + INTERNAL_ENTRY_SIZE])
        .unwrap_or_else(|_| unreachable!("entry bounds validated against num_keys"))
}

fn find_child_in(data: &[u8], key: u64) -> (u32, Option<usize>) {
    let header = InternalHeader::from_bytes(data);
    let count = header.num_keys() as usize;

    // First entry whose separator is >= key; right_child past the end.
    let mut lo = 0usize;
    let mut hi = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if entry_at(data, mid).key() >= key {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    if lo < count {
        (entry_at(data, lo).child(), Some(lo))
    } else {
        (header.right_child(), None)
    }
}

fn slot_of_in(page_no: u32, data: &[u8], child: u32) -> Result<ChildSlot> {
    let header = InternalHeader::from_bytes(data);
    for i in 0..header.num_keys() as usize {
        if entry_at(data, i).child() == child {
            return Ok(ChildSlot::Entry(i));
        }
    }
    if header.right_child() == child {
        return Ok(ChildSlot::Right);
    }
    Err(Error::corrupt(page_no, format!("page {} is not among this node's children", child)).into())
}

impl<'a> InternalNode<'a> {
    pub fn from_page(page_no: u32, data: &'a [u8]) -> Result<Self> {
        validate(page_no, data)?;
        Ok(Self { data, page_no })
    }

    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    pub fn num_keys(&self) -> u16 {
        InternalHeader::from_bytes(self.data).num_keys()
    }

    pub fn right_child(&self) -> u32 {
        InternalHeader::from_bytes(self.data).right_child()
    }

    pub fn parent(&self) -> u32 {
        InternalHeader::from_bytes(self.data).parent()
    }

    pub fn is_root(&self) -> bool {
        InternalHeader::from_bytes(self.data).is_root()
    }

    pub fn entry(&self, index: usize) -> Result<ChildEntry> {
        ensure!(
            index < self.num_keys() as usize,
            "entry index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        Ok(entry_at(self.data, index))
    }

    /// Child to descend into for `key`, plus the entry index if the hit was
    /// a separator entry (`None` means `right_child`).
    pub fn find_child(&self, key: u64) -> (u32, Option<usize>) {
        find_child_in(self.data, key)
    }

    /// Locates `child` among this node's children.
    pub fn slot_of(&self, child: u32) -> Result<ChildSlot> {
        slot_of_in(self.page_no, self.data, child)
    }
}

impl<'a> InternalNodeMut<'a> {
    pub fn from_page(page_no: u32, data: &'a mut [u8]) -> Result<Self> {
        validate(page_no, data)?;
        Ok(Self { data, page_no })
    }

    /// Initializes the page as an internal node with no entries and the
    /// given `right_child`.
    pub fn init(
        page_no: u32,
        data: &'a mut [u8],
        parent: u32,
        is_root: bool,
        right_child: u32,
    ) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        InternalHeader::init(data, parent, is_root, right_child);
        Ok(Self { data, page_no })
    }

    pub fn num_keys(&self) -> u16 {
        InternalHeader::from_bytes(self.data).num_keys()
    }

    pub fn right_child(&self) -> u32 {
        InternalHeader::from_bytes(self.data).right_child()
    }

    pub fn set_right_child(&mut self, page_no: u32) {
        InternalHeader::from_bytes_mut(self.data).set_right_child(page_no);
    }

    pub fn parent(&self) -> u32 {
        InternalHeader::from_bytes(self.data).parent()
    }

    pub fn is_root(&self) -> bool {
        InternalHeader::from_bytes(self.data).is_root()
    }

    pub fn set_parent(&mut self, parent: u32) {
        InternalHeader::from_bytes_mut(self.data).set_parent(parent);
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        InternalHeader::from_bytes_mut(self.data).set_is_root(is_root);
    }

    pub fn entry(&self, index: usize) -> Result<ChildEntry> {
        ensure!(
            index < self.num_keys() as usize,
            "entry index {} out of bounds (num_keys={})",
            index,
            self.num_keys()
        );
        Ok(entry_at(self.data, index))
    }

    pub fn find_child(&self, key: u64) -> (u32, Option<usize>) {
        find_child_in(self.data, key)
    }

    pub fn slot_of(&self, child: u32) -> Result<ChildSlot> {
        slot_of_in(self.page_no, self.data, child)
    }

    pub fn is_full(&self) -> bool {
        self.num_keys() as usize >= INTERNAL_MAX_KEYS
    }

    /// Inserts `(child, key)` at its sorted position. Keys must stay
    /// strictly ascending.
    pub fn insert_entry(&mut self, child: u32, key: u64) -> Result<()> {
        ensure!(
            !self.is_full(),
            "internal node {} is full ({} entries)",
            self.page_no,
            self.num_keys()
        );

        let count = self.num_keys() as usize;
        let (_, slot) = self.find_child(key);
        let index = slot.unwrap_or(count);
        if index < count {
            ensure!(
                entry_at(self.data, index).key() != key,
                "separator {} already present in internal node {}",
                key,
                self.page_no
            );
        }

        self.data.copy_within(
            entry_offset(index)..entry_offset(count),
            entry_offset(index + 1),
        );

        let entry = ChildEntry::new(child, key);
        self.data[entry_offset(index)..entry_offset(index) + INTERNAL_ENTRY_SIZE]
            .copy_from_slice(entry.as_bytes());

        InternalHeader::from_bytes_mut(self.data).set_num_keys(count as u16 + 1);
        Ok(())
    }

    /// Re-points the slot currently holding `old_child` at `new_child`,
    /// leaving its separator untouched. Used when a split hands the upper
    /// half of a child's keys to a new sibling.
    pub fn replace_child(&mut self, old_child: u32, new_child: u32) -> Result<()> {
        match self.slot_of(old_child)? {
            ChildSlot::Entry(index) => {
                let key = entry_at(self.data, index).key();
                let entry = ChildEntry::new(new_child, key);
                self.data[entry_offset(index)..entry_offset(index) + INTERNAL_ENTRY_SIZE]
                    .copy_from_slice(entry.as_bytes());
            }
            ChildSlot::Right => self.set_right_child(new_child),
        }
        Ok(())
    }

    pub fn as_ref(&self) -> InternalNode<'_> {
        InternalNode {
            data: self.data,
            page_no: self.page_no,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn init_produces_an_empty_node() {
        let mut page = make_page();
        let node = InternalNodeMut::init(1, &mut page, 1, true, 7).unwrap();

        assert_eq!(node.num_keys(), 0);
        assert_eq!(node.right_child(), 7);
        assert!(node.is_root());
    }

    #[test]
    fn find_child_routes_by_separator() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 40).unwrap();

        node.insert_entry(10, 100).unwrap();
        node.insert_entry(20, 200).unwrap();
        node.insert_entry(30, 300).unwrap();

        // child_i holds keys <= key_i
        assert_eq!(node.find_child(50), (10, Some(0)));
        assert_eq!(node.find_child(100), (10, Some(0)));
        assert_eq!(node.find_child(101), (20, Some(1)));
        assert_eq!(node.find_child(300), (30, Some(2)));
        assert_eq!(node.find_child(301), (40, None));
    }

    #[test]
    fn insert_entry_keeps_keys_sorted() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 99).unwrap();

        node.insert_entry(3, 300).unwrap();
        node.insert_entry(1, 100).unwrap();
        node.insert_entry(2, 200).unwrap();

        assert_eq!(node.entry(0).unwrap().key(), 100);
        assert_eq!(node.entry(1).unwrap().key(), 200);
        assert_eq!(node.entry(2).unwrap().key(), 300);
        assert_eq!(node.entry(0).unwrap().child(), 1);
        assert_eq!(node.entry(2).unwrap().child(), 3);
    }

    #[test]
    fn duplicate_separator_is_rejected() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 9).unwrap();

        node.insert_entry(1, 100).unwrap();
        assert!(node.insert_entry(2, 100).is_err());
    }

    #[test]
    fn slot_of_finds_entry_and_right_child() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 40).unwrap();

        node.insert_entry(10, 100).unwrap();
        node.insert_entry(20, 200).unwrap();

        assert_eq!(node.slot_of(10).unwrap(), ChildSlot::Entry(0));
        assert_eq!(node.slot_of(20).unwrap(), ChildSlot::Entry(1));
        assert_eq!(node.slot_of(40).unwrap(), ChildSlot::Right);

        let err = node.slot_of(77).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CorruptNode { page: 1, .. })
        ));
    }

    #[test]
    fn replace_child_preserves_separators() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 40).unwrap();

        node.insert_entry(10, 100).unwrap();
        node.insert_entry(20, 200).unwrap();

        node.replace_child(20, 25).unwrap();
        assert_eq!(node.entry(1).unwrap().child(), 25);
        assert_eq!(node.entry(1).unwrap().key(), 200);

        node.replace_child(40, 45).unwrap();
        assert_eq!(node.right_child(), 45);
    }

    #[test]
    fn from_page_rejects_leaf_nodes() {
        let mut page = make_page();
        super::super::node::LeafHeader::init(&mut page, 0, true);

        assert!(InternalNode::from_page(2, &page).is_err());
    }

    #[test]
    fn fills_to_capacity() {
        let mut page = make_page();
        let mut node = InternalNodeMut::init(1, &mut page, 1, true, 0).unwrap();

        for i in 0..INTERNAL_MAX_KEYS as u64 {
            node.insert_entry(i as u32 + 10, (i + 1) * 10).unwrap();
        }

        assert!(node.is_full());
        assert!(node
            .insert_entry(u32::MAX, u64::MAX)
            .is_err());
    }
}
