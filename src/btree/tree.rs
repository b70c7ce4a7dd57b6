//! # Tree Operations
//!
//! [`BTree`] ties the node views to the pager: it descends from a root
//! PageNum, inserts into leaves, and splits nodes upward when they fill.
//!
//! ## Insert Algorithm
//!
//! ```text
//! 1. Descend from the root via separator comparison to the target leaf
//! 2. Binary-search the leaf; an exact hit is DuplicateKey
//! 3. If the leaf has room: insert the cell, done
//! 4. Otherwise split: materialize the ordered cell list including the new
//!    record, keep the first ceil((M+1)/2) cells in the left page, move the
//!    rest to a fresh sibling, and promote the left page's max key
//! 5. In the parent, the slot that pointed at the split page is re-pointed
//!    at the new sibling and an entry (left, separator) is inserted; a full
//!    parent splits the same way, promoting its median key
//! 6. Splitting a root allocates a fresh internal root; the handle's
//!    root_page changes
//! ```
//!
//! Splits copy the affected cells out of the page before re-initializing
//! either side, so only one page buffer is ever borrowed from the pager at
//! a time. Children handed to a new sibling get their parent pointers
//! rewritten in the same pass, which is what keeps the parent-chain scan
//! (and any later climb) sound.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;
use tracing::debug;

use super::internal::{InternalNode, InternalNodeMut};
use super::leaf::{LeafNode, LeafNodeMut, SearchResult};
use super::node::{NodePrefix, NodeType, MAX_CELL_DATA};
use crate::errors::Error;
use crate::storage::Pager;

#[derive(Debug)]
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page: u32,
}

impl<'a> BTree<'a> {
    /// Handle on an existing tree rooted at `root_page`.
    pub fn new(pager: &'a mut Pager, root_page: u32) -> Self {
        Self { pager, root_page }
    }

    /// Allocates a fresh page and initializes it as an empty leaf root.
    pub fn create(pager: &'a mut Pager) -> Result<Self> {
        let root_page = pager.new_page()?;
        Self::create_at(pager, root_page)
    }

    /// Initializes an already-allocated page as an empty leaf root (page 0
    /// exists from the moment the file is created, so the catalog tree
    /// starts this way).
    pub fn create_at(pager: &'a mut Pager, root_page: u32) -> Result<Self> {
        let data = pager.page_mut(root_page)?;
        LeafNodeMut::init(root_page, data, root_page, true)?;
        Ok(Self { pager, root_page })
    }

    /// The current root PageNum. May differ from the one the handle was
    /// constructed with after an insert split the root; callers that
    /// persist the root read it back after every mutating call.
    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn pager(&mut self) -> &mut Pager {
        self.pager
    }

    /// Looks `key` up and returns a copy of its data payload.
    pub fn search(&mut self, key: u64) -> Result<Option<Vec<u8>>> {
        let leaf_page = self.find_leaf(key)?;
        let data = self.pager.page(leaf_page)?;
        let leaf = LeafNode::from_page(leaf_page, data)?;

        match leaf.find_cell(key)? {
            SearchResult::Found(index) => Ok(Some(leaf.cell(index)?.1.to_vec())),
            SearchResult::NotFound(_) => Ok(None),
        }
    }

    /// Inserts `(key, data)`. Fails with [`Error::DuplicateKey`] when the
    /// key is already present; splits whatever fills along the way.
    pub fn insert(&mut self, key: u64, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() <= MAX_CELL_DATA,
            "record of {} bytes cannot fit in a {}-byte page",
            data.len(),
            crate::config::PAGE_SIZE
        );

        let leaf_page = self.find_leaf(key)?;
        let page = self.pager.page_mut(leaf_page)?;
        let mut leaf = LeafNodeMut::from_page(leaf_page, page)?;

        let index = match leaf.find_cell(key)? {
            SearchResult::Found(_) => return Err(Error::DuplicateKey(key).into()),
            SearchResult::NotFound(index) => index,
        };

        if !leaf.is_full(data.len()) {
            return leaf.insert_cell(index, key, data);
        }

        self.split_leaf(leaf_page, index, key, data)
    }

    /// Overwrites the data of an existing key without changing its length.
    /// The tree never splits here, so the root cannot move.
    pub fn update_in_place(&mut self, key: u64, data: &[u8]) -> Result<()> {
        let leaf_page = self.find_leaf(key)?;
        let page = self.pager.page_mut(leaf_page)?;
        let mut leaf = LeafNodeMut::from_page(leaf_page, page)?;

        match leaf.find_cell(key)? {
            SearchResult::Found(index) => leaf.update_cell_data(index, data),
            SearchResult::NotFound(_) => bail!("key {} not present for in-place update", key),
        }
    }

    /// PageNum of the leaf a search for `key` ends at.
    pub fn find_leaf(&mut self, key: u64) -> Result<u32> {
        let mut current = self.root_page;
        loop {
            let data = self.pager.page(current)?;
            match NodeType::from_page(current, data)? {
                NodeType::Leaf => return Ok(current),
                NodeType::Internal => {
                    let node = InternalNode::from_page(current, data)?;
                    let (child, _) = node.find_child(key);
                    current = child;
                }
            }
        }
    }

    /// PageNum of the leftmost leaf (where an in-order scan starts).
    pub fn leftmost_leaf(&mut self) -> Result<u32> {
        let mut current = self.root_page;
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

    /// Number of levels, counting the root and the leaves.
    pub fn height(&mut self) -> Result<usize> {
        let mut current = self.root_page;
        let mut levels = 1;
        loop {
            let data = self.pager.page(current)?;
            match NodeType::from_page(current, data)? {
                NodeType::Leaf => return Ok(levels),
                NodeType::Internal => {
                    let node = InternalNode::from_page(current, data)?;
                    current = if node.num_keys() > 0 {
                        node.entry(0)?.child()
                    } else {
                        node.right_child()
                    };
                    levels += 1;
                }
            }
        }
    }

    fn split_leaf(&mut self, leaf_page: u32, index: usize, key: u64, data: &[u8]) -> Result<()> {
        let (parent, is_root, mut items) = {
            let page = self.pager.page(leaf_page)?;
            let leaf = LeafNode::from_page(leaf_page, page)?;
            let mut items: SmallVec<[(u64, Vec<u8>); 16]> =
                SmallVec::with_capacity(leaf.num_cells() as usize + 1);
            for i in 0..leaf.num_cells() as usize {
                let (k, d) = leaf.cell(i)?;
                items.push((k, d.to_vec()));
            }
            (leaf.parent(), leaf.is_root(), items)
        };
        items.insert(index, (key, data.to_vec()));

        // The combined ordered sequence splits at ceil((M+1)/2); the
        // separator promoted upward is the left side's max key.
        let left_count = items.len().div_ceil(2);
        let separator = items[left_count - 1].0;

        let right_page = self.pager.new_page()?;
        {
            let page = self.pager.page_mut(right_page)?;
            let mut right = LeafNodeMut::init(right_page, page, parent, false)?;
            for (i, (k, d)) in items[left_count..].iter().enumerate() {
                right.insert_cell(i, *k, d)?;
            }
        }
        {
            let page = self.pager.page_mut(leaf_page)?;
            let mut left = LeafNodeMut::init(leaf_page, page, parent, is_root)?;
            for (i, (k, d)) in items[..left_count].iter().enumerate() {
                left.insert_cell(i, *k, d)?;
            }
        }

        debug!(left = leaf_page, right = right_page, separator, "split leaf");

        if is_root {
            self.create_new_root(leaf_page, separator, right_page)
        } else {
            self.insert_into_parent(parent, leaf_page, separator, right_page)
        }
    }

    /// Publishes a split to the ancestors: the slot pointing at `left` is
    /// re-pointed at `right` and a `(left, separator)` entry is inserted
    /// before it. Full ancestors split the same way until an insert
    /// sticks or a new root is made.
    fn insert_into_parent(
        &mut self,
        parent_page: u32,
        left: u32,
        separator: u64,
        right: u32,
    ) -> Result<()> {
        let mut parent_page = parent_page;
        let mut left = left;
        let mut separator = separator;
        let mut right = right;

        loop {
            {
                let page = self.pager.page_mut(parent_page)?;
                let mut node = InternalNodeMut::from_page(parent_page, page)?;
                if !node.is_full() {
                    node.replace_child(left, right)?;
                    node.insert_entry(left, separator)?;
                    return Ok(());
                }
            }

            let (promoted, new_right, grandparent, was_root) =
                self.split_internal(parent_page, left, separator, right)?;

            if was_root {
                return self.create_new_root(parent_page, promoted, new_right);
            }

            left = parent_page;
            separator = promoted;
            right = new_right;
            parent_page = grandparent;
        }
    }

    /// Splits a full internal node that logically holds its own entries
    /// plus the pending `(left, separator, right)` insertion. Returns the
    /// promoted key, the new sibling, and where to continue.
    fn split_internal(
        &mut self,
        page_no: u32,
        pending_left: u32,
        pending_sep: u64,
        pending_right: u32,
    ) -> Result<(u64, u32, u32, bool)> {
        let (parent, is_root, mut right_child, mut entries) = {
            let page = self.pager.page(page_no)?;
            let node = InternalNode::from_page(page_no, page)?;
            let mut entries: SmallVec<[(u32, u64); 64]> =
                SmallVec::with_capacity(node.num_keys() as usize + 1);
            for i in 0..node.num_keys() as usize {
                let entry = node.entry(i)?;
                entries.push((entry.child(), entry.key()));
            }
            (
                node.parent(),
                node.is_root(),
                node.right_child(),
                entries,
            )
        };

        // Apply the pending insertion to the copied-out list the same way a
        // non-splitting parent would: re-point the slot at the new sibling,
        // put (left, separator) in front of it.
        match entries.iter().position(|&(child, _)| child == pending_left) {
            Some(i) => {
                entries[i].0 = pending_right;
                entries.insert(i, (pending_left, pending_sep));
            }
            None => {
                if right_child != pending_left {
                    return Err(Error::corrupt(
                        page_no,
                        format!("split child {} is not among this node's children", pending_left),
                    )
                    .into());
                }
                right_child = pending_right;
                entries.push((pending_left, pending_sep));
            }
        }

        // The median entry's key moves up; its child becomes the left
        // half's right_child so no subtree is orphaned.
        let mid = entries.len() / 2;
        let promoted = entries[mid].1;
        let left_right_child = entries[mid].0;

        let new_page = self.pager.new_page()?;
        {
            let page = self.pager.page_mut(new_page)?;
            let mut node = InternalNodeMut::init(new_page, page, parent, false, right_child)?;
            for &(child, key) in &entries[mid + 1..] {
                node.insert_entry(child, key)?;
            }
        }
        {
            let page = self.pager.page_mut(page_no)?;
            let mut node =
                InternalNodeMut::init(page_no, page, parent, is_root, left_right_child)?;
            for &(child, key) in &entries[..mid] {
                node.insert_entry(child, key)?;
            }
        }

        for &(child, _) in &entries[mid + 1..] {
            self.set_parent(child, new_page)?;
        }
        self.set_parent(right_child, new_page)?;

        debug!(left = page_no, right = new_page, promoted, "split internal node");

        Ok((promoted, new_page, parent, is_root))
    }

    fn create_new_root(&mut self, left: u32, separator: u64, right: u32) -> Result<()> {
        let new_root = self.pager.new_page()?;
        {
            let page = self.pager.page_mut(new_root)?;
            let mut root = InternalNodeMut::init(new_root, page, new_root, true, right)?;
            root.insert_entry(left, separator)?;
        }
        {
            let page = self.pager.page_mut(left)?;
            let prefix = NodePrefix::from_bytes_mut(page);
            prefix.set_parent(new_root);
            prefix.set_is_root(false);
        }
        self.set_parent(right, new_root)?;

        self.root_page = new_root;
        debug!(new_root, left, right, separator, "created new root");
        Ok(())
    }

    fn set_parent(&mut self, child: u32, parent: u32) -> Result<()> {
        let page = self.pager.page_mut(child)?;
        NodePrefix::from_bytes_mut(page).set_parent(parent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::internal::ChildSlot;
    use tempfile::tempdir;

    fn create_test_tree(dir: &tempfile::TempDir) -> Pager {
        Pager::open(dir.path().join("test.kdb")).unwrap()
    }

    /// Walks the whole tree checking the structural invariants: parent
    /// pointers, in-node key ordering, separator = max key of the left
    /// subtree.
    fn check_invariants(pager: &mut Pager, page_no: u32, expected_parent: u32) -> u64 {
        let data = pager.page(page_no).unwrap().to_vec();
        match NodeType::from_page(page_no, &data).unwrap() {
            NodeType::Leaf => {
                let leaf = LeafNode::from_page(page_no, &data).unwrap();
                assert_eq!(leaf.parent(), expected_parent, "leaf {} parent", page_no);
                let mut last = None;
                for i in 0..leaf.num_cells() as usize {
                    let key = leaf.key_at(i).unwrap();
                    if let Some(prev) = last {
                        assert!(key > prev, "leaf {} keys out of order", page_no);
                    }
                    last = Some(key);
                }
                last.expect("non-root leaves are never empty")
            }
            NodeType::Internal => {
                let node = InternalNode::from_page(page_no, &data).unwrap();
                assert_eq!(node.parent(), expected_parent, "node {} parent", page_no);
                let mut last_sep = None;
                for i in 0..node.num_keys() as usize {
                    let entry = node.entry(i).unwrap();
                    if let Some(prev) = last_sep {
                        assert!(entry.key() > prev, "node {} separators out of order", page_no);
                    }
                    assert_eq!(
                        node.slot_of(entry.child()).unwrap(),
                        ChildSlot::Entry(i)
                    );
                    let subtree_max = check_invariants(pager, entry.child(), page_no);
                    assert_eq!(
                        subtree_max,
                        entry.key(),
                        "separator {} of node {} must equal the left subtree's max",
                        i,
                        page_no
                    );
                    last_sep = Some(entry.key());
                }
                check_invariants(pager, node.right_child(), page_no)
            }
        }
    }

    #[test]
    fn create_initializes_an_empty_leaf_root() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);

        let mut tree = BTree::create(&mut pager).unwrap();
        let root = tree.root_page();

        assert!(tree.search(1).unwrap().is_none());
        let data = tree.pager().page(root).unwrap();
        let leaf = LeafNode::from_page(root, data).unwrap();
        assert!(leaf.is_root());
        assert_eq!(leaf.parent(), root);
        assert_eq!(leaf.num_cells(), 0);
    }

    #[test]
    fn insert_and_search_a_handful_of_keys() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        tree.insert(3, b"three").unwrap();
        tree.insert(1, b"one").unwrap();
        tree.insert(2, b"two").unwrap();

        assert_eq!(tree.search(1).unwrap(), Some(b"one".to_vec()));
        assert_eq!(tree.search(2).unwrap(), Some(b"two".to_vec()));
        assert_eq!(tree.search(3).unwrap(), Some(b"three".to_vec()));
        assert!(tree.search(4).unwrap().is_none());
    }

    #[test]
    fn duplicate_key_is_rejected_without_mutation() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        tree.insert(1, b"first").unwrap();
        let err = tree.insert(1, b"second").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DuplicateKey(1))
        ));
        assert_eq!(tree.search(1).unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn oversized_record_is_rejected() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        let huge = vec![0u8; MAX_CELL_DATA + 1];
        assert!(tree.insert(1, &huge).is_err());
        assert!(tree.search(1).unwrap().is_none());
    }

    #[test]
    fn leaf_split_promotes_a_new_internal_root() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();
        let old_root = tree.root_page();

        // ~500-byte records: a handful fills the 4096-byte leaf.
        let payload = vec![0xCD; 500];
        let mut count = 0u64;
        while tree.height().unwrap() == 1 {
            tree.insert(count, &payload).unwrap();
            count += 1;
        }

        let new_root = tree.root_page();
        assert_ne!(new_root, old_root);
        assert_eq!(tree.height().unwrap(), 2);

        let data = tree.pager().page(new_root).unwrap().to_vec();
        let root = InternalNode::from_page(new_root, &data).unwrap();
        assert!(root.is_root());
        assert_eq!(root.num_keys(), 1);

        for key in 0..count {
            assert_eq!(tree.search(key).unwrap(), Some(payload.clone()), "key {}", key);
        }
        let root = tree.root_page();
        check_invariants(&mut pager, root, root);
    }

    #[test]
    fn ascending_inserts_build_a_consistent_multi_level_tree() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        let payload = vec![0xABu8; 120];
        for key in 0..2000u64 {
            tree.insert(key, &payload).unwrap();
        }

        assert!(tree.height().unwrap() >= 3);
        for key in (0..2000u64).step_by(97) {
            assert_eq!(tree.search(key).unwrap(), Some(payload.clone()));
        }
        assert!(tree.search(2000).unwrap().is_none());

        let root = tree.root_page();
        check_invariants(&mut pager, root, root);
    }

    #[test]
    fn descending_inserts_build_a_consistent_tree() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        let payload = vec![0x5Au8; 200];
        for key in (0..800u64).rev() {
            tree.insert(key, &payload).unwrap();
        }

        for key in 0..800u64 {
            assert_eq!(tree.search(key).unwrap(), Some(payload.clone()), "key {}", key);
        }

        let root = tree.root_page();
        check_invariants(&mut pager, root, root);
    }

    #[test]
    fn interleaved_inserts_keep_invariants() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        // Spray keys across the range so splits land mid-tree, not just on
        // the rightmost edge.
        let payload = vec![0x11u8; 150];
        for key in (0..1500u64).map(|i| (i * 7919) % 100_000) {
            tree.insert(key, &payload).unwrap();
        }

        let root = tree.root_page();
        check_invariants(&mut pager, root, root);
    }

    #[test]
    fn update_in_place_rewrites_without_moving() {
        let dir = tempdir().unwrap();
        let mut pager = create_test_tree(&dir);
        let mut tree = BTree::create(&mut pager).unwrap();

        tree.insert(5, b"aaaa").unwrap();
        let root_before = tree.root_page();

        tree.update_in_place(5, b"bbbb").unwrap();
        assert_eq!(tree.root_page(), root_before);
        assert_eq!(tree.search(5).unwrap(), Some(b"bbbb".to_vec()));

        assert!(tree.update_in_place(6, b"cccc").is_err());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.kdb");
        let root;
        {
            let mut pager = Pager::open(&path).unwrap();
            let mut tree = BTree::create(&mut pager).unwrap();
            for key in 0..500u64 {
                tree.insert(key, format!("value-{key}").as_bytes()).unwrap();
            }
            root = tree.root_page();
            pager.close().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        let mut tree = BTree::new(&mut pager, root);
        for key in 0..500u64 {
            assert_eq!(
                tree.search(key).unwrap(),
                Some(format!("value-{key}").into_bytes())
            );
        }
    }
}
