use crate::common::{RecordId, Result, SpruceError};

use super::btree_index::{BTreeIndex, NodeId};

/// Cursor over the leaf chain of a [`BTreeIndex`], yielding record ids in
/// key order. The scan borrows the tree, so the tree cannot change under it.
pub struct TreeScan<'a> {
    tree: &'a BTreeIndex,
    current_leaf: Option<NodeId>,
    current_index: usize,
}

impl<'a> TreeScan<'a> {
    pub(crate) fn new(tree: &'a BTreeIndex, first_leaf: Option<NodeId>) -> Self {
        Self {
            tree,
            current_leaf: first_leaf,
            current_index: 0,
        }
    }

    /// Returns the next record id, or `NoMoreEntries` once the chain is exhausted.
    /// Empty leaves left behind by deletes are skipped.
    pub fn next_entry(&mut self) -> Result<RecordId> {
        self.next_pair()
            .map(|(_, rid)| rid)
            .ok_or(SpruceError::NoMoreEntries)
    }

    /// Like [`next_entry`](Self::next_entry) but also returns the key.
    pub fn next_pair(&mut self) -> Option<(i32, RecordId)> {
        while let Some(leaf) = self.current_leaf {
            if let Some(entry) = self.tree.leaf_entry(leaf, self.current_index) {
                self.current_index += 1;
                return Some(entry);
            }
            self.current_leaf = self.tree.right_sibling(leaf);
            self.current_index = 0;
        }
        None
    }

    /// Ends the scan. The tree is untouched.
    pub fn close(self) {}
}

impl Iterator for TreeScan<'_> {
    type Item = RecordId;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_pair().map(|(_, rid)| rid)
    }
}
