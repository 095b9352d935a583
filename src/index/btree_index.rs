use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::debug;

use crate::buffer::{BufferPoolManager, ReplacementStrategy};
use crate::common::{
    IndexOptions, KeyType, PageId, RecordId, Result, SpruceError, HEADER_PAGE_NUM,
    MAX_BTREE_ORDER,
};
use crate::storage::disk::DiskManager;

use super::btree_iterator::TreeScan;
use super::btree_page::{IndexHeader, NodePage};

/// Index of a node in the tree's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Leaf {
        keys: Vec<i32>,
        rids: Vec<RecordId>,
    },
    Internal {
        keys: Vec<i32>,
        child_pages: Vec<PageId>,
        /// Same order as `child_pages`
        child_nodes: Vec<NodeId>,
    },
}

#[derive(Debug)]
struct Node {
    page: PageId,
    parent: Option<NodeId>,
    /// Neighbours on the same level
    left: Option<NodeId>,
    right: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn to_page(&self) -> NodePage {
        match &self.kind {
            NodeKind::Leaf { keys, rids } => NodePage::Leaf {
                keys: keys.clone(),
                rids: rids.clone(),
            },
            NodeKind::Internal {
                keys, child_pages, ..
            } => NodePage::Internal {
                keys: keys.clone(),
                children: child_pages.clone(),
            },
        }
    }
}

/// Disk-backed B+ tree over `i32` keys.
///
/// The whole node graph is loaded into an arena when the index is opened;
/// reads are served from memory and every mutation is written through the
/// index's private buffer pool before the call returns.
pub struct BTreeIndex {
    path: PathBuf,
    header: IndexHeader,
    root: Option<NodeId>,
    nodes: Vec<Node>,
    bpm: BufferPoolManager,
}

impl BTreeIndex {
    /// Creates an empty index file at `path`, replacing any existing file.
    pub fn create<P: AsRef<Path>>(path: P, key_type: KeyType, order: usize) -> Result<()> {
        if order < 1 {
            return Err(SpruceError::InvalidOrder);
        }
        if order > MAX_BTREE_ORDER {
            return Err(SpruceError::OrderTooLarge {
                order,
                max: MAX_BTREE_ORDER,
            });
        }
        if key_type != KeyType::Int {
            return Err(SpruceError::UnsupportedKeyType(key_type));
        }

        DiskManager::create(path.as_ref())?;

        let header = IndexHeader::empty(order, key_type);
        let mut bpm = BufferPoolManager::open(path.as_ref(), 1, ReplacementStrategy::Lru)?;
        bpm.with_write_page(PageId::new(HEADER_PAGE_NUM), |data| {
            header.encode(data);
            Ok(())
        })?;
        bpm.shutdown()?;

        debug!(
            "created index {} (order {}, {})",
            path.as_ref().display(),
            order,
            key_type
        );
        Ok(())
    }

    /// Opens an index with a 10-frame LRU buffer pool.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, IndexOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: IndexOptions) -> Result<Self> {
        let mut bpm = BufferPoolManager::open(path.as_ref(), options.pool_size, options.strategy)?;
        let num_pages = bpm.disk_manager().num_pages();
        if num_pages == 0 {
            return Err(SpruceError::InvalidIndexFile("file holds no pages".to_string()));
        }
        let header = bpm.with_read_page(PageId::new(HEADER_PAGE_NUM), IndexHeader::decode)?;
        Self::check_extent(&header, num_pages)?;

        let mut index = Self {
            path: path.as_ref().to_path_buf(),
            header,
            root: None,
            nodes: Vec::new(),
            bpm,
        };
        index.load_nodes()?;

        debug!(
            "opened index {}: {} nodes, {} entries, depth {}",
            index.path.display(),
            index.header.num_nodes,
            index.header.num_entries,
            index.header.depth
        );
        Ok(index)
    }

    /// Flushes the index and releases its buffer pool.
    pub fn close(mut self) -> Result<()> {
        self.bpm.shutdown()?;
        debug!("closed index {}", self.path.display());
        Ok(())
    }

    /// Removes an index file.
    pub fn delete<P: AsRef<Path>>(path: P) -> Result<()> {
        DiskManager::destroy(path)
    }

    /// Looks up the record id stored for `key`.
    pub fn find_key(&self, key: i32) -> Result<RecordId> {
        let leaf = self.find_leaf(key).ok_or(SpruceError::KeyNotFound(key))?;
        match &self.nodes[leaf.0].kind {
            NodeKind::Leaf { keys, rids } => keys
                .binary_search(&key)
                .map(|pos| rids[pos])
                .map_err(|_| SpruceError::KeyNotFound(key)),
            NodeKind::Internal { .. } => Err(self.corrupted(leaf, "descent ended on an internal node")),
        }
    }

    /// Inserts a new key. Full leaves are split and the split is carried up
    /// as far as needed, growing a new root when the old one splits.
    pub fn insert_key(&mut self, key: i32, rid: RecordId) -> Result<()> {
        let Some(leaf) = self.find_leaf(key) else {
            let root = self.new_node(
                None,
                NodeKind::Leaf {
                    keys: vec![key],
                    rids: vec![rid],
                },
            );
            self.set_root(root);
            self.header.depth = 1;
            self.header.num_entries = 1;
            self.write_node(root)?;
            return self.finish_update();
        };

        let fill = match &mut self.nodes[leaf.0].kind {
            NodeKind::Leaf { keys, rids } => match keys.binary_search(&key) {
                Ok(_) => return Err(SpruceError::KeyAlreadyExists(key)),
                Err(pos) => {
                    keys.insert(pos, key);
                    rids.insert(pos, rid);
                    keys.len()
                }
            },
            NodeKind::Internal { .. } => {
                return Err(self.corrupted(leaf, "descent ended on an internal node"))
            }
        };
        self.header.num_entries += 1;

        if fill > self.header.order {
            self.split_leaf(leaf)?;
        } else {
            self.write_node(leaf)?;
        }
        self.finish_update()
    }

    /// Removes a key from its leaf. Nodes are never merged or freed, so a
    /// leaf may be left empty.
    pub fn delete_key(&mut self, key: i32) -> Result<()> {
        let leaf = self.find_leaf(key).ok_or(SpruceError::KeyNotFound(key))?;

        match &mut self.nodes[leaf.0].kind {
            NodeKind::Leaf { keys, rids } => {
                let pos = keys
                    .binary_search(&key)
                    .map_err(|_| SpruceError::KeyNotFound(key))?;
                keys.remove(pos);
                rids.remove(pos);
            }
            NodeKind::Internal { .. } => {
                return Err(self.corrupted(leaf, "descent ended on an internal node"))
            }
        }
        self.header.num_entries -= 1;

        self.write_node(leaf)?;
        self.finish_update()
    }

    /// Starts an ordered scan over all entries.
    pub fn open_tree_scan(&self) -> TreeScan<'_> {
        TreeScan::new(self, self.leftmost_leaf())
    }

    /// All `(key, rid)` pairs in key order.
    pub fn entries(&self) -> Vec<(i32, RecordId)> {
        let mut out = Vec::with_capacity(self.header.num_entries as usize);
        let mut current = self.leftmost_leaf();
        while let Some(id) = current {
            if let NodeKind::Leaf { keys, rids } = &self.nodes[id.0].kind {
                out.extend(keys.iter().copied().zip(rids.iter().copied()));
            }
            current = self.nodes[id.0].right;
        }
        out
    }

    pub fn get_num_nodes(&self) -> u32 {
        self.header.num_nodes
    }

    pub fn get_num_entries(&self) -> u32 {
        self.header.num_entries
    }

    pub fn get_key_type(&self) -> KeyType {
        self.header.key_type
    }

    pub fn order(&self) -> usize {
        self.header.order
    }

    /// Number of levels, 0 for an empty tree.
    pub fn depth(&self) -> u32 {
        self.header.depth
    }

    pub fn root_page_id(&self) -> Option<PageId> {
        self.root.map(|id| self.nodes[id.0].page)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    /// Renders every node level by level, one line per node:
    /// `(page)[c0,k0,c1]` for internal nodes and `(page)[p.s,k,...]` for leaves.
    pub fn print_tree(&self) -> String {
        let mut out = String::new();
        let mut queue: VecDeque<NodeId> = self.root.into_iter().collect();

        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.0];
            let _ = write!(out, "({})[", node.page.as_u32());
            match &node.kind {
                NodeKind::Leaf { keys, rids } => {
                    let items: Vec<String> = keys
                        .iter()
                        .zip(rids)
                        .map(|(key, rid)| format!("{},{}", rid, key))
                        .collect();
                    out.push_str(&items.join(","));
                }
                NodeKind::Internal {
                    keys,
                    child_pages,
                    child_nodes,
                } => {
                    for (child, key) in child_pages.iter().zip(keys) {
                        let _ = write!(out, "{},{},", child.as_u32(), key);
                    }
                    if let Some(last) = child_pages.last() {
                        let _ = write!(out, "{}", last.as_u32());
                    }
                    queue.extend(child_nodes.iter().copied());
                }
            }
            out.push_str("]\n");
        }
        out
    }

    pub(crate) fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            match &self.nodes[current.0].kind {
                NodeKind::Leaf { .. } => return Some(current),
                NodeKind::Internal { child_nodes, .. } => current = *child_nodes.first()?,
            }
        }
    }

    pub(crate) fn leaf_entry(&self, leaf: NodeId, index: usize) -> Option<(i32, RecordId)> {
        match &self.nodes[leaf.0].kind {
            NodeKind::Leaf { keys, rids } => Some((*keys.get(index)?, rids[index])),
            NodeKind::Internal { .. } => None,
        }
    }

    pub(crate) fn right_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].right
    }

    /// Descends to the leaf whose key range covers `key`.
    fn find_leaf(&self, key: i32) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            match &self.nodes[current.0].kind {
                NodeKind::Leaf { .. } => return Some(current),
                NodeKind::Internal {
                    keys, child_nodes, ..
                } => {
                    // child[i+1] holds keys >= keys[i]
                    let child = match keys.binary_search(&key) {
                        Ok(pos) => pos + 1,
                        Err(pos) => pos,
                    };
                    current = child_nodes[child];
                }
            }
        }
    }

    /// Splits an overfull leaf: the left half keeps floor((n+1)/2) entries.
    fn split_leaf(&mut self, leaf: NodeId) -> Result<()> {
        let left_fill = (self.header.order + 1) / 2;

        let (right_keys, right_rids) = match &mut self.nodes[leaf.0].kind {
            NodeKind::Leaf { keys, rids } => (keys.split_off(left_fill), rids.split_off(left_fill)),
            NodeKind::Internal { .. } => return Err(self.corrupted(leaf, "leaf split on internal node")),
        };
        let separator = right_keys[0];

        let parent = self.nodes[leaf.0].parent;
        let right = self.new_node(
            parent,
            NodeKind::Leaf {
                keys: right_keys,
                rids: right_rids,
            },
        );
        self.link_after(leaf, right);

        self.write_node(leaf)?;
        self.write_node(right)?;
        debug!(
            "split leaf {} -> {} at key {}",
            self.nodes[leaf.0].page,
            self.nodes[right.0].page,
            separator
        );

        self.insert_into_parent(leaf, separator, right)
    }

    /// Inserts `key` and the new node `right` into the parent of `left`,
    /// directly after `left`.
    fn insert_into_parent(&mut self, left: NodeId, key: i32, right: NodeId) -> Result<()> {
        let left_page = self.nodes[left.0].page;
        let right_page = self.nodes[right.0].page;

        let Some(parent) = self.nodes[left.0].parent else {
            let root = self.new_node(
                None,
                NodeKind::Internal {
                    keys: vec![key],
                    child_pages: vec![left_page, right_page],
                    child_nodes: vec![left, right],
                },
            );
            self.nodes[left.0].parent = Some(root);
            self.nodes[right.0].parent = Some(root);
            self.set_root(root);
            self.header.depth += 1;
            return self.write_node(root);
        };

        let fill = match &mut self.nodes[parent.0].kind {
            NodeKind::Internal {
                keys,
                child_pages,
                child_nodes,
            } => child_nodes.iter().position(|&c| c == left).map(|pos| {
                keys.insert(pos, key);
                child_pages.insert(pos + 1, right_page);
                child_nodes.insert(pos + 1, right);
                keys.len()
            }),
            NodeKind::Leaf { .. } => None,
        };
        let Some(fill) = fill else {
            return Err(self.corrupted(parent, "parent does not list the split node"));
        };
        self.nodes[right.0].parent = Some(parent);

        if fill > self.header.order {
            self.split_internal(parent)
        } else {
            self.write_node(parent)
        }
    }

    /// Splits an overfull internal node. The left half keeps floor((n+1)/2)
    /// keys; the first key of the right half moves up to the parent.
    fn split_internal(&mut self, node: NodeId) -> Result<()> {
        let left_fill = (self.header.order + 1) / 2;

        let (promoted, right_keys, right_pages, right_nodes) = match &mut self.nodes[node.0].kind
        {
            NodeKind::Internal {
                keys,
                child_pages,
                child_nodes,
            } => {
                let mut right_keys = keys.split_off(left_fill);
                let promoted = right_keys.remove(0);
                (
                    promoted,
                    right_keys,
                    child_pages.split_off(left_fill + 1),
                    child_nodes.split_off(left_fill + 1),
                )
            }
            NodeKind::Leaf { .. } => return Err(self.corrupted(node, "internal split on leaf")),
        };

        let parent = self.nodes[node.0].parent;
        let right = self.new_node(
            parent,
            NodeKind::Internal {
                keys: right_keys,
                child_pages: right_pages,
                child_nodes: right_nodes.clone(),
            },
        );
        for child in right_nodes {
            self.nodes[child.0].parent = Some(right);
        }
        self.link_after(node, right);

        self.write_node(node)?;
        self.write_node(right)?;
        debug!(
            "split internal {} -> {}, promoting {}",
            self.nodes[node.0].page,
            self.nodes[right.0].page,
            promoted
        );

        self.insert_into_parent(node, promoted, right)
    }

    /// Allocates the next page and adds a node for it to the arena.
    fn new_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let page = self.header.next_page;
        self.header.next_page = PageId::new(page.as_u32() + 1);
        self.header.num_nodes += 1;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            page,
            parent,
            left: None,
            right: None,
            kind,
        });
        id
    }

    /// Places `new` directly to the right of `node` in its level's chain.
    fn link_after(&mut self, node: NodeId, new: NodeId) {
        let next = self.nodes[node.0].right;
        self.nodes[new.0].left = Some(node);
        self.nodes[new.0].right = next;
        if let Some(next) = next {
            debug_assert_eq!(self.nodes[next.0].left, Some(node));
            self.nodes[next.0].left = Some(new);
        }
        self.nodes[node.0].right = Some(new);
    }

    fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
        self.header.root_page = self.nodes[root.0].page;
    }

    fn write_node(&mut self, id: NodeId) -> Result<()> {
        let node = &self.nodes[id.0];
        let page = node.to_page();
        self.bpm.with_write_page(node.page, |data| page.encode(data))
    }

    /// Persists the header and flushes the pool at the end of a mutation.
    fn finish_update(&mut self) -> Result<()> {
        let header = self.header;
        self.bpm
            .with_write_page(PageId::new(HEADER_PAGE_NUM), |data| {
                header.encode(data);
                Ok(())
            })?;
        self.bpm.force_flush_pool()
    }

    /// Reads every node reachable from the root. Parents, children and the
    /// left-to-right chain of each level are wired while walking depth-first.
    fn load_nodes(&mut self) -> Result<()> {
        if self.header.num_nodes == 0 {
            if self.header.num_entries != 0 || self.header.depth != 0 {
                return Err(SpruceError::IndexCorrupted(
                    "empty tree with entries or depth".to_string(),
                ));
            }
            return Ok(());
        }

        let depth = self.header.depth as usize;
        let mut last_on_level: Vec<Option<NodeId>> = vec![None; depth];
        let mut seen: HashSet<PageId> = HashSet::new();
        let mut stack: Vec<(PageId, Option<NodeId>, usize)> =
            vec![(self.header.root_page, None, 0)];
        let mut num_entries = 0u64;

        while let Some((page, parent, level)) = stack.pop() {
            if level >= depth {
                return Err(SpruceError::IndexCorrupted(format!(
                    "{} lies below the recorded depth {}",
                    page, depth
                )));
            }
            if page.as_u32() == HEADER_PAGE_NUM || page >= self.header.next_page {
                return Err(SpruceError::IndexCorrupted(format!(
                    "{} is not a node page",
                    page
                )));
            }
            if !seen.insert(page) || seen.len() > self.header.num_nodes as usize {
                return Err(SpruceError::IndexCorrupted(format!(
                    "{} reached twice or more nodes than recorded",
                    page
                )));
            }

            let decoded = self.bpm.with_read_page(page, NodePage::decode)?;
            let is_last_level = level + 1 == depth;
            if decoded.is_leaf() != is_last_level {
                return Err(SpruceError::IndexCorrupted(format!(
                    "{} has the wrong node type for level {}",
                    page, level
                )));
            }

            let (kind, children) = match decoded {
                NodePage::Leaf { keys, rids } => {
                    num_entries += keys.len() as u64;
                    (NodeKind::Leaf { keys, rids }, Vec::new())
                }
                NodePage::Internal { keys, children } => (
                    NodeKind::Internal {
                        keys,
                        child_pages: children.clone(),
                        child_nodes: Vec::with_capacity(children.len()),
                    },
                    children,
                ),
            };

            let id = NodeId(self.nodes.len());
            let left = last_on_level[level];
            self.nodes.push(Node {
                page,
                parent,
                left,
                right: None,
                kind,
            });
            if let Some(left) = left {
                self.nodes[left.0].right = Some(id);
            }
            last_on_level[level] = Some(id);

            match parent {
                None => self.root = Some(id),
                Some(parent) => {
                    if let NodeKind::Internal { child_nodes, .. } = &mut self.nodes[parent.0].kind {
                        child_nodes.push(id);
                    }
                }
            }

            // reversed so the leftmost child is visited first
            for child in children.into_iter().rev() {
                stack.push((child, Some(id), level + 1));
            }
        }

        if self.nodes.len() != self.header.num_nodes as usize {
            return Err(SpruceError::IndexCorrupted(format!(
                "found {} nodes, header records {}",
                self.nodes.len(),
                self.header.num_nodes
            )));
        }
        if num_entries != self.header.num_entries as u64 {
            return Err(SpruceError::IndexCorrupted(format!(
                "found {} entries, header records {}",
                num_entries, self.header.num_entries
            )));
        }
        Ok(())
    }

    /// Header fields must fit inside the file before any node page is pinned.
    fn check_extent(header: &IndexHeader, num_pages: u32) -> Result<()> {
        let next_page = header.next_page.as_u32();
        if next_page > num_pages {
            return Err(SpruceError::InvalidIndexFile(format!(
                "next page {} lies beyond the {} pages in the file",
                next_page, num_pages
            )));
        }
        if header.num_nodes >= next_page {
            return Err(SpruceError::InvalidIndexFile(format!(
                "{} nodes cannot fit below page {}",
                header.num_nodes, next_page
            )));
        }
        if header.depth > header.num_nodes {
            return Err(SpruceError::InvalidIndexFile(format!(
                "depth {} exceeds the {} nodes",
                header.depth, header.num_nodes
            )));
        }
        Ok(())
    }

    fn corrupted(&self, node: NodeId, what: &str) -> SpruceError {
        SpruceError::IndexCorrupted(format!("{}: {}", self.nodes[node.0].page, what))
    }
}
