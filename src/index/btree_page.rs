//! On-page formats of the index file.
//!
//! Page 0 holds the [`IndexHeader`]; every other used page holds one
//! [`NodePage`]. All integers are 32-bit little-endian.
//!
//! Node page layout:
//!
//! ```text
//! | is_leaf (4) | fill (4) | entries ...
//! internal: fill x (child_page, key), then the trailing child_page
//! leaf:     fill x (rid_page, rid_slot), then fill x key
//! ```

use bytes::{Buf, BufMut};

use crate::common::{
    KeyType, PageId, RecordId, Result, SlotId, SpruceError, INDEX_FORMAT_VERSION, INDEX_MAGIC,
    INT_SIZE, MAX_BTREE_ORDER, NODE_HEADER_SIZE, PAGE_SIZE,
};

const LEAF_TAG: i32 = 1;
const INTERNAL_TAG: i32 = 0;

/// Bytes per `(pointer, payload)` pair
const PAIR_SIZE: usize = 2 * INT_SIZE;

/// Most keys a leaf page can hold: a pair plus a key per entry
pub const LEAF_CAPACITY: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / (PAIR_SIZE + INT_SIZE);

/// Most keys an internal page can hold: a pair per key plus the trailing child
pub const INTERNAL_CAPACITY: usize = (PAGE_SIZE - NODE_HEADER_SIZE - INT_SIZE) / PAIR_SIZE;

/// Decoded contents of one node page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePage {
    Leaf {
        keys: Vec<i32>,
        rids: Vec<RecordId>,
    },
    Internal {
        keys: Vec<i32>,
        /// Always `keys.len() + 1` entries
        children: Vec<PageId>,
    },
}

impl NodePage {
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodePage::Leaf { .. })
    }

    /// Serializes the node into a page buffer. Bytes past the entries are zeroed.
    pub fn encode(&self, page: &mut [u8]) -> Result<()> {
        assert_eq!(page.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        page.fill(0);
        let mut out = page;

        match self {
            NodePage::Leaf { keys, rids } => {
                if keys.len() != rids.len() || keys.len() > LEAF_CAPACITY {
                    return Err(SpruceError::IndexCorrupted(format!(
                        "leaf with {} keys and {} record ids does not fit a page",
                        keys.len(),
                        rids.len()
                    )));
                }
                out.put_i32_le(LEAF_TAG);
                out.put_i32_le(keys.len() as i32);
                for rid in rids {
                    out.put_i32_le(rid.page_id.as_u32() as i32);
                    out.put_i32_le(rid.slot_id.as_u16() as i32);
                }
                for &key in keys {
                    out.put_i32_le(key);
                }
            }
            NodePage::Internal { keys, children } => {
                if children.len() != keys.len() + 1 || keys.len() > INTERNAL_CAPACITY {
                    return Err(SpruceError::IndexCorrupted(format!(
                        "internal node with {} keys and {} children does not fit a page",
                        keys.len(),
                        children.len()
                    )));
                }
                out.put_i32_le(INTERNAL_TAG);
                out.put_i32_le(keys.len() as i32);
                for (child, &key) in children.iter().zip(keys) {
                    out.put_i32_le(child.as_u32() as i32);
                    out.put_i32_le(key);
                }
                out.put_i32_le(children[keys.len()].as_u32() as i32);
            }
        }
        Ok(())
    }

    /// Parses a node page.
    pub fn decode(page: &[u8]) -> Result<Self> {
        assert_eq!(page.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let mut input = page;

        let tag = input.get_i32_le();
        let fill = input.get_i32_le();

        let capacity = match tag {
            LEAF_TAG => LEAF_CAPACITY,
            INTERNAL_TAG => INTERNAL_CAPACITY,
            other => {
                return Err(SpruceError::IndexCorrupted(format!(
                    "bad node tag {}",
                    other
                )))
            }
        };
        if fill < 0 || fill as usize > capacity {
            return Err(SpruceError::IndexCorrupted(format!(
                "node fill {} outside 0..={}",
                fill, capacity
            )));
        }
        let fill = fill as usize;

        if tag == LEAF_TAG {
            let mut rids = Vec::with_capacity(fill);
            for _ in 0..fill {
                let page_id = PageId::new(input.get_i32_le() as u32);
                let slot = input.get_i32_le();
                let slot = u16::try_from(slot).map_err(|_| {
                    SpruceError::IndexCorrupted(format!("record slot {} out of range", slot))
                })?;
                rids.push(RecordId::new(page_id, SlotId::new(slot)));
            }
            let keys = (0..fill).map(|_| input.get_i32_le()).collect();
            Ok(NodePage::Leaf { keys, rids })
        } else {
            let mut keys = Vec::with_capacity(fill);
            let mut children = Vec::with_capacity(fill + 1);
            for _ in 0..fill {
                children.push(PageId::new(input.get_i32_le() as u32));
                keys.push(input.get_i32_le());
            }
            children.push(PageId::new(input.get_i32_le() as u32));
            Ok(NodePage::Internal { keys, children })
        }
    }
}

/// Tree-level metadata stored on page 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    pub order: usize,
    pub key_type: KeyType,
    /// Meaningless while `num_nodes == 0`
    pub root_page: PageId,
    pub num_nodes: u32,
    pub num_entries: u32,
    pub depth: u32,
    /// Next unused page number
    pub next_page: PageId,
}

impl IndexHeader {
    /// Header of an index without any nodes.
    pub fn empty(order: usize, key_type: KeyType) -> Self {
        Self {
            order,
            key_type,
            root_page: PageId::new(0),
            num_nodes: 0,
            num_entries: 0,
            depth: 0,
            next_page: PageId::new(1),
        }
    }

    pub fn encode(&self, page: &mut [u8]) {
        assert_eq!(page.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        page.fill(0);
        let mut out = page;

        out.put_i32_le(self.order as i32);
        out.put_i32_le(self.key_type.as_i32());
        out.put_i32_le(self.root_page.as_u32() as i32);
        out.put_i32_le(self.num_nodes as i32);
        out.put_i32_le(self.num_entries as i32);
        out.put_i32_le(self.depth as i32);
        out.put_i32_le(self.next_page.as_u32() as i32);
        out.put_u32_le(INDEX_MAGIC);
        out.put_u32_le(INDEX_FORMAT_VERSION);
    }

    pub fn decode(page: &[u8]) -> Result<Self> {
        assert_eq!(page.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let mut input = page;

        let order = input.get_i32_le();
        let key_type = input.get_i32_le();
        let root_page = input.get_i32_le();
        let num_nodes = input.get_i32_le();
        let num_entries = input.get_i32_le();
        let depth = input.get_i32_le();
        let next_page = input.get_i32_le();
        let magic = input.get_u32_le();
        let version = input.get_u32_le();

        let invalid = |what: String| Err(SpruceError::InvalidIndexFile(what));

        if magic != INDEX_MAGIC {
            return invalid(format!("bad magic {:#010x}", magic));
        }
        if version != INDEX_FORMAT_VERSION {
            return invalid(format!("unsupported format version {}", version));
        }
        if order < 1 || order as usize > MAX_BTREE_ORDER {
            return invalid(format!("order {} out of range", order));
        }
        let Some(key_type) = KeyType::from_i32(key_type) else {
            return invalid(format!("unknown key type {}", key_type));
        };
        if key_type != KeyType::Int {
            return invalid(format!("{} keys are not supported", key_type));
        }
        if root_page < 0 || num_nodes < 0 || num_entries < 0 || depth < 0 || next_page < 1 {
            return invalid("negative header field".to_string());
        }

        Ok(Self {
            order: order as usize,
            key_type,
            root_page: PageId::new(root_page as u32),
            num_nodes: num_nodes as u32,
            num_entries: num_entries as u32,
            depth: depth as u32,
            next_page: PageId::new(next_page as u32),
        })
    }
}
