use std::collections::BTreeMap;
use std::path::PathBuf;

use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use spruce::buffer::ReplacementStrategy;
use spruce::common::{IndexOptions, KeyType, PageId, RecordId, SlotId, PAGE_SIZE};
use spruce::index::{BTreeIndex, IndexHeader, NodePage};
use spruce::storage::disk::DiskManager;
use spruce::SpruceError;

use tempfile::TempDir;

fn rid(page: u32, slot: u16) -> RecordId {
    RecordId::new(PageId::new(page), SlotId::new(slot))
}

fn rid_for(key: i32) -> RecordId {
    rid(key.unsigned_abs() / 100, (key.unsigned_abs() % 100) as u16)
}

fn create_index(order: usize) -> (BTreeIndex, TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("btree.idx");
    BTreeIndex::create(&path, KeyType::Int, order).unwrap();
    let index = BTreeIndex::open(&path).unwrap();
    (index, dir, path)
}

fn scan_keys(index: &BTreeIndex) -> Vec<i32> {
    let mut scan = index.open_tree_scan();
    let mut keys = Vec::new();
    while let Some((key, _)) = scan.next_pair() {
        keys.push(key);
    }
    scan.close();
    keys
}

#[test]
fn test_btree_create_and_open() {
    let (index, _dir, path) = create_index(4);

    assert_eq!(index.get_num_nodes(), 0);
    assert_eq!(index.get_num_entries(), 0);
    assert_eq!(index.get_key_type(), KeyType::Int);
    assert_eq!(index.order(), 4);
    assert_eq!(index.depth(), 0);
    assert_eq!(index.path(), path.as_path());
    index.close().unwrap();
}

#[test]
fn test_btree_order_two_split_scenario() {
    let (mut index, _dir, _path) = create_index(2);

    index.insert_key(10, rid(1, 0)).unwrap();
    index.insert_key(20, rid(1, 1)).unwrap();
    index.insert_key(30, rid(1, 2)).unwrap();

    // root holds the single separator 20 over leaves {10} and {20, 30}
    assert_eq!(index.get_num_nodes(), 3);
    assert_eq!(index.get_num_entries(), 3);
    assert_eq!(
        index.print_tree(),
        "(3)[1,20,2]\n(1)[1.0,10]\n(2)[1.1,20,1.2,30]\n"
    );
    assert_eq!(index.find_key(20).unwrap(), rid(1, 1));

    let mut scan = index.open_tree_scan();
    assert_eq!(scan.next_entry().unwrap(), rid(1, 0));
    assert_eq!(scan.next_entry().unwrap(), rid(1, 1));
    assert_eq!(scan.next_entry().unwrap(), rid(1, 2));
    assert!(matches!(scan.next_entry(), Err(SpruceError::NoMoreEntries)));
    scan.close();

    index.close().unwrap();
}

#[test]
fn test_btree_split_on_order_plus_one_keys() {
    for order in [1, 2, 3, 4, 7] {
        let (mut index, _dir, _path) = create_index(order);

        for key in 0..=order as i32 {
            index.insert_key(key, rid_for(key)).unwrap();
        }

        assert_eq!(index.depth(), 2, "order {}", order);
        assert_eq!(index.get_num_nodes(), 3, "order {}", order);
        assert_eq!(scan_keys(&index), (0..=order as i32).collect::<Vec<_>>());
        index.close().unwrap();
    }
}

#[test]
fn test_btree_duplicate_key() {
    let (mut index, _dir, _path) = create_index(3);

    index.insert_key(42, rid(1, 1)).unwrap();
    assert!(matches!(
        index.insert_key(42, rid(9, 9)),
        Err(SpruceError::KeyAlreadyExists(42))
    ));

    assert_eq!(index.get_num_entries(), 1);
    assert_eq!(index.find_key(42).unwrap(), rid(1, 1));
}

#[test]
fn test_btree_random_inserts() {
    let (mut index, _dir, _path) = create_index(5);
    let mut keys: Vec<i32> = (0..500).map(|k| k * 3 - 400).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(7));

    for &key in &keys {
        index.insert_key(key, rid_for(key)).unwrap();
    }

    assert_eq!(index.get_num_entries(), 500);
    for &key in &keys {
        assert_eq!(index.find_key(key).unwrap(), rid_for(key));
    }
    assert!(matches!(index.find_key(1), Err(SpruceError::KeyNotFound(1))));

    keys.sort();
    assert_eq!(scan_keys(&index), keys);
}

#[test]
fn test_btree_close_and_reopen() {
    let (mut index, _dir, path) = create_index(3);

    for key in (0..120).rev() {
        index.insert_key(key, rid_for(key)).unwrap();
    }
    for key in (0..120).step_by(4) {
        index.delete_key(key).unwrap();
    }

    let entries = index.entries();
    let (num_nodes, depth, tree) = (index.get_num_nodes(), index.depth(), index.print_tree());
    index.close().unwrap();

    let mut index = BTreeIndex::open(&path).unwrap();
    assert_eq!(index.entries(), entries);
    assert_eq!(index.get_num_entries(), 90);
    assert_eq!(index.get_num_nodes(), num_nodes);
    assert_eq!(index.depth(), depth);
    assert_eq!(index.print_tree(), tree);

    // the reopened tree keeps growing from where it stopped
    index.insert_key(1000, rid(10, 0)).unwrap();
    assert_eq!(index.find_key(1000).unwrap(), rid(10, 0));
    index.close().unwrap();
}

#[test]
fn test_btree_every_replacement_strategy() {
    let strategies = [
        ReplacementStrategy::Fifo,
        ReplacementStrategy::Lru,
        ReplacementStrategy::Clock,
        ReplacementStrategy::Lfu,
        ReplacementStrategy::LruK(2),
    ];

    for strategy in strategies {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.idx");
        BTreeIndex::create(&path, KeyType::Int, 4).unwrap();

        let options = IndexOptions::default()
            .with_pool_size(3)
            .with_strategy(strategy);
        let mut index = BTreeIndex::open_with_options(&path, options).unwrap();
        for key in 0..200 {
            index.insert_key(key, rid_for(key)).unwrap();
        }
        let pool = index.buffer_pool();
        assert_eq!(pool.strategy(), strategy);
        assert!(pool.stats().evictions > 0, "{}", strategy);
        assert!(pool.fix_counts().iter().all(|&c| c == 0), "{}", strategy);
        index.close().unwrap();

        let index = BTreeIndex::open_with_options(&path, options).unwrap();
        for key in 0..200 {
            assert_eq!(index.find_key(key).unwrap(), rid_for(key), "{}", strategy);
        }
        index.close().unwrap();
    }
}

#[test]
fn test_btree_delete() {
    let (mut index, _dir, _path) = create_index(3);

    for key in 1..=20 {
        index.insert_key(key, rid_for(key)).unwrap();
    }
    let nodes = index.get_num_nodes();

    for key in (1..=20).filter(|k| k % 2 == 0) {
        index.delete_key(key).unwrap();
    }
    assert!(matches!(index.delete_key(4), Err(SpruceError::KeyNotFound(4))));

    assert_eq!(index.get_num_entries(), 10);
    assert_eq!(index.get_num_nodes(), nodes);
    assert_eq!(scan_keys(&index), (1..=20).step_by(2).collect::<Vec<_>>());

    // deleted keys can be inserted again
    index.insert_key(4, rid(77, 7)).unwrap();
    assert_eq!(index.find_key(4).unwrap(), rid(77, 7));
}

#[test]
fn test_btree_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.idx");

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::FileNotFound(_))
    ));
    assert!(matches!(
        BTreeIndex::delete(&path),
        Err(SpruceError::FileNotFound(_))
    ));
}

#[test]
fn test_btree_rejects_foreign_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.idx");
    std::fs::write(&path, vec![0xAB; 4096]).unwrap();

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::InvalidIndexFile(_))
    ));
}

#[test]
fn test_btree_delete_file() {
    let (mut index, _dir, path) = create_index(3);
    index.insert_key(1, rid(1, 1)).unwrap();
    index.close().unwrap();

    BTreeIndex::delete(&path).unwrap();
    assert!(!path.exists());
}

/// Builds the order-2 tree over 10, 20, 30: leaves on pages 1 and 2, root on page 3.
fn create_small_index() -> (TempDir, PathBuf) {
    let (mut index, dir, path) = create_index(2);
    for (slot, key) in [10, 20, 30].into_iter().enumerate() {
        index.insert_key(key, rid(1, slot as u16)).unwrap();
    }
    index.close().unwrap();
    (dir, path)
}

fn patch_header(path: &PathBuf, f: impl FnOnce(&mut IndexHeader)) {
    let dm = DiskManager::open(path).unwrap();
    let mut page = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut page).unwrap();
    let mut header = IndexHeader::decode(&page).unwrap();
    f(&mut header);
    header.encode(&mut page);
    dm.write_page(PageId::new(0), &page).unwrap();
    dm.close().unwrap();
}

fn overwrite_node(path: &PathBuf, page_id: u32, node: &NodePage) {
    let dm = DiskManager::open(path).unwrap();
    let mut page = [0u8; PAGE_SIZE];
    node.encode(&mut page).unwrap();
    dm.write_page(PageId::new(page_id), &page).unwrap();
    dm.close().unwrap();
}

fn file_len(path: &PathBuf) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn test_btree_open_rejects_header_beyond_file() {
    let (_dir, path) = create_small_index();
    patch_header(&path, |header| {
        header.root_page = PageId::new(50_000);
        header.next_page = PageId::new(100_000);
        header.num_nodes = 1;
        header.depth = 1;
    });
    let len = file_len(&path);

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::InvalidIndexFile(_))
    ));
    assert_eq!(file_len(&path), len);
}

#[test]
fn test_btree_open_rejects_impossible_counts() {
    let (_dir, path) = create_small_index();

    patch_header(&path, |header| header.depth = 1_000_000);
    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::InvalidIndexFile(_))
    ));

    patch_header(&path, |header| {
        header.depth = 2;
        header.num_nodes = 4;
    });
    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::InvalidIndexFile(_))
    ));
}

#[test]
fn test_btree_open_rejects_non_integer_keys() {
    let (_dir, path) = create_small_index();
    patch_header(&path, |header| header.key_type = KeyType::String);

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::InvalidIndexFile(_))
    ));
}

#[test]
fn test_btree_open_rejects_page_reached_twice() {
    let (_dir, path) = create_small_index();
    overwrite_node(
        &path,
        3,
        &NodePage::Internal {
            keys: vec![20],
            children: vec![PageId::new(1), PageId::new(1)],
        },
    );

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::IndexCorrupted(_))
    ));
}

#[test]
fn test_btree_open_rejects_leaf_above_last_level() {
    let (_dir, path) = create_small_index();
    patch_header(&path, |header| header.depth = 3);

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::IndexCorrupted(_))
    ));
}

#[test]
fn test_btree_open_rejects_node_count_mismatch() {
    let (_dir, path) = create_small_index();
    {
        let dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.append_empty_block().unwrap(), PageId::new(4));
        dm.close().unwrap();
    }
    patch_header(&path, |header| {
        header.num_nodes = 4;
        header.next_page = PageId::new(5);
    });

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::IndexCorrupted(_))
    ));
}

#[test]
fn test_btree_open_rejects_entry_count_mismatch() {
    let (_dir, path) = create_small_index();
    patch_header(&path, |header| header.num_entries = 4);

    assert!(matches!(
        BTreeIndex::open(&path),
        Err(SpruceError::IndexCorrupted(_))
    ));
}

#[derive(Debug, Clone)]
enum Op {
    Insert(i32),
    Delete(i32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-200i32..200).prop_map(Op::Insert),
        1 => (-200i32..200).prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_scan_matches_model(
        order in 1usize..6,
        ops in proptest::collection::vec(op_strategy(), 1..150)
    ) {
        let (mut index, _dir, _path) = create_index(order);
        let mut model: BTreeMap<i32, RecordId> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key) => {
                    let result = index.insert_key(key, rid_for(key));
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(SpruceError::KeyAlreadyExists(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, rid_for(key));
                    }
                }
                Op::Delete(key) => {
                    let result = index.delete_key(key);
                    prop_assert_eq!(result.is_ok(), model.remove(&key).is_some());
                }
            }
        }

        let expected: Vec<(i32, RecordId)> = model.into_iter().collect();
        prop_assert_eq!(index.get_num_entries() as usize, expected.len());
        prop_assert_eq!(index.entries(), expected);
        index.close().unwrap();
    }
}
