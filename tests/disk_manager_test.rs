//! Integration tests for the disk manager

use std::sync::Arc;
use std::thread;

use spruce::common::{PageId, SpruceError, PAGE_SIZE};
use spruce::storage::disk::DiskManager;
use tempfile::{NamedTempFile, TempDir};

fn create_dm() -> (DiskManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    DiskManager::create(temp_file.path()).unwrap();
    let dm = DiskManager::open(temp_file.path()).unwrap();
    (dm, temp_file)
}

#[test]
fn test_disk_manager_create_file() {
    let (dm, temp) = create_dm();

    assert_eq!(dm.num_pages(), 1);
    assert_eq!(dm.num_reads(), 0);
    assert_eq!(dm.num_writes(), 0);
    assert_eq!(dm.path(), temp.path());
    assert_eq!(
        std::fs::metadata(temp.path()).unwrap().len(),
        PAGE_SIZE as u64
    );
}

#[test]
fn test_disk_manager_create_truncates() {
    let (dm, temp) = create_dm();
    dm.ensure_capacity(5).unwrap();
    dm.close().unwrap();

    DiskManager::create(temp.path()).unwrap();
    let dm = DiskManager::open(temp.path()).unwrap();
    assert_eq!(dm.num_pages(), 1);
}

#[test]
fn test_disk_manager_random_access() {
    let (dm, _temp) = create_dm();
    dm.ensure_capacity(10).unwrap();

    let order = [7u32, 2, 9, 0, 4, 1, 8, 3, 6, 5];
    for &i in &order {
        let mut data = [0u8; PAGE_SIZE];
        data[0] = i as u8;
        data[PAGE_SIZE - 1] = (i * 3) as u8;
        dm.write_page(PageId::new(i), &data).unwrap();
    }

    for i in 0..10u32 {
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(i), &mut data).unwrap();
        assert_eq!(data[0], i as u8);
        assert_eq!(data[PAGE_SIZE - 1], (i * 3) as u8);
    }
    assert_eq!(dm.num_reads(), 10);
    assert_eq!(dm.num_writes(), 10);
}

#[test]
fn test_disk_manager_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    DiskManager::create(&path).unwrap();

    {
        let dm = DiskManager::open(&path).unwrap();
        let page_id = dm.append_empty_block().unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        dm.write_page(page_id, &data).unwrap();
        dm.close().unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        assert_eq!(dm.num_pages(), 2);

        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(1), &mut data).unwrap();
        assert_eq!(&data[..5], b"hello");
    }
}

#[test]
fn test_disk_manager_boundaries() {
    let (dm, _temp) = create_dm();
    let mut data = [0u8; PAGE_SIZE];

    assert!(matches!(
        dm.read_page(PageId::new(1), &mut data),
        Err(SpruceError::ReadNonExistingPage(_))
    ));
    assert!(matches!(
        dm.write_page(PageId::new(2), &data),
        Err(SpruceError::WriteNonExistingPage { .. })
    ));

    dm.write_page(PageId::new(1), &data).unwrap();
    dm.read_page(PageId::new(1), &mut data).unwrap();
    assert_eq!(dm.num_pages(), 2);
}

#[test]
fn test_disk_manager_destroy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pages.db");

    DiskManager::create(&path).unwrap();
    assert!(path.exists());
    DiskManager::destroy(&path).unwrap();
    assert!(!path.exists());

    assert!(matches!(
        DiskManager::open(&path),
        Err(SpruceError::FileNotFound(_))
    ));
}

#[test]
fn test_disk_manager_concurrent_writers() {
    let (dm, _temp) = create_dm();
    let dm = Arc::new(dm);
    dm.ensure_capacity(9).unwrap();

    let handles: Vec<_> = (1..9u32)
        .map(|i| {
            let dm = Arc::clone(&dm);
            thread::spawn(move || {
                let data = [i as u8; PAGE_SIZE];
                dm.write_page(PageId::new(i), &data).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 1..9u32 {
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(i), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == i as u8));
    }
}
