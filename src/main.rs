use spruce::buffer::ReplacementStrategy;
use spruce::common::{IndexOptions, KeyType, PageId, RecordId, SlotId};
use spruce::index::BTreeIndex;

fn main() -> spruce::Result<()> {
    env_logger::init();

    println!("Spruce - a buffer-managed B-tree index");
    println!("======================================\n");

    let index_path = "demo.idx";

    BTreeIndex::create(index_path, KeyType::Int, 3)?;
    println!("Created index {} with order 3", index_path);

    let options = IndexOptions::default()
        .with_pool_size(4)
        .with_strategy(ReplacementStrategy::Clock);
    let mut index = BTreeIndex::open_with_options(index_path, options)?;
    println!("Opened index with a 4-frame CLOCK buffer pool\n");

    for key in [50, 20, 80, 10, 30, 60, 90, 40, 70] {
        let rid = RecordId::new(PageId::new(key as u32 / 10), SlotId::new(key as u16 % 10));
        index.insert_key(key, rid)?;
        println!("Inserted key {} -> {}", key, rid);
    }

    println!("\nTree ({} nodes, depth {}):", index.get_num_nodes(), index.depth());
    print!("{}", index.print_tree());

    index.delete_key(30)?;
    println!("\nDeleted key 30, {} entries left", index.get_num_entries());

    println!("\nScan in key order:");
    let mut scan = index.open_tree_scan();
    while let Some((key, rid)) = scan.next_pair() {
        println!("  {} -> {}", key, rid);
    }
    scan.close();

    println!("\nBuffer pool: {}", index.buffer_pool().stats());

    index.close()?;
    let index = BTreeIndex::open(index_path)?;
    println!(
        "\nReopened index: {} entries, key 70 -> {}",
        index.get_num_entries(),
        index.find_key(70)?
    );
    index.close()?;

    BTreeIndex::delete(index_path)?;
    println!("\nDemo completed successfully!");
    Ok(())
}
