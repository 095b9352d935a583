use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{PageId, Result, SpruceError, PAGE_SIZE};

/// DiskManager is the block store underneath the buffer pool.
/// It manages a single page file made of `PAGE_SIZE` blocks and tracks how many
/// blocks the file currently holds.
pub struct DiskManager {
    /// The page file, `None` once closed
    db_file: Mutex<Option<File>>,
    /// Path to the page file
    db_path: PathBuf,
    /// Number of blocks in the file
    num_pages: AtomicU32,
    /// Number of block reads performed
    num_reads: AtomicU32,
    /// Number of block writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Creates a page file holding a single zero-filled block.
    /// An existing file at `path` is truncated.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.sync_all()?;
        debug!("created page file {}", path.as_ref().display());
        Ok(())
    }

    /// Opens an existing page file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        let file = match OpenOptions::new().read(true).write(true).open(&db_path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(SpruceError::FileNotFound(db_path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;
        debug!("opened page file {} with {} pages", db_path.display(), num_pages);

        Ok(Self {
            db_file: Mutex::new(Some(file)),
            db_path,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Removes a page file from disk.
    pub fn destroy<P: AsRef<Path>>(path: P) -> Result<()> {
        match fs::remove_file(path.as_ref()) {
            Ok(()) => {
                debug!("destroyed page file {}", path.as_ref().display());
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(SpruceError::FileNotFound(
                path.as_ref().display().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Syncs and releases the file handle. Later block operations fail with
    /// `FileNotOpen`; closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if let Some(file) = self.db_file.lock().take() {
            file.sync_all()?;
            debug!("closed page file {}", self.db_path.display());
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.db_file.lock().is_some()
    }

    /// Reads block `page_id` into `data`, which must be exactly PAGE_SIZE bytes.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let mut guard = self.db_file.lock();
        let file = guard.as_mut().ok_or(SpruceError::FileNotOpen)?;

        if page_id.as_u32() >= self.num_pages.load(Ordering::Acquire) {
            return Err(SpruceError::ReadNonExistingPage(page_id));
        }

        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.read_exact(data)?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!("read {}", page_id);
        Ok(())
    }

    /// Writes `data` to block `page_id`.
    /// Writing exactly one past the last block appends; anything further out fails.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let mut guard = self.db_file.lock();
        let file = guard.as_mut().ok_or(SpruceError::FileNotOpen)?;

        let num_pages = self.num_pages.load(Ordering::Acquire);
        if page_id.as_u32() > num_pages {
            return Err(SpruceError::WriteNonExistingPage { page_id, num_pages });
        }

        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.write_all(data)?;
        file.flush()?;

        if page_id.as_u32() == num_pages {
            self.num_pages.store(num_pages + 1, Ordering::Release);
        }

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!("wrote {}", page_id);
        Ok(())
    }

    /// Grows the file by one zero-filled block and returns its page id.
    pub fn append_empty_block(&self) -> Result<PageId> {
        let mut guard = self.db_file.lock();
        let file = guard.as_mut().ok_or(SpruceError::FileNotOpen)?;
        Self::append_zero_block(file, &self.num_pages)
    }

    /// Appends zero blocks until the file holds at least `num_pages` blocks.
    pub fn ensure_capacity(&self, num_pages: u32) -> Result<()> {
        let mut guard = self.db_file.lock();
        let file = guard.as_mut().ok_or(SpruceError::FileNotOpen)?;

        while self.num_pages.load(Ordering::Acquire) < num_pages {
            Self::append_zero_block(file, &self.num_pages)?;
        }
        Ok(())
    }

    fn append_zero_block(file: &mut File, counter: &AtomicU32) -> Result<PageId> {
        let page_id = PageId::new(counter.load(Ordering::Acquire));
        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        counter.store(page_id.as_u32() + 1, Ordering::Release);
        Ok(page_id)
    }

    /// Returns the number of blocks in the file.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    /// Returns the number of block reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of block writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Returns the path to the page file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let guard = self.db_file.lock();
        let file = guard.as_ref().ok_or(SpruceError::FileNotOpen)?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        if let Some(file) = self.db_file.get_mut() {
            let _ = file.sync_all();
        }
    }
}
