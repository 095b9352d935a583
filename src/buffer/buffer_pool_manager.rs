use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::common::{FrameId, PageId, Result, SpruceError, PAGE_SIZE};
use crate::storage::disk::DiskManager;

use super::{BufferPoolStats, Frame, ReplacementStrategy, Replacer, StatsSnapshot};

/// Handle to a page pinned in the buffer pool.
///
/// Every successful [`BufferPoolManager::pin_page`] must be matched by one
/// [`BufferPoolManager::unpin_page`] with the returned handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    page_id: PageId,
}

impl PageHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

/// BufferPoolManager caches the pages of one block file in a fixed number of
/// frames. Pinned pages stay resident; when no frame is free, the configured
/// replacement strategy picks an unpinned victim and dirty victims are written
/// back before their frame is reused.
pub struct BufferPoolManager {
    pool_size: usize,
    strategy: ReplacementStrategy,
    disk_manager: Arc<DiskManager>,
    frames: Vec<Frame>,
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
    replacer: Box<dyn Replacer>,
    stats: BufferPoolStats,
    is_open: bool,
}

impl BufferPoolManager {
    /// Creates a buffer pool with `pool_size` frames over an open block store.
    pub fn new(
        pool_size: usize,
        strategy: ReplacementStrategy,
        disk_manager: Arc<DiskManager>,
    ) -> Result<Self> {
        if pool_size == 0 {
            return Err(SpruceError::InvalidPoolSize);
        }

        let frames = (0..pool_size)
            .map(|i| Frame::new(FrameId::new(i as u32)))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();

        debug!(
            "buffer pool over {} with {} frames, strategy {}",
            disk_manager.path().display(),
            pool_size,
            strategy
        );

        Ok(Self {
            pool_size,
            strategy,
            disk_manager,
            frames,
            page_table: HashMap::new(),
            free_list,
            replacer: strategy.build(pool_size),
            stats: BufferPoolStats::new(),
            is_open: true,
        })
    }

    /// Opens the block file at `path` and creates a buffer pool over it.
    pub fn open<P: AsRef<Path>>(
        path: P,
        pool_size: usize,
        strategy: ReplacementStrategy,
    ) -> Result<Self> {
        let disk_manager = Arc::new(DiskManager::open(path)?);
        Self::new(pool_size, strategy, disk_manager)
    }

    /// Pins a page, loading it into a frame when it is not resident.
    ///
    /// A page past the end of the file is materialized as zero blocks first.
    pub fn pin_page(&mut self, page_id: PageId) -> Result<PageHandle> {
        self.ensure_open()?;

        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id.as_usize()].pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            self.stats.cache_hits += 1;
            return Ok(PageHandle { page_id });
        }

        let needed_pages = page_id
            .as_u32()
            .checked_add(1)
            .ok_or(SpruceError::ReadNonExistingPage(page_id))?;

        let frame_id = self.get_free_frame()?;
        let loaded = self
            .disk_manager
            .ensure_capacity(needed_pages)
            .and_then(|_| {
                self.disk_manager
                    .read_page(page_id, self.frames[frame_id.as_usize()].data_mut())
            });
        if let Err(e) = loaded {
            self.frames[frame_id.as_usize()].reset();
            self.free_list.push_back(frame_id);
            return Err(e);
        }

        let frame = &mut self.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        self.stats.cache_misses += 1;
        self.stats.pages_read += 1;
        trace!("loaded {} into {}", page_id, frame_id);

        Ok(PageHandle { page_id })
    }

    /// Releases one pin. The frame becomes evictable when its pin count reaches 0.
    pub fn unpin_page(&mut self, handle: &PageHandle) -> Result<()> {
        let frame_id = self.resident_frame(handle.page_id)?;

        match self.frames[frame_id.as_usize()].unpin() {
            None => Err(SpruceError::PageNotPinned(handle.page_id)),
            Some(0) => {
                self.replacer.set_evictable(frame_id, true);
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }

    /// Flags the page as modified so it is written back before its frame is reused.
    pub fn mark_dirty(&mut self, handle: &PageHandle) -> Result<()> {
        let frame_id = self.resident_frame(handle.page_id)?;
        self.frames[frame_id.as_usize()].set_dirty(true);
        Ok(())
    }

    /// Writes the page to disk whether or not it is dirty.
    pub fn force_page(&mut self, handle: &PageHandle) -> Result<()> {
        let frame_id = self.resident_frame(handle.page_id)?;
        self.write_back(frame_id)
    }

    /// Writes back every dirty page that is not pinned.
    pub fn force_flush_pool(&mut self) -> Result<()> {
        self.ensure_open()?;

        let dirty: Vec<FrameId> = self
            .frames
            .iter()
            .filter(|f| f.page_id().is_some() && f.is_dirty() && f.pin_count() == 0)
            .map(|f| f.frame_id())
            .collect();

        for frame_id in dirty {
            self.write_back(frame_id)?;
        }
        Ok(())
    }

    /// Flushes all dirty pages, closes the block file and releases every frame.
    ///
    /// Refused while any page is pinned; the pool stays usable in that case.
    pub fn shutdown(&mut self) -> Result<()> {
        self.ensure_open()?;

        let pinned = self.frames.iter().filter(|f| f.pin_count() > 0).count();
        if pinned > 0 {
            warn!("refusing buffer pool shutdown: {} pages pinned", pinned);
            return Err(SpruceError::PinnedPagesInBuffer(pinned));
        }

        self.force_flush_pool()?;
        self.disk_manager.sync()?;

        for (_, frame_id) in self.page_table.drain() {
            self.replacer.remove(frame_id);
        }
        self.frames.clear();
        self.free_list.clear();
        self.disk_manager.close()?;
        self.is_open = false;

        debug!("buffer pool shut down, {}", self.stats.snapshot());
        Ok(())
    }

    /// Bytes of a pinned page.
    pub fn data(&self, handle: &PageHandle) -> Result<&[u8; PAGE_SIZE]> {
        let frame_id = self.pinned_frame(handle.page_id)?;
        Ok(self.frames[frame_id.as_usize()].data())
    }

    /// Mutable bytes of a pinned page. Callers must also call `mark_dirty`.
    pub fn data_mut(&mut self, handle: &PageHandle) -> Result<&mut [u8; PAGE_SIZE]> {
        let frame_id = self.pinned_frame(handle.page_id)?;
        Ok(self.frames[frame_id.as_usize()].data_mut())
    }

    /// Pins `page_id`, hands its bytes to `f`, and unpins it again.
    pub fn with_read_page<R, F>(&mut self, page_id: PageId, f: F) -> Result<R>
    where
        F: FnOnce(&[u8]) -> Result<R>,
    {
        let handle = self.pin_page(page_id)?;
        let result = self.data(&handle).and_then(|data| f(&data[..]));
        let unpinned = self.unpin_page(&handle);
        let value = result?;
        unpinned?;
        Ok(value)
    }

    /// Like [`with_read_page`](Self::with_read_page) but mutable; the page is
    /// marked dirty before it is unpinned.
    pub fn with_write_page<R, F>(&mut self, page_id: PageId, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> Result<R>,
    {
        let handle = self.pin_page(page_id)?;
        let result = self.data_mut(&handle).and_then(|data| f(&mut data[..]));
        let marked = if result.is_ok() {
            self.mark_dirty(&handle)
        } else {
            Ok(())
        };
        let unpinned = self.unpin_page(&handle);
        let value = result?;
        marked?;
        unpinned?;
        Ok(value)
    }

    /// Page held by each frame, in frame order.
    pub fn frame_contents(&self) -> Vec<Option<PageId>> {
        self.frames.iter().map(|f| f.page_id()).collect()
    }

    /// Dirty flag of each frame, in frame order.
    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.is_dirty()).collect()
    }

    /// Pin count of each frame, in frame order.
    pub fn fix_counts(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.pin_count()).collect()
    }

    /// Pages read from disk since the pool was created.
    pub fn num_read_io(&self) -> u64 {
        self.stats.pages_read
    }

    /// Pages written to disk since the pool was created.
    pub fn num_write_io(&self) -> u64 {
        self.stats.pages_written
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(SpruceError::PoolNotOpen)
        }
    }

    fn resident_frame(&self, page_id: PageId) -> Result<FrameId> {
        self.ensure_open()?;
        self.page_table
            .get(&page_id)
            .copied()
            .ok_or(SpruceError::PageNotResident(page_id))
    }

    fn pinned_frame(&self, page_id: PageId) -> Result<FrameId> {
        let frame_id = self.resident_frame(page_id)?;
        if self.frames[frame_id.as_usize()].pin_count() == 0 {
            return Err(SpruceError::PageNotPinned(page_id));
        }
        Ok(frame_id)
    }

    fn write_back(&mut self, frame_id: FrameId) -> Result<()> {
        let frame = &mut self.frames[frame_id.as_usize()];
        let Some(page_id) = frame.page_id() else {
            return Ok(());
        };

        self.disk_manager.write_page(page_id, frame.data())?;
        frame.set_dirty(false);
        self.stats.pages_written += 1;
        Ok(())
    }

    /// Gets a free frame, either from the free list or by evicting a page.
    fn get_free_frame(&mut self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.evict().ok_or(SpruceError::BufferPoolFull)?;

        if self.frames[frame_id.as_usize()].is_dirty() {
            if let Err(e) = self.write_back(frame_id) {
                // Keep the victim resident and evictable. The replacer sees it
                // as a fresh access, so its FIFO position and LFU count restart.
                self.replacer.record_access(frame_id);
                self.replacer.set_evictable(frame_id, true);
                return Err(e);
            }
        }

        let frame = &mut self.frames[frame_id.as_usize()];
        if let Some(old_page_id) = frame.page_id() {
            self.page_table.remove(&old_page_id);
            trace!("evicted {} from {}", old_page_id, frame_id);
        }
        frame.reset();
        self.stats.evictions += 1;

        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if self.is_open {
            let _ = self.force_flush_pool();
        }
    }
}
