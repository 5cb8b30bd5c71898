//! The write-back block cache.
//!
//! Pages live in a single `LruCache` keyed by `(StoreId, block offset)`: the
//! hash index is the page store and its internal list is the recency order,
//! so the two cannot drift apart. Reads and writes are split into per-block
//! accesses; a miss fetches the whole block (read-modify-write for writes),
//! evicts the least-recently-used page if the cache is full, and inserts the
//! new page at the front. Dirty pages reach the backing store only on eviction
//! or on [`BlockCache::flush`].

use std::hash::BuildHasherDefault;
use std::io::SeekFrom;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::{debug, error, trace, warn};

use crate::config::CacheConfig;
use crate::error::{Error, IoOp, Result};
use crate::handle::{AHashMap, Handle, HandleTable};
use crate::page::{Page, PageKey, StoreId};
use crate::store::{BackingStore, FileStore};

type PageStore = LruCache<PageKey, Page, BuildHasherDefault<ahash::AHasher>>;

/// Counters since the cache was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Per-block accesses made by read and write.
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Dirty pages persisted, by eviction or flush.
    pub writebacks: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }
}

enum Transfer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl Transfer<'_> {
    fn len(&self) -> usize {
        match self {
            Transfer::Read(dst) => dst.len(),
            Transfer::Write(src) => src.len(),
        }
    }

    /// Returns `true` when the page went from clean to dirty.
    fn apply(&mut self, page: &mut Page, in_block: usize, done: usize, chunk: usize) -> bool {
        match self {
            Transfer::Read(dst) => {
                page.copy_out(in_block, &mut dst[done..done + chunk]);
                false
            }
            Transfer::Write(src) => page.copy_in(in_block, &src[done..done + chunk]),
        }
    }
}

/// Write-back cache of fixed-size blocks shared by every open handle.
///
/// Eviction never drops unsaved data. If the least-recently-used page is
/// dirty and no handle on its store is open (or persisting it fails), the
/// page stays put and *every* miss, on any store, fails with
/// [`Error::StoreClosed`] (or the I/O error) until that store is reopened
/// and flushed, or [`discard_orphans`](Self::discard_orphans) is called.
/// Flush before closing the last handle on a store to avoid this.
///
/// Store identities (canonical paths, or the names given to
/// [`attach`](Self::attach)) are remembered for the life of the cache so a
/// reopened store finds its resident pages again; the table grows by one
/// small entry per distinct store ever opened.
pub struct BlockCache<S = FileStore> {
    block_size: usize,
    pages: PageStore,
    /// Number of dirty resident pages.
    dirty: usize,
    handles: HandleTable<S>,
    stores: AHashMap<PathBuf, StoreId>,
    stats: CacheStats,
}

impl BlockCache<FileStore> {
    /// Creates a file-backed cache of `max_cache_size` pages of `block_size` bytes.
    pub fn new(block_size: usize, max_cache_size: usize) -> Result<Self> {
        Self::with_config(CacheConfig::new(block_size, max_cache_size))
    }

    /// Opens an existing file for cached access. The cursor starts at 0.
    ///
    /// The file is identified by its canonical path, so reopening it, even
    /// under another path, finds the pages left resident by earlier handles.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<Handle> {
        let path = path.as_ref();
        let opened = path
            .canonicalize()
            .and_then(|canonical| FileStore::open(&canonical).map(|store| (canonical, store)));

        match opened {
            Ok((canonical, store)) => {
                let handle = self.attach(&canonical, store);
                debug!(%handle, path = %canonical.display(), "opened");
                Ok(handle)
            }
            Err(source) => {
                warn!(path = %path.display(), %source, "open failed");
                Err(Error::Open {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

impl<S: BackingStore> BlockCache<S> {
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_cache_size)
            .ok_or(Error::InvalidConfig("max cache size must be non-zero"))?;

        Ok(Self {
            block_size: config.block_size,
            pages: LruCache::with_hasher(capacity, BuildHasherDefault::default()),
            dirty: 0,
            handles: HandleTable::new(),
            stores: AHashMap::default(),
            stats: CacheStats::default(),
        })
    }

    /// Registers an already-open store under `name`.
    ///
    /// Stores attached under the same name share pages, exactly like two
    /// opens of one file.
    pub fn attach(&mut self, name: impl AsRef<Path>, store: S) -> Handle {
        let id = self.intern(name.as_ref());
        self.handles.insert(store, id)
    }

    /// Syncs the store's own buffers and releases the handle.
    ///
    /// Cached pages are left alone; dirty ones must be flushed beforehand or
    /// they stay resident until a later handle on the same store flushes them.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        let mut open = self
            .handles
            .remove(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        debug!(%handle, store = %open.id, "closing");

        open.store.sync().map_err(|e| {
            warn!(%handle, error = %e, "sync on close failed");
            Error::io(IoOp::Sync, 0, e)
        })
    }

    /// Reads `buf.len()` bytes at the handle's cursor and advances it.
    ///
    /// Bytes past the end of the store read as zero. On failure the cursor
    /// still reflects every block completed before the failing one.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        self.transfer(handle, Transfer::Read(buf))
    }

    /// Writes `buf` at the handle's cursor into cached pages and advances it.
    /// Nothing reaches the store until eviction or [`flush`](Self::flush).
    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        self.transfer(handle, Transfer::Write(buf))
    }

    /// Moves the handle's cursor. `SeekFrom::Current` is relative to the
    /// handle's own cursor; `SeekFrom::End` is resolved by the store.
    pub fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        let open = self
            .handles
            .get_mut(handle)
            .ok_or(Error::InvalidHandle(handle))?;

        let target = match pos {
            SeekFrom::Current(delta) => {
                let cursor = open.cursor;
                let start = cursor
                    .checked_add_signed(delta)
                    .ok_or(Error::InvalidSeek { cursor, delta })?;
                SeekFrom::Start(start)
            }
            other => other,
        };

        let new_pos = open
            .store
            .seek(target)
            .map_err(|e| Error::io(IoOp::Seek, open.cursor, e))?;
        open.cursor = new_pos;
        Ok(new_pos)
    }

    /// Persists every dirty page of the handle's store and returns how many
    /// were written. Stops at the first failure; later pages stay dirty.
    pub fn flush(&mut self, handle: Handle) -> Result<usize> {
        let open = self
            .handles
            .get_mut(handle)
            .ok_or(Error::InvalidHandle(handle))?;

        let mut written = 0;
        for (key, page) in self.pages.iter_mut() {
            if key.store != open.id || !page.dirty {
                continue;
            }
            open.store
                .write_at(key.offset, &page.data)
                .map_err(|e| Error::io(IoOp::Persist, key.offset, e))?;
            page.dirty = false;
            self.dirty -= 1;
            written += 1;
            self.stats.writebacks += 1;
        }

        debug!(%handle, store = %open.id, written, "flushed");
        Ok(written)
    }

    /// Drops dirty pages whose store has no open handle, losing their
    /// modifications. Returns how many were dropped.
    pub fn discard_orphans(&mut self) -> usize {
        let orphans: Vec<PageKey> = self
            .pages
            .iter()
            .filter(|(key, page)| page.dirty && !self.handles.has_store(key.store))
            .map(|(key, _)| *key)
            .collect();

        for key in &orphans {
            self.pages.pop(key);
        }
        self.dirty -= orphans.len();
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "discarded unflushed orphan pages");
        }
        orphans.len()
    }

    /// Whether the block containing `offset` of the handle's store is
    /// resident. Does not affect recency.
    pub fn contains(&self, handle: Handle, offset: u64) -> Result<bool> {
        let open = self
            .handles
            .get(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        let key = PageKey {
            store: open.id,
            offset: self.align_down(offset),
        };
        Ok(self.pages.contains(&key))
    }

    pub fn cursor(&self, handle: Handle) -> Result<u64> {
        self.handles
            .get(handle)
            .map(|open| open.cursor)
            .ok_or(Error::InvalidHandle(handle))
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.pages.cap().get()
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn intern(&mut self, name: &Path) -> StoreId {
        if let Some(id) = self.stores.get(name) {
            return *id;
        }
        let id = StoreId(self.stores.len() as u32);
        self.stores.insert(name.to_path_buf(), id);
        id
    }

    fn align_down(&self, pos: u64) -> u64 {
        pos - pos % self.block_size as u64
    }

    fn transfer(&mut self, handle: Handle, mut xfer: Transfer<'_>) -> Result<usize> {
        let open = self
            .handles
            .get(handle)
            .ok_or(Error::InvalidHandle(handle))?;
        let store = open.id;
        let mut pos = open.cursor;

        let len = xfer.len();
        let mut done = 0;
        let result = loop {
            if done == len {
                break Ok(done);
            }
            match self.transfer_block(handle, store, pos, done, &mut xfer) {
                Ok(chunk) => {
                    done += chunk;
                    pos += chunk as u64;
                }
                Err(e) => break Err(e),
            }
        };

        if let Some(open) = self.handles.get_mut(handle) {
            open.cursor = pos;
        }
        result
    }

    /// Moves the bytes of one block between the page and the caller's buffer.
    /// Returns the number of bytes moved.
    fn transfer_block(
        &mut self,
        handle: Handle,
        store: StoreId,
        pos: u64,
        done: usize,
        xfer: &mut Transfer<'_>,
    ) -> Result<usize> {
        let offset = self.align_down(pos);
        let in_block = (pos - offset) as usize;
        let chunk = (xfer.len() - done).min(self.block_size - in_block);
        if in_block + chunk > self.block_size {
            return Err(Error::InvalidRange {
                in_block,
                len: chunk,
                block_size: self.block_size,
            });
        }

        let key = PageKey { store, offset };
        self.stats.accesses += 1;

        if let Some(page) = self.pages.get_mut(&key) {
            self.stats.hits += 1;
            trace!(%store, offset, "hit");
            if xfer.apply(page, in_block, done, chunk) {
                self.dirty += 1;
            }
            return Ok(chunk);
        }

        self.stats.misses += 1;
        trace!(%store, offset, resident = self.pages.len(), "miss");

        let mut page = self.fetch(handle, offset)?;
        self.make_room()?;
        if xfer.apply(&mut page, in_block, done, chunk) {
            self.dirty += 1;
        }
        self.pages.put(key, page);
        Ok(chunk)
    }

    /// Reads the whole block at `offset`; bytes past the end of the store are zero.
    fn fetch(&mut self, handle: Handle, offset: u64) -> Result<Page> {
        let open = self
            .handles
            .get_mut(handle)
            .ok_or(Error::InvalidHandle(handle))?;

        let mut page = Page::zeroed(self.block_size);
        open.store
            .read_at(offset, &mut page.data)
            .map_err(|e| Error::io(IoOp::Fetch, offset, e))?;
        Ok(page)
    }

    /// Evicts the least-recently-used page if the cache is full.
    ///
    /// A dirty victim is persisted through a handle on its own store first.
    /// If that is impossible the victim stays resident and the error is
    /// returned, so no modification is ever dropped here.
    fn make_room(&mut self) -> Result<()> {
        if self.pages.len() < self.pages.cap().get() {
            return Ok(());
        }

        if self.dirty * 100 / self.pages.len() > 80 {
            warn!(
                dirty = self.dirty,
                resident = self.pages.len(),
                "high dirty ratio, consider flushing"
            );
        }

        let Some((&key, victim)) = self.pages.peek_lru() else {
            return Ok(());
        };

        if victim.dirty {
            let Some(open) = self.handles.find_store_mut(key.store) else {
                error!(
                    store = %key.store,
                    offset = key.offset,
                    "cannot evict dirty page: store has no open handle"
                );
                return Err(Error::StoreClosed {
                    store: key.store,
                    offset: key.offset,
                });
            };
            if let Err(e) = open.store.write_at(key.offset, &victim.data) {
                error!(store = %key.store, offset = key.offset, error = %e, "eviction write failed");
                return Err(Error::io(IoOp::Persist, key.offset, e));
            }
            self.stats.writebacks += 1;
            self.dirty -= 1;
        }

        self.pages.pop_lru();
        self.stats.evictions += 1;
        debug!(store = %key.store, offset = key.offset, "evicted");
        Ok(())
    }
}

impl<S> Drop for BlockCache<S> {
    fn drop(&mut self) {
        if self.dirty > 0 {
            warn!(dirty = self.dirty, "block cache dropped with unflushed pages");
        }
    }
}

impl<S> std::fmt::Debug for BlockCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("block_size", &self.block_size)
            .field("capacity", &self.pages.cap())
            .field("len", &self.pages.len())
            .field("open_handles", &self.handles.len())
            .field("stats", &self.stats)
            .finish()
    }
}
