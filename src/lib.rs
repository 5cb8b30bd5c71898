//! A fixed-capacity, block-granular write-back cache over block-addressed
//! backing stores.
//!
//! Callers open a file to get a [`Handle`] and then read, write and seek
//! through the cache as they would through the file itself. Sub-block
//! accesses become whole-block transfers, recently used blocks stay
//! resident, and modified blocks are persisted only on eviction or on an
//! explicit [`BlockCache::flush`].
//!
//! ```no_run
//! use std::io::SeekFrom;
//! use wb_cache::BlockCache;
//!
//! fn main() -> wb_cache::Result<()> {
//!     let mut cache = BlockCache::new(4096, 16)?;
//!     let fd = cache.open("data.bin")?;
//!
//!     cache.write(fd, b"Hello!")?;
//!     cache.seek(fd, SeekFrom::Start(0))?;
//!     let mut buf = [0u8; 6];
//!     cache.read(fd, &mut buf)?;
//!
//!     cache.flush(fd)?;
//!     cache.close(fd)
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod page;
pub mod search;
pub mod store;

pub use cache::{BlockCache, CacheStats};
pub use config::CacheConfig;
pub use error::{Error, ErrorKind, IoOp, Result};
pub use handle::Handle;
pub use page::StoreId;
pub use search::{search_file, search_file_direct, SearchOutcome, PREFIX_LEN};
pub use store::{BackingStore, FileStore};
