use crate::error::{Error, Result};

pub const DEFAULT_BLOCK_SIZE: usize = 4096;
pub const MIN_BLOCK_SIZE: usize = 512;
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024; // 1MiB
pub const DEFAULT_MAX_CACHE_SIZE: usize = 16;
pub const MAX_MAX_CACHE_SIZE: usize = 1 << 20;

/// Geometry of a [`BlockCache`](crate::BlockCache), fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Bytes per cached block; every backing-store transfer is one whole,
    /// aligned block.
    pub block_size: usize,
    /// Maximum number of resident pages across all handles.
    pub max_cache_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn new(block_size: usize, max_cache_size: usize) -> Self {
        Self {
            block_size,
            max_cache_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidConfig(
                "block size must be between 512 bytes and 1MiB",
            ));
        }
        if !self.block_size.is_power_of_two() {
            return Err(Error::InvalidConfig("block size must be a power of two"));
        }
        if self.max_cache_size == 0 || self.max_cache_size > MAX_MAX_CACHE_SIZE {
            return Err(Error::InvalidConfig(
                "max cache size must be between 1 and 1048576 pages",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_is_valid() {
        let config = CacheConfig::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.max_cache_size, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_block_size() {
        for block_size in [0, 256, 3000, 2 * MAX_BLOCK_SIZE, usize::MAX] {
            let err = CacheConfig::new(block_size, 16).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_rejects_bad_page_count() {
        assert!(CacheConfig::new(4096, 0).validate().is_err());
        assert!(CacheConfig::new(4096, MAX_MAX_CACHE_SIZE + 1)
            .validate()
            .is_err());
        assert!(CacheConfig::new(4096, 1).validate().is_ok());
    }
}
