use std::fmt;

/// Interned identity of a backing store. Two handles on the same file share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u32);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Cache key: a block-aligned offset within one particular store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageKey {
    pub store: StoreId,
    pub offset: u64,
}

/// One resident block.
pub(crate) struct Page {
    pub data: Box<[u8]>,
    pub dirty: bool,
}

impl Page {
    pub fn zeroed(block_size: usize) -> Self {
        Self {
            data: vec![0; block_size].into_boxed_slice(),
            dirty: false,
        }
    }

    pub fn copy_out(&self, in_block: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.data[in_block..in_block + dst.len()]);
    }

    /// Overwrites part of the block and marks it dirty. Returns `true` if
    /// the page was clean before.
    pub fn copy_in(&mut self, in_block: usize, src: &[u8]) -> bool {
        self.data[in_block..in_block + src.len()].copy_from_slice(src);
        !std::mem::replace(&mut self.dirty, true)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("len", &self.data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_in_marks_dirty_and_keeps_rest() {
        let mut page = Page::zeroed(512);
        page.data.fill(7);
        assert!(!page.dirty);

        assert!(page.copy_in(10, b"abc"));
        assert!(page.dirty);
        assert!(!page.copy_in(20, b"d"));
        assert_eq!(&page.data[10..13], b"abc");
        assert_eq!(page.data[9], 7);
        assert_eq!(page.data[13], 7);

        let mut out = [0u8; 5];
        page.copy_out(9, &mut out);
        assert_eq!(&out, &[7, b'a', b'b', b'c', 7]);
    }
}
