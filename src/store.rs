//! Backing stores: the block-addressed media a handle reads and writes through.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Positional block I/O used by the cache.
///
/// The cache only ever transfers whole, block-aligned buffers through
/// `read_at` and `write_at`.
pub trait BackingStore {
    /// Fills `buf` from `offset`, stopping early at end of store.
    /// Returns the number of bytes read; the remainder of `buf` is untouched.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Resolves a position. `SeekFrom::End` must reflect the store's real size.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Flushes the store's own buffers to durable media.
    fn sync(&mut self) -> io::Result<()>;
}

/// A regular file opened read/write.
#[derive(Debug)]
pub struct FileStore {
    file: File,
}

impl FileStore {
    /// Opens an existing file; never creates one.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self { file })
    }
}

impl BackingStore for FileStore {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut store = FileStore::open(&path).unwrap();
        let mut buf = [0xAAu8; 16];
        let n = store.read_at(4, &mut buf).unwrap();
        assert_eq!(n, 6);
        assert_eq!(&buf[..6], b"456789");
        assert_eq!(buf[6], 0xAA);

        assert_eq!(store.read_at(100, &mut buf).unwrap(), 0);
        assert_eq!(store.seek(SeekFrom::End(0)).unwrap(), 10);
    }

    #[test]
    fn test_open_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::open(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
