//! Find a file by name under a directory tree and read its first bytes,
//! either through a [`BlockCache`] or with plain file I/O.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::cache::BlockCache;
use crate::error::{Error, IoOp, Result};

/// Number of leading bytes read from a found file.
pub const PREFIX_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found { path: PathBuf, prefix: Vec<u8> },
    NotFound,
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

/// Walks `root` for a non-directory entry named `name` and reads its first
/// [`PREFIX_LEN`] bytes through `cache`. The cached read is zero-padded past
/// the end of the file.
pub fn search_file(
    cache: &mut BlockCache,
    root: impl AsRef<Path>,
    name: impl AsRef<OsStr>,
) -> Result<SearchOutcome> {
    let Some(path) = find(root.as_ref(), name.as_ref())? else {
        return Ok(SearchOutcome::NotFound);
    };
    info!(path = %path.display(), "file found");

    let handle = cache.open(&path)?;
    let mut prefix = vec![0u8; PREFIX_LEN];
    let read = cache.read(handle, &mut prefix);
    let closed = cache.close(handle);
    let n = read?;
    closed?;

    prefix.truncate(n);
    Ok(SearchOutcome::Found { path, prefix })
}

/// Like [`search_file`] but reads with `std::fs::File`, bypassing the cache.
/// The prefix stops at end of file; an empty file is an error.
pub fn search_file_direct(root: impl AsRef<Path>, name: impl AsRef<OsStr>) -> Result<SearchOutcome> {
    let Some(path) = find(root.as_ref(), name.as_ref())? else {
        return Ok(SearchOutcome::NotFound);
    };
    info!(path = %path.display(), "file found");

    let file = File::open(&path).map_err(|source| Error::Open {
        path: path.clone(),
        source,
    })?;
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| Error::io(IoOp::Fetch, 0, e))?;

    if prefix.is_empty() {
        return Err(Error::io(
            IoOp::Fetch,
            0,
            io::Error::new(io::ErrorKind::UnexpectedEof, "file is empty"),
        ));
    }
    Ok(SearchOutcome::Found { path, prefix })
}

/// Depth-first walk that does not follow symlinked directories. Directories
/// that are unreadable or vanish mid-walk are skipped.
fn find(root: &Path, name: &OsStr) -> Result<Option<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if skippable(&e) => {
                debug!(dir = %dir.display(), error = %e, "skipping directory");
                continue;
            }
            Err(source) => return Err(Error::Walk { path: dir, source }),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if skippable(&e) => continue,
                Err(source) => return Err(Error::Walk { path: dir, source }),
            };
            let is_dir = match entry.file_type() {
                Ok(file_type) => file_type.is_dir(),
                Err(e) if skippable(&e) => continue,
                Err(source) => {
                    return Err(Error::Walk {
                        path: entry.path(),
                        source,
                    })
                }
            };

            if is_dir {
                pending.push(entry.path());
            } else if entry.file_name() == name {
                return Ok(Some(entry.path()));
            }
        }
    }

    Ok(None)
}

fn skippable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(dir.path().join("c")).unwrap();
        fs::write(dir.path().join("c").join("other.txt"), b"nope").unwrap();
        fs::write(nested.join("target.txt"), b"Hello from the tree").unwrap();
        fs::write(dir.path().join("empty.txt"), b"").unwrap();
        dir
    }

    #[test]
    fn test_cached_search_finds_nested_file() {
        let dir = tree();
        let mut cache = BlockCache::new(4096, 16).unwrap();

        let outcome = search_file(&mut cache, dir.path(), "target.txt").unwrap();
        let SearchOutcome::Found { path, prefix } = outcome else {
            panic!("target.txt not found");
        };
        assert!(path.ends_with("a/b/target.txt"));
        assert_eq!(prefix.len(), PREFIX_LEN);
        assert_eq!(&prefix[..19], b"Hello from the tree");
        assert!(prefix[19..].iter().all(|&b| b == 0));

        assert_eq!(cache.open_handles(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_direct_search_truncates_at_eof() {
        let dir = tree();
        let outcome = search_file_direct(dir.path(), "target.txt").unwrap();
        let SearchOutcome::Found { prefix, .. } = outcome else {
            panic!("target.txt not found");
        };
        assert_eq!(prefix, b"Hello from the tree");
    }

    #[test]
    fn test_missing_file() {
        let dir = tree();
        let mut cache = BlockCache::new(4096, 16).unwrap();
        assert_eq!(
            search_file(&mut cache, dir.path(), "absent").unwrap(),
            SearchOutcome::NotFound
        );
        assert_eq!(
            search_file_direct(dir.path(), "absent").unwrap(),
            SearchOutcome::NotFound
        );
    }

    #[test]
    fn test_directories_are_not_matches() {
        let dir = tree();
        assert!(!search_file_direct(dir.path(), "b").unwrap().is_found());
    }

    #[test]
    fn test_direct_search_rejects_empty_file() {
        let dir = tree();
        assert!(search_file_direct(dir.path(), "empty.txt").is_err());
    }
}
