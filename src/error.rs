//! Error types for cache operations.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::handle::Handle;
use crate::page::StoreId;

/// Coarse error category, for callers that only care about the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The handle is unknown or already closed.
    InvalidHandle,
    /// The backing store could not be opened.
    BackingStoreOpenFailure,
    /// Fetching or persisting a block failed.
    BackingStoreIOFailure,
    /// An in-block range would overrun the block.
    InvalidRange,
    /// A dirty page belongs to a store that has no open handle.
    StoreClosed,
    /// Bad argument or configuration.
    InvalidInput,
}

/// Which backing-store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Fetch,
    Persist,
    Seek,
    Sync,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IoOp::Fetch => "fetch",
            IoOp::Persist => "persist",
            IoOp::Seek => "seek",
            IoOp::Sync => "sync",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    InvalidHandle(Handle),
    Open {
        path: PathBuf,
        source: io::Error,
    },
    Io {
        op: IoOp,
        offset: u64,
        source: io::Error,
    },
    InvalidRange {
        in_block: usize,
        len: usize,
        block_size: usize,
    },
    /// Eviction needed to persist a dirty page, but its store is not open.
    /// The page is kept; reopen the store and flush, or discard orphans.
    StoreClosed {
        store: StoreId,
        offset: u64,
    },
    InvalidSeek {
        cursor: u64,
        delta: i64,
    },
    InvalidConfig(&'static str),
    Walk {
        path: PathBuf,
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Error::Open { .. } => ErrorKind::BackingStoreOpenFailure,
            Error::Io { .. } | Error::Walk { .. } => ErrorKind::BackingStoreIOFailure,
            Error::InvalidRange { .. } => ErrorKind::InvalidRange,
            Error::StoreClosed { .. } => ErrorKind::StoreClosed,
            Error::InvalidSeek { .. } | Error::InvalidConfig(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn io(op: IoOp, offset: u64, source: io::Error) -> Self {
        Error::Io { op, offset, source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(handle) => write!(f, "invalid handle {}", handle),
            Error::Open { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
            Error::Io { op, offset, source } => {
                write!(f, "{} of block at {:#x} failed: {}", op, offset, source)
            }
            Error::InvalidRange {
                in_block,
                len,
                block_size,
            } => write!(
                f,
                "range {}..{} exceeds block size {}",
                in_block,
                in_block + len,
                block_size
            ),
            Error::StoreClosed { store, offset } => write!(
                f,
                "dirty block at {:#x} belongs to {}, which has no open handle",
                offset, store
            ),
            Error::InvalidSeek { cursor, delta } => {
                write!(f, "seek by {} from {} lands before start", delta, cursor)
            }
            Error::InvalidConfig(msg) => write!(f, "invalid cache config: {}", msg),
            Error::Walk { path, source } => {
                write!(f, "cannot walk {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { source, .. } | Error::Io { source, .. } | Error::Walk { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = Error::io(IoOp::Persist, 4096, io::Error::other("disk gone"));
        assert_eq!(err.kind(), ErrorKind::BackingStoreIOFailure);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            err.to_string(),
            "persist of block at 0x1000 failed: disk gone"
        );

        let err = Error::InvalidConfig("block size must be a power of two");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(std::error::Error::source(&err).is_none());
    }
}
