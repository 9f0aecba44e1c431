//! Error types shared by every layer of the COLA filesystem.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("FS: {0}")]
    Fs(#[from] FsError),
}

/// The taxonomy surfaced to the FUSE bridge.
///
/// Each variant maps to exactly one of the errno values the filesystem
/// facade is allowed to return (access denied, not found, already exists,
/// out of space, no memory).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// `checkPath` rejected the path: too long, leading `.`, or contains `~`.
    #[error("access denied")]
    AccessDenied,
    /// No entry with this name exists in the COLA index.
    #[error("not found")]
    NotFound,
    /// An entry with this name already exists in the COLA index.
    #[error("already exists")]
    AlreadyExists,
    /// The FAT has no free block, or every COLA run is populated.
    #[error("out of space")]
    OutOfSpace,
    /// Failed to acquire a byte-range view of the backing store.
    #[error("no memory")]
    NoMemory,
}

pub type Result<T> = core::result::Result<T, Error>;
