//! Filesystem error kinds and their errno mapping.

use thiserror::Error;

/// Outcome classification for every filesystem operation.
///
/// Each operation either succeeds or yields exactly one of these kinds;
/// the FUSE adapter turns the kind into the errno it replies with. Store
/// failures of any shape (failed step, failed blob open, failed blob I/O)
/// collapse into [`FsError::Io`]; the message is kept for the log and never
/// surfaced to the caller.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("file exists")]
    Exists,

    #[error("is a directory")]
    IsDirectory,

    #[error("not a directory")]
    NotADirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for FsError {
    fn from(err: rusqlite::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(err.to_string())
    }
}

impl FsError {
    /// The positive errno for this error; `fuser` negates it on the wire.
    ///
    /// Non-empty maps to EPERM rather than ENOTEMPTY, matching the on-disk
    /// format's original tooling.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Exists => libc::EEXIST,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::NotEmpty => libc::EPERM,
            FsError::Io(_) => libc::EIO,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
