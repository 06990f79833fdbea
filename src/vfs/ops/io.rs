//! Byte-range I/O.
//!
//! Reads address the file row directly through the handle the open upcall
//! resolved. Writes re-resolve the path each call because the size decides
//! the strategy: overwrites inside the current content go through the
//! in-place blob cursor, anything that grows the file rewrites the row.

use tracing::debug;

use super::SqlFs;
use crate::vfs::error::{FsError, FsResult};

impl SqlFs {
    /// Resolve a path for byte I/O. The returned file id is the read
    /// handle; subsequent reads address the files row directly.
    pub fn open(&self, path: &str) -> FsResult<i64> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if info.is_dir() {
            return Err(FsError::IsDirectory);
        }
        Ok(info.file_id)
    }

    /// Read up to `len` bytes at `offset`. Returns fewer bytes at EOF and
    /// none at or past it.
    pub fn read(&self, file_id: i64, offset: u64, len: usize) -> FsResult<Vec<u8>> {
        // Empty content is a NULL blob; no cursor can open on it.
        if self.store.file_size(file_id)? == 0 {
            return Ok(Vec::new());
        }
        self.store.read_blob(file_id, offset, len)
    }

    /// Write `data` at `offset`, growing the file if needed. Returns the
    /// number of bytes written, always `data.len()` on success.
    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if data.is_empty() {
            return Ok(0);
        }

        let end = offset + data.len() as u64;
        if end <= info.size {
            self.store.write_blob(info.file_id, offset, data)?;
        } else {
            debug!("write {path}: grow to {end} bytes");
            self.store.write_row(&info, offset, data)?;
        }
        Ok(data.len())
    }
}
