//! Directory operations: create, remove, open, enumerate.

use tracing::debug;

use super::{unix_now, SqlFs};
use crate::vfs::error::{FsError, FsResult};
use crate::vfs::types::{parent_of, DirEntry, ROOT_PATH_ID};

impl SqlFs {
    /// Create a directory. Directories carry no file row (`file_id` 0).
    pub fn mkdir(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> FsResult<()> {
        if self.store.path_info(path)?.is_some() {
            return Err(FsError::Exists);
        }
        let parent_id = self
            .store
            .path_id(parent_of(path))?
            .ok_or(FsError::NotFound)?;

        let mode = libc::S_IFDIR as u32 | (mode & 0o7777);
        self.store
            .insert_path(path, parent_id, uid, gid, mode, unix_now(), 0)?;
        debug!("mkdir {path} mode={mode:o}");
        Ok(())
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if !info.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if self.store.count_children(info.id)? > 0 {
            return Err(FsError::NotEmpty);
        }
        self.store.delete_path(info.id)?;
        Ok(())
    }

    /// Resolve a directory to the id used as its readdir handle.
    pub fn opendir(&self, path: &str) -> FsResult<i64> {
        if path == "/" {
            return Ok(ROOT_PATH_ID);
        }
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if !info.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(info.id)
    }

    /// One page of directory children starting `offset` entries in. The
    /// `.` and `..` entries are the adapter's to emit.
    pub fn readdir(&self, dir_id: i64, offset: i64) -> FsResult<Vec<DirEntry>> {
        self.store.children(dir_id, offset)
    }
}
