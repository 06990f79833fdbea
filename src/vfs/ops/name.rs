//! Name operations: create, unlink, rename, hard-link, symlink, readlink.
//!
//! These are the multi-row mutations. Each runs inside a transaction so a
//! failed sub-step cannot leave a path row without its file row or a link
//! count out of step with the rows that reference it.

use tracing::debug;

use super::{unix_now, SqlFs};
use crate::vfs::error::{FsError, FsResult};
use crate::vfs::types::parent_of;

impl SqlFs {
    /// Create a regular file: an empty file row plus a path row naming it.
    pub fn mknod(&mut self, path: &str, mode: u32, dev: i64, uid: u32, gid: u32) -> FsResult<()> {
        if self.store.path_info(path)?.is_some() {
            return Err(FsError::Exists);
        }
        let parent_id = self
            .store
            .path_id(parent_of(path))?
            .ok_or(FsError::NotFound)?;

        let mode = libc::S_IFREG as u32 | (mode & 0o7777);
        let tx = self.store.conn.unchecked_transaction()?;
        let file_id = self.store.insert_file(None, dev)?;
        self.store
            .insert_path(path, parent_id, uid, gid, mode, unix_now(), file_id)?;
        tx.commit()?;

        debug!("mknod {path} mode={mode:o} file_id={file_id}");
        Ok(())
    }

    /// Remove a name. Drops the path row, decrements the file's link count,
    /// and deletes the file row once nothing references it.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if info.is_dir() {
            return Err(FsError::IsDirectory);
        }

        let tx = self.store.conn.unchecked_transaction()?;
        self.store.delete_path(info.id)?;
        self.store.dec_nlink(info.file_id)?;
        if self.store.read_nlink(info.file_id)? <= 0 {
            self.store.delete_file(info.file_id)?;
            debug!("unlink {path}: dropped file row {}", info.file_id);
        }
        tx.commit()?;
        Ok(())
    }

    /// Move a name. Replaces a non-directory target; a directory keeps its
    /// whole subtree reachable because every descendant path is rewritten
    /// in the same transaction.
    pub fn rename(&mut self, old_path: &str, new_path: &str, _flags: u32) -> FsResult<()> {
        if old_path == new_path {
            return Ok(());
        }
        let info = self.store.path_info(old_path)?.ok_or(FsError::NotFound)?;

        let tx = self.store.conn.unchecked_transaction()?;
        if let Some(target) = self.store.path_info(new_path)? {
            if target.is_dir() {
                return Err(FsError::IsDirectory);
            }
            self.store.delete_path(target.id)?;
            self.store.dec_nlink(target.file_id)?;
            if self.store.read_nlink(target.file_id)? <= 0 {
                self.store.delete_file(target.file_id)?;
            }
        }

        let new_parent_id = self
            .store
            .path_id(parent_of(new_path))?
            .ok_or(FsError::NotFound)?;
        self.store.set_path(info.id, new_path, new_parent_id)?;
        if info.is_dir() {
            let moved = self.store.rewrite_descendants(old_path, new_path)?;
            debug!("rename {old_path} -> {new_path}: moved {moved} descendants");
        }
        tx.commit()?;
        Ok(())
    }

    /// Add a hard link: a second path row naming the same file row.
    pub fn link(&mut self, old_path: &str, new_path: &str, uid: u32, gid: u32) -> FsResult<()> {
        if self.store.path_info(new_path)?.is_some() {
            return Err(FsError::Exists);
        }
        let info = self.store.path_info(old_path)?.ok_or(FsError::NotFound)?;
        let parent_id = self
            .store
            .path_id(parent_of(new_path))?
            .ok_or(FsError::NotFound)?;

        let tx = self.store.conn.unchecked_transaction()?;
        self.store
            .insert_path(new_path, parent_id, uid, gid, info.mode, unix_now(), info.file_id)?;
        self.store.inc_nlink(info.file_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Create a symlink. The target string is stored, NUL-terminated, as
    /// the content of a fresh file row.
    pub fn symlink(&mut self, target: &str, link_path: &str, uid: u32, gid: u32) -> FsResult<()> {
        if self.store.path_info(link_path)?.is_some() {
            return Err(FsError::Exists);
        }
        let parent_id = self
            .store
            .path_id(parent_of(link_path))?
            .ok_or(FsError::NotFound)?;

        let mut content = Vec::with_capacity(target.len() + 1);
        content.extend_from_slice(target.as_bytes());
        content.push(0);

        let mode = libc::S_IFLNK as u32 | 0o755;
        let tx = self.store.conn.unchecked_transaction()?;
        let file_id = self.store.insert_file(Some(&content), 0)?;
        self.store
            .insert_path(link_path, parent_id, uid, gid, mode, unix_now(), file_id)?;
        tx.commit()?;

        debug!("symlink {link_path} -> {target}");
        Ok(())
    }

    /// Read a symlink's stored target, up to `max` bytes, trailing NUL
    /// included.
    pub fn readlink(&self, path: &str, max: usize) -> FsResult<Vec<u8>> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if !info.is_symlink() {
            return Err(FsError::Io(format!("readlink on non-symlink {path}")));
        }
        if info.size == 0 {
            return Ok(Vec::new());
        }
        self.store.read_blob(info.file_id, 0, max)
    }
}
