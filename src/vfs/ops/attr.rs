//! Attribute operations: stat, chmod, chown, utimens, truncate.

use super::{unix_now, SqlFs};
use crate::vfs::error::{FsError, FsResult};
use crate::vfs::types::FileStat;

impl SqlFs {
    /// Stat one path. The implicit root gets a synthesized directory stat
    /// with the mounting process's identity and the current time.
    pub fn getattr(&self, path: &str) -> FsResult<FileStat> {
        if path == "/" {
            let now = unix_now();
            return Ok(FileStat {
                uid: unsafe { libc::getuid() },
                gid: unsafe { libc::getgid() },
                mode: libc::S_IFDIR as u32 | 0o755,
                atime: now,
                mtime: now,
                ctime: now,
                size: 0,
                nlink: 2,
            });
        }
        self.store.stat_by_path(path)?.ok_or(FsError::NotFound)
    }

    /// Replace the permission bits, keeping the file-type bits intact.
    pub fn chmod(&mut self, path: &str, mode: u32) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        let new_mode = (info.mode & libc::S_IFMT as u32) | (mode & 0o7777);
        self.store.set_mode(info.id, new_mode)
    }

    pub fn chown(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        self.store.set_owner(info.id, uid, gid)
    }

    /// Set access and modification times, whole seconds.
    pub fn utimens(&mut self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        self.store.set_times(info.id, atime, mtime)
    }

    /// Shrink a file. Truncating to the current size or larger is a no-op.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        let info = self.store.path_info(path)?.ok_or(FsError::NotFound)?;
        if info.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.store.truncate_to(info.file_id, new_size)
    }
}
