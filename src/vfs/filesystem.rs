//! FUSE upcall adapter.
//!
//! The kernel side is inode-based while the core is path-keyed, so this
//! layer owns the bridge: an inode↔path table with a monotonic inode
//! counter, plus file- and directory-handle tables. Core results map to
//! errno replies here; store failures have already collapsed to EIO.

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::{EBADF, ENOENT};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::raw::c_int;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use super::ops::{unix_now, SqlFs};
use super::types::{mode_is_dir, mode_is_symlink, parent_of, FileStat};

const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;

fn timestamp(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH
    }
}

fn as_file_type(mode: u32) -> FileType {
    if mode_is_dir(mode) {
        FileType::Directory
    } else if mode_is_symlink(mode) {
        FileType::Symlink
    } else {
        FileType::RegularFile
    }
}

/// SQLFS FUSE filesystem implementation.
pub struct SqlFuse {
    /// Path-keyed filesystem core
    fs: SqlFs,

    /// Inode to path mapping
    inode_map: HashMap<u64, String>,

    /// Path to inode mapping (reverse lookup)
    path_to_inode: HashMap<String, u64>,

    /// Next available inode number
    next_inode: u64,

    /// Open file handle to file-row id mapping
    file_handles: HashMap<u64, i64>,

    /// Open directory handle to directory-row id mapping
    dir_handles: HashMap<u64, i64>,

    /// Next available handle
    next_fh: u64,
}

impl SqlFuse {
    pub fn new(fs: SqlFs) -> Self {
        let mut inode_map = HashMap::new();
        let mut path_to_inode = HashMap::new();

        // The root is implicit in the store but fixed as inode 1 by FUSE.
        inode_map.insert(ROOT_INO, "/".to_string());
        path_to_inode.insert("/".to_string(), ROOT_INO);

        Self {
            fs,
            inode_map,
            path_to_inode,
            next_inode: ROOT_INO + 1,
            file_handles: HashMap::new(),
            dir_handles: HashMap::new(),
            next_fh: 1,
        }
    }

    /// Get or allocate an inode for a path
    fn get_or_create_inode(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.path_to_inode.get(path) {
            return ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.inode_map.insert(ino, path.to_string());
        self.path_to_inode.insert(path.to_string(), ino);
        ino
    }

    /// Get path from inode
    fn get_path(&self, ino: u64) -> Option<String> {
        self.inode_map.get(&ino).cloned()
    }

    /// Join a parent inode and a child name into a full path.
    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.get_path(parent)?;
        let name = name.to_str()?;
        if parent_path == "/" {
            Some(format!("/{name}"))
        } else {
            Some(format!("{parent_path}/{name}"))
        }
    }

    /// Drop the bridge entry for a removed name.
    fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.path_to_inode.remove(path) {
            self.inode_map.remove(&ino);
        }
    }

    /// Move bridge entries after a rename: the name itself plus, for a
    /// directory, everything underneath it.
    fn remap_renamed(&mut self, old_path: &str, new_path: &str) {
        if let Some(ino) = self.path_to_inode.remove(old_path) {
            self.path_to_inode.insert(new_path.to_string(), ino);
            self.inode_map.insert(ino, new_path.to_string());
        }

        let prefix = format!("{old_path}/");
        let moved: Vec<(String, u64)> = self
            .path_to_inode
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, &ino)| (path.clone(), ino))
            .collect();
        for (path, ino) in moved {
            let renamed = format!("{new_path}{}", &path[old_path.len()..]);
            self.path_to_inode.remove(&path);
            self.path_to_inode.insert(renamed.clone(), ino);
            self.inode_map.insert(ino, renamed);
        }
    }

    fn take_fh(&mut self) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        fh
    }

    /// Build kernel file attributes from a stat record.
    fn make_attr(&self, ino: u64, stat: &FileStat) -> FileAttr {
        let mtime = timestamp(stat.mtime);
        FileAttr {
            ino,
            size: stat.size,
            blocks: (stat.size + 511) / 512,
            atime: timestamp(stat.atime),
            mtime,
            ctime: timestamp(stat.ctime),
            crtime: mtime,
            kind: as_file_type(stat.mode),
            perm: (stat.mode & 0o7777) as u16,
            nlink: stat.nlink,
            uid: stat.uid,
            gid: stat.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }

    /// Stat a path and reply with a directory entry for it.
    fn reply_entry(&mut self, path: &str, reply: ReplyEntry) {
        match self.fs.getattr(path) {
            Ok(stat) => {
                let ino = self.get_or_create_inode(path);
                let attr = self.make_attr(ino, &stat);
                reply.entry(&TTL, &attr, 0);
            }
            Err(err) => {
                error!("stat failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }
}

impl Filesystem for SqlFuse {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), c_int> {
        Ok(())
    }

    fn destroy(&mut self) {
        self.fs.shutdown();
        info!("filesystem shut down");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("lookup(parent={}, name={:?})", parent, name);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.getattr(&path) {
            Ok(stat) => {
                let ino = self.get_or_create_inode(&path);
                let attr = self.make_attr(ino, &stat);
                reply.entry(&TTL, &attr, 0);
            }
            Err(err) => {
                debug!("lookup miss for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        debug!("getattr(ino={})", ino);

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.getattr(&path) {
            Ok(stat) => {
                let attr = self.make_attr(ino, &stat);
                reply.attr(&TTL, &attr);
            }
            Err(err) => {
                error!("getattr failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("setattr(ino={ino}, mode={mode:?}, uid={uid:?}, gid={gid:?}, size={size:?})");

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        let current = match self.fs.getattr(&path) {
            Ok(stat) => stat,
            Err(err) => {
                reply.error(err.errno());
                return;
            }
        };

        if let Some(mode) = mode {
            if let Err(err) = self.fs.chmod(&path, mode) {
                warn!("chmod failed for {path}: {err}");
                reply.error(err.errno());
                return;
            }
        }

        if uid.is_some() || gid.is_some() {
            let uid = uid.unwrap_or(current.uid);
            let gid = gid.unwrap_or(current.gid);
            if let Err(err) = self.fs.chown(&path, uid, gid) {
                warn!("chown failed for {path}: {err}");
                reply.error(err.errno());
                return;
            }
        }

        if let Some(size) = size {
            if let Err(err) = self.fs.truncate(&path, size) {
                warn!("truncate failed for {path}: {err}");
                reply.error(err.errno());
                return;
            }
        }

        if atime.is_some() || mtime.is_some() {
            let to_secs = |t: TimeOrNow, fallback: i64| match t {
                TimeOrNow::SpecificTime(when) => when
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(fallback),
                TimeOrNow::Now => unix_now(),
            };
            let atime = atime.map_or(current.atime, |t| to_secs(t, current.atime));
            let mtime = mtime.map_or(current.mtime, |t| to_secs(t, current.mtime));
            if let Err(err) = self.fs.utimens(&path, atime, mtime) {
                warn!("utimens failed for {path}: {err}");
                reply.error(err.errno());
                return;
            }
        }

        match self.fs.getattr(&path) {
            Ok(stat) => {
                let attr = self.make_attr(ino, &stat);
                reply.attr(&TTL, &attr);
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        debug!("readlink(ino={})", ino);

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.readlink(&path, libc::PATH_MAX as usize) {
            Ok(target) => {
                // The stored target carries its NUL; the kernel wants the
                // bare bytes.
                let end = target.iter().position(|&b| b == 0).unwrap_or(target.len());
                reply.data(&target[..end]);
            }
            Err(err) => {
                error!("readlink failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn mknod(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        debug!("mknod(parent={}, name={:?}, mode={:o})", parent, name, mode);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        if let Err(err) = self.fs.mknod(&path, mode, i64::from(rdev), req.uid(), req.gid()) {
            warn!("mknod failed for {path}: {err}");
            reply.error(err.errno());
            return;
        }
        self.reply_entry(&path, reply);
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("mkdir(parent={}, name={:?}, mode={:o})", parent, name, mode);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        if let Err(err) = self.fs.mkdir(&path, mode, req.uid(), req.gid()) {
            warn!("mkdir failed for {path}: {err}");
            reply.error(err.errno());
            return;
        }
        self.reply_entry(&path, reply);
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("unlink(parent={}, name={:?})", parent, name);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.unlink(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(err) => {
                warn!("unlink failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("rmdir(parent={}, name={:?})", parent, name);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(err) => {
                warn!("rmdir failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn symlink(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        link: &std::path::Path,
        reply: ReplyEntry,
    ) {
        debug!("symlink(parent={}, name={:?}, target={:?})", parent, name, link);

        let path = match self.child_path(parent, name) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let target = match link.to_str() {
            Some(t) => t,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        if let Err(err) = self.fs.symlink(target, &path, req.uid(), req.gid()) {
            warn!("symlink failed for {path}: {err}");
            reply.error(err.errno());
            return;
        }
        self.reply_entry(&path, reply);
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!("rename(parent={}, name={:?}, newparent={}, newname={:?})", parent, name, newparent, newname);

        let (old_path, new_path) = match (
            self.child_path(parent, name),
            self.child_path(newparent, newname),
        ) {
            (Some(old), Some(new)) => (old, new),
            _ => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.rename(&old_path, &new_path, flags) {
            Ok(()) => {
                self.forget_path(&new_path);
                self.remap_renamed(&old_path, &new_path);
                reply.ok();
            }
            Err(err) => {
                warn!("rename {old_path} -> {new_path} failed: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn link(
        &mut self,
        req: &Request,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        debug!("link(ino={}, newparent={}, newname={:?})", ino, newparent, newname);

        let old_path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        let new_path = match self.child_path(newparent, newname) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        if let Err(err) = self.fs.link(&old_path, &new_path, req.uid(), req.gid()) {
            warn!("link {old_path} -> {new_path} failed: {err}");
            reply.error(err.errno());
            return;
        }
        self.reply_entry(&new_path, reply);
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("open(ino={})", ino);

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.open(&path) {
            Ok(file_id) => {
                let fh = self.take_fh();
                self.file_handles.insert(fh, file_id);
                reply.opened(fh, 0);
            }
            Err(err) => {
                warn!("open failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("read(ino={}, fh={}, offset={}, size={})", ino, fh, offset, size);

        let file_id = match self.file_handles.get(&fh) {
            Some(&id) => id,
            None => {
                reply.error(EBADF);
                return;
            }
        };

        match self.fs.read(file_id, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(err) => {
                error!("read failed for file {file_id}: {err}");
                reply.error(err.errno());
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("write(ino={}, fh={}, offset={}, len={})", ino, fh, offset, data.len());

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.write(&path, offset.max(0) as u64, data) {
            Ok(written) => reply.written(written as u32),
            Err(err) => {
                error!("write failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn flush(&mut self, _req: &Request, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.file_handles.remove(&fh);
        reply.ok();
    }

    fn fsync(&mut self, _req: &Request, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        // Durability is the store's write-ahead log.
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        debug!("opendir(ino={})", ino);

        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        match self.fs.opendir(&path) {
            Ok(dir_id) => {
                let fh = self.take_fh();
                self.dir_handles.insert(fh, dir_id);
                reply.opened(fh, 0);
            }
            Err(err) => {
                warn!("opendir failed for {path}: {err}");
                reply.error(err.errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("readdir(ino={}, fh={}, offset={})", ino, fh, offset);

        let dir_id = match self.dir_handles.get(&fh) {
            Some(&id) => id,
            None => {
                reply.error(EBADF);
                return;
            }
        };
        let path = match self.get_path(ino) {
            Some(p) => p,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        if offset == 0 && reply.add(ino, 1, FileType::Directory, ".") {
            reply.ok();
            return;
        }
        if offset <= 1 {
            let parent_path = parent_of(&path).to_string();
            let parent_ino = self.get_or_create_inode(&parent_path);
            if reply.add(parent_ino, 2, FileType::Directory, "..") {
                reply.ok();
                return;
            }
        }

        let skip = (offset - 2).max(0);
        let entries = match self.fs.readdir(dir_id, skip) {
            Ok(entries) => entries,
            Err(err) => {
                error!("readdir failed for {path}: {err}");
                reply.error(err.errno());
                return;
            }
        };

        for (i, entry) in entries.iter().enumerate() {
            let entry_ino = self.get_or_create_inode(&entry.path);
            let next_offset = 2 + skip + i as i64 + 1;
            if reply.add(entry_ino, next_offset, as_file_type(entry.mode), entry.name()) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.dir_handles.remove(&fh);
        reply.ok();
    }
}
