//! Path index: lookups keyed by the full path string, plus the path-row
//! mutators the operation layer composes.
//!
//! The namespace stores one row per name with its absolute path as a unique
//! key. Directory membership is decided by `parent_id`, so path equality is
//! the only lookup predicate; nothing ever prefix-scans except the rename
//! rewrite of a directory's descendants.

use rusqlite::{params, OptionalExtension, Row};

use super::sql;
use super::Store;
use crate::vfs::error::FsResult;
use crate::vfs::types::{DirEntry, FileStat, PathInfo, ROOT_PATH_ID};

fn stat_from_row(row: &Row, first: usize) -> rusqlite::Result<FileStat> {
    Ok(FileStat {
        uid: row.get(first)?,
        gid: row.get(first + 1)?,
        mode: row.get::<_, i64>(first + 2)? as u32,
        atime: row.get(first + 3)?,
        mtime: row.get(first + 4)?,
        ctime: row.get(first + 5)?,
        size: row.get::<_, i64>(first + 6)? as u64,
        nlink: row.get::<_, i64>(first + 7)? as u32,
    })
}

impl Store {
    /// Resolve a path to its row id. `/` is implicit and resolves to 0.
    pub fn path_id(&self, path: &str) -> FsResult<Option<i64>> {
        if path == "/" {
            return Ok(Some(ROOT_PATH_ID));
        }
        let mut stmt = self.conn.prepare_cached(sql::PATH_ID_BY_PATH)?;
        let id = stmt
            .query_row(params![path], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Resolve a path to id, mode, file id, and joined file size.
    pub fn path_info(&self, path: &str) -> FsResult<Option<PathInfo>> {
        if path == "/" {
            return Ok(Some(PathInfo::root()));
        }
        let mut stmt = self.conn.prepare_cached(sql::PATH_INFO_BY_PATH)?;
        let info = stmt
            .query_row(params![path], |row| {
                Ok(PathInfo {
                    id: row.get(0)?,
                    mode: row.get::<_, i64>(1)? as u32,
                    file_id: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                })
            })
            .optional()?;
        Ok(info)
    }

    /// Full stat record for one path row. The caller synthesizes `/`.
    pub fn stat_by_path(&self, path: &str) -> FsResult<Option<FileStat>> {
        let mut stmt = self.conn.prepare_cached(sql::STAT_BY_PATH)?;
        let stat = stmt
            .query_row(params![path], |row| stat_from_row(row, 0))
            .optional()?;
        Ok(stat)
    }

    /// One page of children of a directory, starting at `offset` rows in.
    pub fn children(&self, parent_id: i64, offset: i64) -> FsResult<Vec<DirEntry>> {
        let mut stmt = self.conn.prepare_cached(sql::STATS_BY_PARENT_ID)?;
        let rows = stmt.query_map(params![parent_id, offset], |row| {
            Ok(DirEntry {
                id: row.get(0)?,
                path: row.get(1)?,
                mode: row.get::<_, i64>(2)? as u32,
                stat: FileStat {
                    uid: row.get(3)?,
                    gid: row.get(4)?,
                    mode: row.get::<_, i64>(2)? as u32,
                    atime: row.get(5)?,
                    mtime: row.get(6)?,
                    ctime: row.get(7)?,
                    size: row.get::<_, i64>(8)? as u64,
                    nlink: row.get::<_, i64>(9)? as u32,
                },
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn count_children(&self, parent_id: i64) -> FsResult<i64> {
        let mut stmt = self.conn.prepare_cached(sql::COUNT_CHILDREN)?;
        let n = stmt.query_row(params![parent_id], |row| row.get(0))?;
        Ok(n)
    }

    /// Insert a path row with atime = mtime = ctime = `now`. Returns the new
    /// row id.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_path(
        &self,
        path: &str,
        parent_id: i64,
        uid: u32,
        gid: u32,
        mode: u32,
        now: i64,
        file_id: i64,
    ) -> FsResult<i64> {
        let mut stmt = self.conn.prepare_cached(sql::INSERT_PATH)?;
        stmt.execute(params![path, parent_id, uid, gid, mode, now, now, now, file_id])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_path(&self, id: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::DELETE_PATH)?;
        stmt.execute(params![id])?;
        Ok(())
    }

    /// Re-key one row under a new path and parent.
    pub fn set_path(&self, id: i64, new_path: &str, new_parent_id: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::SET_PATH)?;
        stmt.execute(params![id, new_path, new_parent_id])?;
        Ok(())
    }

    /// Rewrite the path prefix of everything under a renamed directory.
    /// Returns the number of descendant rows moved.
    pub fn rewrite_descendants(&self, old_prefix: &str, new_prefix: &str) -> FsResult<usize> {
        let mut stmt = self.conn.prepare_cached(sql::SET_PATH_DESCENDANTS)?;
        let moved = stmt.execute(params![old_prefix, new_prefix])?;
        Ok(moved)
    }

    pub fn set_mode(&self, id: i64, mode: u32) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::SET_MODE)?;
        stmt.execute(params![id, mode])?;
        Ok(())
    }

    pub fn set_owner(&self, id: i64, uid: u32, gid: u32) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::SET_OWNER)?;
        stmt.execute(params![id, uid, gid])?;
        Ok(())
    }

    pub fn set_times(&self, id: i64, atime: i64, mtime: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::SET_TIMES)?;
        stmt.execute(params![id, atime, mtime])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn root_is_implicit() {
        let store = store();
        assert_eq!(store.path_id("/").unwrap(), Some(ROOT_PATH_ID));
        let info = store.path_info("/").unwrap().unwrap();
        assert_eq!(info.id, ROOT_PATH_ID);
        assert_eq!(info.file_id, 0);
        assert_eq!(info.size, 0);
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let store = store();
        assert!(store.path_id("/nope").unwrap().is_none());
        assert!(store.path_info("/nope").unwrap().is_none());
        assert!(store.stat_by_path("/nope").unwrap().is_none());
    }

    #[test]
    fn insert_then_lookup() {
        let store = store();
        let mode = libc::S_IFDIR as u32 | 0o755;
        let id = store.insert_path("/d", 0, 1000, 1000, mode, 42, 0).unwrap();
        assert!(id > 0);

        assert_eq!(store.path_id("/d").unwrap(), Some(id));
        let info = store.path_info("/d").unwrap().unwrap();
        assert_eq!(info.mode, mode);
        assert!(info.is_dir());

        let stat = store.stat_by_path("/d").unwrap().unwrap();
        assert_eq!(stat.uid, 1000);
        assert_eq!(stat.mtime, 42);
        // No file row joined: size falls back to 0, nlink to 1.
        assert_eq!(stat.size, 0);
        assert_eq!(stat.nlink, 1);
    }

    #[test]
    fn children_are_keyed_by_parent_id() {
        let store = store();
        let dir_mode = libc::S_IFDIR as u32 | 0o755;
        let file_mode = libc::S_IFREG as u32 | 0o644;
        let dir = store.insert_path("/d", 0, 0, 0, dir_mode, 1, 0).unwrap();
        store.insert_path("/d/a", dir, 0, 0, file_mode, 1, 0).unwrap();
        store.insert_path("/d/b", dir, 0, 0, file_mode, 1, 0).unwrap();
        // Similar path prefix but different parent must not show up.
        store.insert_path("/da", 0, 0, 0, file_mode, 1, 0).unwrap();

        let kids = store.children(dir, 0).unwrap();
        let names: Vec<_> = kids.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.count_children(dir).unwrap(), 2);

        let page = store.children(dir, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name(), "b");
    }

    #[test]
    fn duplicate_path_is_rejected_by_index() {
        let store = store();
        let mode = libc::S_IFREG as u32 | 0o644;
        store.insert_path("/x", 0, 0, 0, mode, 1, 0).unwrap();
        assert!(store.insert_path("/x", 0, 0, 0, mode, 1, 0).is_err());
    }

    #[test]
    fn descendant_rewrite_moves_only_the_subtree() {
        let store = store();
        let dir_mode = libc::S_IFDIR as u32 | 0o755;
        let file_mode = libc::S_IFREG as u32 | 0o644;
        let dir = store.insert_path("/old", 0, 0, 0, dir_mode, 1, 0).unwrap();
        let sub = store.insert_path("/old/sub", dir, 0, 0, dir_mode, 1, 0).unwrap();
        store.insert_path("/old/sub/f", sub, 0, 0, file_mode, 1, 0).unwrap();
        store.insert_path("/older", 0, 0, 0, file_mode, 1, 0).unwrap();

        let moved = store.rewrite_descendants("/old", "/new").unwrap();
        assert_eq!(moved, 2);
        assert!(store.path_id("/new/sub").unwrap().is_some());
        assert!(store.path_id("/new/sub/f").unwrap().is_some());
        // Prefix-similar sibling is untouched.
        assert!(store.path_id("/older").unwrap().is_some());
    }
}
