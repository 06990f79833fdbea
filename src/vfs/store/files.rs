//! File rows: content blobs, link counts, and the two write strategies.
//!
//! In-place writes go through an incremental blob cursor and never rewrite
//! the row; grow-writes materialize the whole new content because a blob
//! cursor cannot extend a blob. Empty content is stored as NULL, and SQLite
//! refuses to open a blob cursor on NULL, so callers short-circuit zero-size
//! reads and writes before reaching for a cursor.

use rusqlite::{params, DatabaseName};
use std::io::{Read, Seek, SeekFrom, Write};

use super::sql;
use super::Store;
use crate::vfs::error::FsResult;
use crate::vfs::types::PathInfo;

impl Store {
    /// Insert a new file row; nlink starts at 1. Empty content is NULL.
    /// Returns the new file id.
    pub fn insert_file(&self, content: Option<&[u8]>, dev: i64) -> FsResult<i64> {
        let size = content.map_or(0, <[u8]>::len) as i64;
        let mut stmt = self.conn.prepare_cached(sql::INSERT_FILE)?;
        stmt.execute(params![content, dev, size])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn read_nlink(&self, file_id: i64) -> FsResult<i64> {
        let mut stmt = self.conn.prepare_cached(sql::NLINK_BY_ID)?;
        let nlink = stmt.query_row(params![file_id], |row| row.get(0))?;
        Ok(nlink)
    }

    /// Current content length of a file row.
    pub fn file_size(&self, file_id: i64) -> FsResult<u64> {
        let mut stmt = self.conn.prepare_cached(sql::SIZE_BY_ID)?;
        let size: i64 = stmt.query_row(params![file_id], |row| row.get(0))?;
        Ok(size as u64)
    }

    pub fn inc_nlink(&self, file_id: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::INC_NLINK)?;
        stmt.execute(params![file_id])?;
        Ok(())
    }

    pub fn dec_nlink(&self, file_id: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::DEC_NLINK)?;
        stmt.execute(params![file_id])?;
        Ok(())
    }

    /// Remove a file row. The caller has already driven nlink to zero.
    pub fn delete_file(&self, file_id: i64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::DELETE_FILE)?;
        stmt.execute(params![file_id])?;
        Ok(())
    }

    /// Shrink-only truncate. Rewrites content and size together; truncating
    /// to the current size or larger changes nothing.
    pub fn truncate_to(&self, file_id: i64, new_size: u64) -> FsResult<()> {
        let mut stmt = self.conn.prepare_cached(sql::TRUNCATE_FILE)?;
        stmt.execute(params![file_id, new_size as i64])?;
        Ok(())
    }

    /// Read up to `len` bytes at `offset` through a read-only blob cursor.
    /// Clamps to the blob length; at or past EOF returns no bytes.
    pub fn read_blob(&self, file_id: i64, offset: u64, len: usize) -> FsResult<Vec<u8>> {
        let mut blob = self
            .conn
            .blob_open(DatabaseName::Main, "files", "content", file_id, true)?;
        let size = blob.size() as u64;
        if offset >= size {
            return Ok(Vec::new());
        }
        let want = len.min((size - offset) as usize);
        let mut buf = vec![0u8; want];
        blob.seek(SeekFrom::Start(offset))?;
        blob.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite `data.len()` bytes at `offset` in place. The cursor cannot
    /// grow the blob; callers take [`Store::write_row`] for that.
    pub fn write_blob(&self, file_id: i64, offset: u64, data: &[u8]) -> FsResult<()> {
        let mut blob = self
            .conn
            .blob_open(DatabaseName::Main, "files", "content", file_id, false)?;
        blob.seek(SeekFrom::Start(offset))?;
        blob.write_all(data)?;
        Ok(())
    }

    /// Grow-write: materialize `offset + len` bytes of content, keeping the
    /// old prefix and zero-filling any gap between the old size and the
    /// write offset, then swap content and size in one statement.
    pub fn write_row(&self, info: &PathInfo, offset: u64, data: &[u8]) -> FsResult<()> {
        let new_len = offset as usize + data.len();
        let mut buf = vec![0u8; new_len];
        if info.size > 0 {
            if let Some(old) = self.content_by_id(info.file_id)? {
                let keep = old.len().min(new_len);
                buf[..keep].copy_from_slice(&old[..keep]);
            }
        }
        buf[offset as usize..new_len].copy_from_slice(data);

        let mut stmt = self.conn.prepare_cached(sql::SET_CONTENT)?;
        stmt.execute(params![info.file_id, buf, new_len as i64])?;
        Ok(())
    }

    fn content_by_id(&self, file_id: i64) -> FsResult<Option<Vec<u8>>> {
        let mut stmt = self.conn.prepare_cached(sql::CONTENT_BY_ID)?;
        let content = stmt.query_row(params![file_id], |row| row.get(0))?;
        Ok(content)
    }
}
