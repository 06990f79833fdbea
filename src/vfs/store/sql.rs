//! SQL statement text.
//!
//! Every statement the store executes lives here as a named constant. The
//! statements are compiled once through the connection's prepared-statement
//! cache and reused for the lifetime of the mount.

/// Schema bootstrap, run once at open. Matches the on-disk format exactly;
/// databases created by other sqlfs builds stay compatible.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nlink INTEGER NOT NULL DEFAULT 1,
    content BLOB,
    dev INTEGER,
    size INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    parent_id INTEGER,
    uid INTEGER NOT NULL,
    gid INTEGER NOT NULL,
    mode INTEGER NOT NULL,
    atime INTEGER NOT NULL,
    mtime INTEGER NOT NULL,
    ctime INTEGER NOT NULL,
    file_id INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS path_idx ON paths(path);
CREATE INDEX IF NOT EXISTS file_id_idx ON paths(file_id);
";

// -- path index -------------------------------------------------------------

pub const PATH_ID_BY_PATH: &str = "SELECT id FROM paths WHERE path = ?1";

pub const PATH_INFO_BY_PATH: &str = "
SELECT p.id, p.mode, p.file_id, IFNULL(f.size, 0)
FROM paths p LEFT JOIN files f ON f.id = p.file_id
WHERE p.path = ?1";

pub const STAT_BY_PATH: &str = "
SELECT p.uid, p.gid, p.mode, p.atime, p.mtime, p.ctime,
       IFNULL(f.size, 0), IFNULL(f.nlink, 1)
FROM paths p LEFT JOIN files f ON f.id = p.file_id
WHERE p.path = ?1";

/// One page of a directory's children, with everything a readdir entry
/// needs. Membership is `parent_id` equality, never path-prefix matching.
pub const STATS_BY_PARENT_ID: &str = "
SELECT p.id, p.path, p.mode, p.uid, p.gid, p.atime, p.mtime, p.ctime,
       IFNULL(f.size, 0), IFNULL(f.nlink, 1)
FROM paths p LEFT JOIN files f ON f.id = p.file_id
WHERE p.parent_id = ?1
ORDER BY p.id
LIMIT -1 OFFSET ?2";

pub const COUNT_CHILDREN: &str = "SELECT COUNT(*) FROM paths WHERE parent_id = ?1";

// -- path rows --------------------------------------------------------------

pub const INSERT_PATH: &str = "
INSERT INTO paths (path, parent_id, uid, gid, mode, atime, mtime, ctime, file_id)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

pub const DELETE_PATH: &str = "DELETE FROM paths WHERE id = ?1";

pub const SET_PATH: &str = "UPDATE paths SET path = ?2, parent_id = ?3 WHERE id = ?1";

/// Prefix rewrite for every row under a renamed directory. The predicate is
/// spelled with `substr` so no LIKE wildcard in the old name can leak into
/// the match.
pub const SET_PATH_DESCENDANTS: &str = "
UPDATE paths SET path = ?2 || substr(path, length(?1) + 1)
WHERE substr(path, 1, length(?1) + 1) = ?1 || '/'";

pub const SET_MODE: &str = "UPDATE paths SET mode = ?2 WHERE id = ?1";

pub const SET_OWNER: &str = "UPDATE paths SET uid = ?2, gid = ?3 WHERE id = ?1";

pub const SET_TIMES: &str = "UPDATE paths SET atime = ?2, mtime = ?3 WHERE id = ?1";

// -- file rows --------------------------------------------------------------

pub const INSERT_FILE: &str = "INSERT INTO files (content, dev, size) VALUES (?1, ?2, ?3)";

pub const NLINK_BY_ID: &str = "SELECT nlink FROM files WHERE id = ?1";

pub const SIZE_BY_ID: &str = "SELECT size FROM files WHERE id = ?1";

pub const INC_NLINK: &str = "UPDATE files SET nlink = nlink + 1 WHERE id = ?1";

pub const DEC_NLINK: &str = "UPDATE files SET nlink = nlink - 1 WHERE id = ?1";

pub const DELETE_FILE: &str = "DELETE FROM files WHERE id = ?1";

pub const CONTENT_BY_ID: &str = "SELECT content FROM files WHERE id = ?1";

/// Shrink: rewrite the blob to its new length and the size with it, so
/// `size` never disagrees with `length(content)`. The `size > ?2` guard
/// makes truncate-to-larger a no-op.
pub const TRUNCATE_FILE: &str = "
UPDATE files SET content = substr(content, 1, ?2), size = ?2
WHERE id = ?1 AND size > ?2";

pub const SET_CONTENT: &str = "UPDATE files SET content = ?2, size = ?3 WHERE id = ?1";

/// Number of distinct statements above; sizes the connection's prepared
/// statement cache so none of them is ever evicted and recompiled.
pub const STATEMENT_COUNT: usize = 21;
