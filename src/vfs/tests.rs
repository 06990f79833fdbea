//! SQLFS feature tests.
//!
//! One clear test per behavior, driving the path-keyed core against a real
//! (in-memory or temp-file) database. No kernel mount is needed; the FUSE
//! adapter is a thin bridge over these operations.
//!
//! | Category            | Description                                  |
//! |---------------------|----------------------------------------------|
//! | End-to-end          | create/write/read/stat, readdir, links, …    |
//! | Round-trip laws     | operations that must restore prior state     |
//! | Boundaries          | EOF clamps, truncate, error kinds            |
//! | Database invariants | audited directly against the backing store   |

use super::error::FsError;
use super::ops::SqlFs;
use super::store::Store;
use super::types::{mode_is_regular, mode_is_symlink};

const UID: u32 = 1000;
const GID: u32 = 1000;

fn fs() -> SqlFs {
    SqlFs::new(Store::open_in_memory().unwrap())
}

fn write_all(fs: &mut SqlFs, path: &str, offset: u64, data: &[u8]) {
    let written = fs.write(path, offset, data).unwrap();
    assert_eq!(written, data.len());
}

fn read_all(fs: &SqlFs, path: &str, offset: u64, len: usize) -> Vec<u8> {
    let file_id = fs.open(path).unwrap();
    fs.read(file_id, offset, len).unwrap()
}

/// Check the database-level invariants that must hold after every
/// operation: file references resolve, nlink matches the referencing rows,
/// size matches the blob length, paths are unique, parents exist.
fn audit(fs: &SqlFs) {
    let conn = &fs.store().conn;
    let count = |sql: &str| -> i64 { conn.query_row(sql, [], |row| row.get(0)).unwrap() };

    assert_eq!(
        count(
            "SELECT COUNT(*) FROM paths p WHERE p.file_id != 0
             AND NOT EXISTS (SELECT 1 FROM files f WHERE f.id = p.file_id)"
        ),
        0,
        "path row references a missing file row"
    );
    assert_eq!(
        count(
            "SELECT COUNT(*) FROM files f WHERE f.nlink !=
             (SELECT COUNT(*) FROM paths p WHERE p.file_id = f.id)"
        ),
        0,
        "nlink out of step with referencing path rows"
    );
    assert_eq!(
        count("SELECT COUNT(*) FROM files WHERE size != IFNULL(length(content), 0)"),
        0,
        "size disagrees with content length"
    );
    assert_eq!(
        count("SELECT COUNT(*) FROM (SELECT path FROM paths GROUP BY path HAVING COUNT(*) > 1)"),
        0,
        "duplicate path"
    );
    assert_eq!(
        count(
            "SELECT COUNT(*) FROM paths p WHERE p.parent_id != 0
             AND NOT EXISTS (SELECT 1 FROM paths q WHERE q.id = p.parent_id)"
        ),
        0,
        "dangling parent_id"
    );
}

fn file_row_count(fs: &SqlFs) -> i64 {
    fs.store()
        .conn
        .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .unwrap()
}

// =========================================================================
// End-to-end scenarios
// =========================================================================

#[test]
fn create_write_read_stat() {
    let mut fs = fs();
    fs.mknod("/a", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/a", 0, b"hello");

    assert_eq!(read_all(&fs, "/a", 0, 5), b"hello");

    let stat = fs.getattr("/a").unwrap();
    assert_eq!(stat.size, 5);
    assert_eq!(stat.nlink, 1);
    assert_eq!(stat.uid, UID);
    assert!(mode_is_regular(stat.mode));
    assert_eq!(stat.mode & 0o7777, 0o644);
    audit(&fs);
}

#[test]
fn readdir_lists_children_by_name() {
    let mut fs = fs();
    fs.mkdir("/d", 0o755, UID, GID).unwrap();
    fs.mknod("/d/f", 0o644, 0, UID, GID).unwrap();

    let dir = fs.opendir("/d").unwrap();
    let entries = fs.readdir(dir, 0).unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, vec!["f"]);

    // Root enumerates through the same parent-id predicate, handle 0.
    let root = fs.opendir("/").unwrap();
    let entries = fs.readdir(root, 0).unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, vec!["d"]);
}

#[test]
fn hard_link_lifecycle() {
    let mut fs = fs();
    fs.mknod("/x", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/x", 0, b"shared");
    fs.link("/x", "/y", UID, GID).unwrap();

    assert_eq!(fs.getattr("/x").unwrap().nlink, 2);
    assert_eq!(fs.getattr("/y").unwrap().nlink, 2);
    audit(&fs);

    fs.unlink("/x").unwrap();
    let stat = fs.getattr("/y").unwrap();
    assert_eq!(stat.nlink, 1);
    assert_eq!(read_all(&fs, "/y", 0, 16), b"shared");
    assert!(matches!(fs.getattr("/x"), Err(FsError::NotFound)));

    fs.unlink("/y").unwrap();
    assert_eq!(file_row_count(&fs), 0, "file row must go with its last link");
    audit(&fs);
}

#[test]
fn symlink_stores_nul_terminated_target() {
    let mut fs = fs();
    fs.symlink("/tmp/foo", "/s", UID, GID).unwrap();

    assert_eq!(fs.readlink("/s", 4096).unwrap(), b"/tmp/foo\0");

    let stat = fs.getattr("/s").unwrap();
    assert!(mode_is_symlink(stat.mode));
    assert_eq!(stat.size, 9);
    audit(&fs);
}

#[test]
fn overwrite_within_content_is_in_place() {
    let mut fs = fs();
    fs.mknod("/big", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/big", 0, &[b'a'; 1000]);
    // 510 <= 1000: the in-place path.
    write_all(&mut fs, "/big", 500, &[b'B'; 10]);

    let bytes = read_all(&fs, "/big", 0, 1000);
    assert_eq!(bytes.len(), 1000);
    assert!(bytes[..500].iter().all(|&b| b == b'a'));
    assert!(bytes[500..510].iter().all(|&b| b == b'B'));
    assert!(bytes[510..].iter().all(|&b| b == b'a'));
    assert_eq!(fs.getattr("/big").unwrap().size, 1000);
    audit(&fs);
}

#[test]
fn grow_write_zero_fills_the_gap() {
    let mut fs = fs();
    fs.mknod("/grow", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/grow", 0, &[b'x'; 100]);
    // 250 > 100: the grow path.
    write_all(&mut fs, "/grow", 200, &[b'y'; 50]);

    assert_eq!(fs.getattr("/grow").unwrap().size, 250);
    let bytes = read_all(&fs, "/grow", 0, 250);
    assert!(bytes[..100].iter().all(|&b| b == b'x'));
    assert!(bytes[100..200].iter().all(|&b| b == 0));
    assert!(bytes[200..].iter().all(|&b| b == b'y'));
    audit(&fs);
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("fs.db");

    {
        let mut fs = SqlFs::new(Store::open(&db).unwrap());
        fs.mkdir("/docs", 0o755, UID, GID).unwrap();
        fs.mknod("/docs/note", 0o644, 0, UID, GID).unwrap();
        write_all(&mut fs, "/docs/note", 0, b"persisted");
        fs.shutdown();
    }

    let fs = SqlFs::new(Store::open(&db).unwrap());
    assert_eq!(read_all(&fs, "/docs/note", 0, 64), b"persisted");
    assert_eq!(fs.getattr("/docs/note").unwrap().size, 9);
}

// =========================================================================
// Round-trip laws
// =========================================================================

#[test]
fn rename_there_and_back_restores_state() {
    let mut fs = fs();
    fs.mknod("/p", 0o640, 0, UID, GID).unwrap();
    write_all(&mut fs, "/p", 0, b"payload");
    let before = fs.getattr("/p").unwrap();

    fs.rename("/p", "/q", 0).unwrap();
    assert!(matches!(fs.getattr("/p"), Err(FsError::NotFound)));
    fs.rename("/q", "/p", 0).unwrap();

    let after = fs.getattr("/p").unwrap();
    assert_eq!(after.mode, before.mode);
    assert_eq!(after.size, before.size);
    assert_eq!(read_all(&fs, "/p", 0, 16), b"payload");
    audit(&fs);
}

#[test]
fn rename_directory_carries_its_subtree() {
    let mut fs = fs();
    fs.mkdir("/d", 0o755, UID, GID).unwrap();
    fs.mkdir("/d/sub", 0o755, UID, GID).unwrap();
    fs.mknod("/d/sub/f", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/d/sub/f", 0, b"deep");

    fs.rename("/d", "/e", 0).unwrap();

    assert!(matches!(fs.getattr("/d/sub/f"), Err(FsError::NotFound)));
    assert_eq!(read_all(&fs, "/e/sub/f", 0, 8), b"deep");
    audit(&fs);
}

#[test]
fn rename_over_file_releases_the_target() {
    let mut fs = fs();
    fs.mknod("/src", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/src", 0, b"keep");
    fs.mknod("/dst", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/dst", 0, b"toss");

    fs.rename("/src", "/dst", 0).unwrap();

    assert_eq!(read_all(&fs, "/dst", 0, 8), b"keep");
    assert_eq!(file_row_count(&fs), 1, "replaced target's file row must be gone");
    audit(&fs);
}

// =========================================================================
// Boundaries and error kinds
// =========================================================================

#[test]
fn read_clamps_at_eof() {
    let mut fs = fs();
    fs.mknod("/f", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/f", 0, b"0123456789");

    assert!(read_all(&fs, "/f", 10, 4).is_empty());
    assert!(read_all(&fs, "/f", 99, 4).is_empty());
    assert_eq!(read_all(&fs, "/f", 7, 100), b"789");
}

#[test]
fn read_of_empty_file_is_empty() {
    let mut fs = fs();
    fs.mknod("/empty", 0o644, 0, UID, GID).unwrap();
    assert!(read_all(&fs, "/empty", 0, 4096).is_empty());
}

#[test]
fn truncate_shrinks_but_never_grows() {
    let mut fs = fs();
    fs.mknod("/t", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/t", 0, b"0123456789");

    fs.truncate("/t", 1000).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 10);

    fs.truncate("/t", 4).unwrap();
    assert_eq!(fs.getattr("/t").unwrap().size, 4);
    assert_eq!(read_all(&fs, "/t", 0, 100), b"0123");
    audit(&fs);
}

#[test]
fn write_after_truncate_to_zero() {
    let mut fs = fs();
    fs.mknod("/w", 0o644, 0, UID, GID).unwrap();
    write_all(&mut fs, "/w", 0, b"old content");
    fs.truncate("/w", 0).unwrap();
    write_all(&mut fs, "/w", 0, b"new");
    assert_eq!(read_all(&fs, "/w", 0, 64), b"new");
    audit(&fs);
}

#[test]
fn error_kinds_for_misdirected_operations() {
    let mut fs = fs();
    fs.mkdir("/d", 0o755, UID, GID).unwrap();
    fs.mknod("/d/f", 0o644, 0, UID, GID).unwrap();
    fs.mknod("/plain", 0o644, 0, UID, GID).unwrap();

    assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty)));
    assert!(matches!(fs.unlink("/d"), Err(FsError::IsDirectory)));
    assert!(matches!(fs.rmdir("/plain"), Err(FsError::NotADirectory)));
    assert!(matches!(fs.rename("/plain", "/d", 0), Err(FsError::IsDirectory)));
    assert!(matches!(fs.mknod("/plain", 0o644, 0, UID, GID), Err(FsError::Exists)));
    assert!(matches!(fs.mkdir("/d", 0o755, UID, GID), Err(FsError::Exists)));
    assert!(matches!(fs.mknod("/missing/f", 0o644, 0, UID, GID), Err(FsError::NotFound)));
    assert!(matches!(fs.unlink("/gone"), Err(FsError::NotFound)));
    assert!(matches!(fs.opendir("/plain"), Err(FsError::NotADirectory)));

    // A failed rename-over must not have touched either name.
    assert!(fs.getattr("/plain").is_ok());
    assert!(fs.getattr("/d/f").is_ok());
    audit(&fs);
}

#[test]
fn rmdir_succeeds_once_empty() {
    let mut fs = fs();
    fs.mkdir("/d", 0o755, UID, GID).unwrap();
    fs.mknod("/d/f", 0o644, 0, UID, GID).unwrap();

    assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty)));
    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(matches!(fs.opendir("/d"), Err(FsError::NotFound)));
    audit(&fs);
}

// =========================================================================
// Attributes
// =========================================================================

#[test]
fn chmod_replaces_permission_bits() {
    let mut fs = fs();
    fs.mknod("/f", 0o644, 0, UID, GID).unwrap();
    fs.chmod("/f", 0o600).unwrap();

    let stat = fs.getattr("/f").unwrap();
    // An OR-merge would have left 0o644 here.
    assert_eq!(stat.mode & 0o7777, 0o600);
    assert!(mode_is_regular(stat.mode), "type bits must survive chmod");
}

#[test]
fn chown_sets_uid_then_gid() {
    let mut fs = fs();
    fs.mknod("/f", 0o644, 0, UID, GID).unwrap();
    fs.chown("/f", 123, 456).unwrap();

    let stat = fs.getattr("/f").unwrap();
    assert_eq!(stat.uid, 123);
    assert_eq!(stat.gid, 456);
}

#[test]
fn utimens_stores_whole_seconds() {
    let mut fs = fs();
    fs.mknod("/f", 0o644, 0, UID, GID).unwrap();
    fs.utimens("/f", 1_700_000_001, 1_700_000_002).unwrap();

    let stat = fs.getattr("/f").unwrap();
    assert_eq!(stat.atime, 1_700_000_001);
    assert_eq!(stat.mtime, 1_700_000_002);
}

#[test]
fn root_stat_is_synthesized() {
    let fs = fs();
    let stat = fs.getattr("/").unwrap();
    assert!(stat.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32);
    assert_eq!(stat.nlink, 2);
    assert_eq!(stat.size, 0);
}
