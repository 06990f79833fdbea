//! SQLFS - a POSIX filesystem stored in a single SQLite database.
//!
//! The directory tree, file metadata, file contents, and symbolic links all
//! live as rows in one database file. Mount it somewhere and every process
//! sees an ordinary filesystem; every change flows through the database.

pub mod vfs;
