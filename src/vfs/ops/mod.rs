//! Path-keyed filesystem operations on top of the store.
//!
//! Every operation resolves its path arguments through the path index,
//! issues one or more prepared statements, and reports exactly one
//! [`FsError`](crate::vfs::error::FsError) kind on failure. Operations that
//! mutate more than one row run inside a transaction; a failed sub-step
//! rolls the whole operation back.

pub mod attr;
pub mod dir;
pub mod io;
pub mod name;

use std::time::{SystemTime, UNIX_EPOCH};

use super::store::Store;

/// The filesystem core: one store, one mounter, operations in program order.
pub struct SqlFs {
    pub(crate) store: Store,
}

impl SqlFs {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Store access for integrity checks in tests and tooling.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn shutdown(&mut self) {
        self.store.shutdown();
    }
}

/// Wall-clock seconds since the epoch, the timestamp unit of the store.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
