//! CLI command implementations

pub mod contacts;
pub mod profile;
pub mod seed;
pub mod sync;
pub mod url;
pub mod whoami;

use std::sync::Arc;

use slashsync_lib::drive::MemoryDriveStore;
use slashsync_lib::Slashtag;

/// A fresh random identity on an in-memory store.
///
/// Nothing outlives the process; every command starts from an empty network.
pub fn ephemeral_identity() -> (Arc<MemoryDriveStore>, Slashtag) {
    let store = Arc::new(MemoryDriveStore::random());
    let slashtag = Slashtag::new(store.clone());
    (store, slashtag)
}
