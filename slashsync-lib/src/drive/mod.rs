//! Drive abstraction and session management.
//!
//! The storage substrate is a black box exposing content-addressed drives.
//! A drive's core is shared: many logical sessions may use it at once, and it
//! must only be torn down after the last of them is released. The
//! [`DriveSessionManager`] enforces that with an arena of reference-counted
//! slots.
//!
//! ```text
//! ContactStore ─┐
//! Synchronizer ─┼─ acquire(DriveRef) ─▶ DriveSessionManager ─▶ DriveStore::open ─▶ Drive
//! Seeding ──────┘                         (slot per DriveRef,
//!                                          refs counted, core closed at 0)
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{DriveKey, Result};

mod memory;
mod session;

pub use memory::MemoryDriveStore;
pub use session::{DriveSession, DriveSessionManager, WriteBatch};

/// Name of the private drive holding contact records.
pub const CONTACTS_DRIVE: &str = "contacts";

/// Which drive a session is for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DriveRef {
    /// The identity's own public drive (profile, slashpay.json).
    Public,
    /// A named private drive owned by the identity.
    Named(String),
    /// Another identity's public drive.
    Remote(DriveKey),
}

impl DriveRef {
    /// The private contacts drive.
    pub fn contacts() -> Self {
        Self::Named(CONTACTS_DRIVE.to_string())
    }
}

impl fmt::Display for DriveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Named(name) => write!(f, "named:{name}"),
            Self::Remote(key) => write!(f, "remote:{}", key.id()),
        }
    }
}

/// An opened drive, as handed out by the storage substrate.
///
/// Implementations wrap the substrate's drive object. Closing is split into
/// the drive's own core and its blobs core so the session manager can release
/// exactly what it opened without touching sibling handles.
#[async_trait]
pub trait Drive: Send + Sync {
    /// The drive's public key.
    fn key(&self) -> DriveKey;

    /// Resolves once the drive can serve reads and writes.
    async fn ready(&self) -> Result<()>;

    /// Key of the blobs core used for binary attachments, opening it if
    /// needed. `None` when the drive has no blobs core.
    async fn blobs_key(&self) -> Result<Option<DriveKey>>;

    /// Read a file. `Ok(None)` when the path does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a file.
    async fn put(&self, path: &str, content: Vec<u8>) -> Result<()>;

    /// Delete a file.
    async fn del(&self, path: &str) -> Result<()>;

    /// List file paths under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Apply all entries as one atomic write.
    async fn commit_batch(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Close this drive's core handle.
    async fn close_core(&self) -> Result<()>;

    /// Close the blobs core handle, if one was opened.
    async fn close_blobs(&self) -> Result<()>;
}

/// The storage substrate owning an identity's drives.
#[async_trait]
pub trait DriveStore: Send + Sync {
    /// The identity key; also the key of the public drive.
    fn owner(&self) -> DriveKey;

    /// True once the store has been closed. Sessions cannot be created after that.
    fn is_closed(&self) -> bool;

    /// Open (or attach to) the drive behind `drive`. Readiness is awaited by
    /// the caller.
    async fn open(&self, drive: &DriveRef) -> Result<Arc<dyn Drive>>;
}
