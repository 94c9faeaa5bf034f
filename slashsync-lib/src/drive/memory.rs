//! In-memory drive store.
//!
//! This implementation is for testing and the demo CLI only. Files live in a
//! process-wide map shared by every store created through
//! [`MemoryDriveStore::peer`], so several identities can read each other's
//! public drives. It also keeps per-core open/close/write counters and lets
//! tests inject failures.
//!
//! # Thread Safety
//!
//! All state sits behind one `Mutex`; lock poisoning is recovered rather than
//! propagated since every critical section leaves the maps consistent.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{Drive, DriveRef, DriveStore};
use crate::{DriveKey, Result, SlashError};

#[derive(Default)]
struct Network {
    files: HashMap<DriveKey, BTreeMap<String, Vec<u8>>>,
    opens: HashMap<DriveKey, usize>,
    closes: HashMap<DriveKey, usize>,
    writes: HashMap<DriveKey, usize>,
    unreachable: HashSet<DriveKey>,
    fail_writes: bool,
    fail_closes: bool,
    open_delay: Option<Duration>,
}

type Shared = Arc<Mutex<Network>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Network> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Derive a child key from a parent key and a label.
fn derive_key(parent: &DriveKey, label: &[u8]) -> DriveKey {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(parent.as_bytes());
    DriveKey(hasher.finalize().into())
}

/// In-memory implementation of [`DriveStore`].
///
/// **Warning**: This is for testing only. Nothing is persisted or replicated.
pub struct MemoryDriveStore {
    owner: DriveKey,
    closed: AtomicBool,
    network: Shared,
}

impl MemoryDriveStore {
    /// A store for `owner` on a fresh, empty network.
    pub fn new(owner: DriveKey) -> Self {
        Self {
            owner,
            closed: AtomicBool::new(false),
            network: Arc::default(),
        }
    }

    /// A store for a random identity on a fresh network.
    pub fn random() -> Self {
        Self::new(DriveKey::random())
    }

    /// Another identity's store on the same network.
    pub fn peer(&self, owner: DriveKey) -> Self {
        Self {
            owner,
            closed: AtomicBool::new(false),
            network: Arc::clone(&self.network),
        }
    }

    /// Key of a named drive owned by this identity.
    pub fn named_key(&self, name: &str) -> DriveKey {
        derive_key(&self.owner, name.as_bytes())
    }

    /// Key of the blobs core belonging to `key`.
    pub fn blobs_key_of(key: &DriveKey) -> DriveKey {
        derive_key(key, b"blobs")
    }

    /// Resolve a [`DriveRef`] to the drive key it names.
    pub fn resolve(&self, drive: &DriveRef) -> DriveKey {
        match drive {
            DriveRef::Public => self.owner,
            DriveRef::Named(name) => self.named_key(name),
            DriveRef::Remote(key) => *key,
        }
    }

    /// The identity owning this store's public drive.
    pub fn owner(&self) -> DriveKey {
        self.owner
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark the store closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Write a file directly, bypassing sessions and counters.
    pub fn write_file(&self, key: &DriveKey, path: &str, content: impl Into<Vec<u8>>) {
        lock(&self.network)
            .files
            .entry(*key)
            .or_default()
            .insert(path.to_string(), content.into());
    }

    /// Read a file directly.
    pub fn read_file(&self, key: &DriveKey, path: &str) -> Option<Vec<u8>> {
        lock(&self.network)
            .files
            .get(key)
            .and_then(|files| files.get(path).cloned())
    }

    /// How many times the core for `key` was opened.
    pub fn open_count(&self, key: &DriveKey) -> usize {
        lock(&self.network).opens.get(key).copied().unwrap_or(0)
    }

    /// How many times the core for `key` was closed.
    pub fn close_count(&self, key: &DriveKey) -> usize {
        lock(&self.network).closes.get(key).copied().unwrap_or(0)
    }

    /// How many write operations (put, del, batch commit) hit `key`.
    pub fn write_count(&self, key: &DriveKey) -> usize {
        lock(&self.network).writes.get(key).copied().unwrap_or(0)
    }

    /// Make `key` never become ready.
    pub fn set_unreachable(&self, key: DriveKey) {
        lock(&self.network).unreachable.insert(key);
    }

    /// Make every write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.network).fail_writes = fail;
    }

    /// Make every core close fail.
    pub fn fail_closes(&self, fail: bool) {
        lock(&self.network).fail_closes = fail;
    }

    /// Delay each open, so concurrent acquires overlap.
    pub fn set_open_delay(&self, delay: Duration) {
        lock(&self.network).open_delay = Some(delay);
    }
}

#[async_trait]
impl DriveStore for MemoryDriveStore {
    fn owner(&self) -> DriveKey {
        MemoryDriveStore::owner(self)
    }

    fn is_closed(&self) -> bool {
        MemoryDriveStore::is_closed(self)
    }

    async fn open(&self, drive: &DriveRef) -> Result<Arc<dyn Drive>> {
        if self.is_closed() {
            return Err(SlashError::StorageClosed);
        }

        let key = self.resolve(drive);
        let delay = {
            let mut network = lock(&self.network);
            *network.opens.entry(key).or_default() += 1;
            network.open_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(Arc::new(MemoryDrive {
            key,
            network: Arc::clone(&self.network),
            core_open: AtomicBool::new(true),
            blobs_open: AtomicBool::new(false),
        }))
    }
}

struct MemoryDrive {
    key: DriveKey,
    network: Shared,
    core_open: AtomicBool,
    blobs_open: AtomicBool,
}

impl MemoryDrive {
    fn ensure_open(&self) -> Result<()> {
        if self.core_open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SlashError::Internal(format!(
                "core {} is closed",
                self.key.id()
            )))
        }
    }

    fn write<F>(&self, path: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, Vec<u8>>),
    {
        self.ensure_open()?;
        let mut network = lock(&self.network);
        if network.fail_writes {
            return Err(SlashError::write_failed(path, "injected write failure"));
        }
        *network.writes.entry(self.key).or_default() += 1;
        apply(network.files.entry(self.key).or_default());
        Ok(())
    }

    fn close_handle(&self, key: DriveKey, flag: &AtomicBool) -> Result<()> {
        if !flag.swap(false, Ordering::SeqCst) {
            return Err(SlashError::Internal(format!(
                "core {} closed twice",
                key.id()
            )));
        }
        let mut network = lock(&self.network);
        if network.fail_closes {
            return Err(SlashError::Internal("injected close failure".into()));
        }
        *network.closes.entry(key).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl Drive for MemoryDrive {
    fn key(&self) -> DriveKey {
        self.key
    }

    async fn ready(&self) -> Result<()> {
        if lock(&self.network).unreachable.contains(&self.key) {
            return Err(SlashError::Internal(format!(
                "no peers found for {}",
                self.key.id()
            )));
        }
        Ok(())
    }

    async fn blobs_key(&self) -> Result<Option<DriveKey>> {
        self.ensure_open()?;
        self.blobs_open.store(true, Ordering::SeqCst);
        Ok(Some(MemoryDriveStore::blobs_key_of(&self.key)))
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()
            .map_err(|err| SlashError::read_failed(path, err.reason()))?;
        Ok(lock(&self.network)
            .files
            .get(&self.key)
            .and_then(|files| files.get(path).cloned()))
    }

    async fn put(&self, path: &str, content: Vec<u8>) -> Result<()> {
        self.write(path, |files| {
            files.insert(path.to_string(), content);
        })
    }

    async fn del(&self, path: &str) -> Result<()> {
        self.write(path, |files| {
            files.remove(path);
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.ensure_open()
            .map_err(|err| SlashError::read_failed(prefix, err.reason()))?;
        Ok(lock(&self.network)
            .files
            .get(&self.key)
            .map(|files| {
                files
                    .keys()
                    .filter(|path| path.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit_batch(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.write("<batch>", |files| files.extend(entries))
    }

    async fn close_core(&self) -> Result<()> {
        self.close_handle(self.key, &self.core_open)
    }

    async fn close_blobs(&self) -> Result<()> {
        if !self.blobs_open.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.close_handle(MemoryDriveStore::blobs_key_of(&self.key), &self.blobs_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_named_keys_are_deterministic() {
        let store = MemoryDriveStore::new(DriveKey([1; 32]));
        assert_eq!(store.named_key("contacts"), store.named_key("contacts"));
        assert_ne!(store.named_key("contacts"), store.owner());
        assert_eq!(store.resolve(&DriveRef::Public), store.owner());
    }

    #[tokio::test]
    async fn test_peers_share_files() {
        let alice = MemoryDriveStore::random();
        let bob = alice.peer(DriveKey::random());

        alice.write_file(&alice.owner(), "/profile.json", b"{}".to_vec());
        let drive = bob.open(&DriveRef::Remote(alice.owner())).await.unwrap();
        assert_eq!(
            drive.get("/profile.json").await.unwrap(),
            Some(b"{}".to_vec())
        );
    }

    #[tokio::test]
    async fn test_double_close_is_an_error() {
        let store = MemoryDriveStore::random();
        let drive = store.open(&DriveRef::Public).await.unwrap();
        drive.close_core().await.unwrap();
        assert!(drive.close_core().await.is_err());
        assert!(drive.get("/x").await.is_err());
        assert_eq!(store.close_count(&store.owner()), 1);
    }
}
