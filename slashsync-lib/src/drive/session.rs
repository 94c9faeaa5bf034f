//! Reference-counted drive sessions.
//!
//! The manager owns an arena with one slot per [`DriveRef`]. A slot holds the
//! opened drive and the number of live sessions pointing at it. Sessions only
//! carry the slot's id; the drive's core (and its blobs core) is closed when
//! the count drops to zero, and never by a session while siblings remain.
//!
//! # Thread Safety
//!
//! The slot table is guarded by a `Mutex` held only for bookkeeping, never
//! across an await. Opening is serialized per slot through a `OnceCell`, so
//! concurrent first acquires of the same drive share a single open.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use super::{Drive, DriveRef, DriveStore};
use crate::encoding::{decode_json, encode_json};
use crate::{DriveKey, Result, SlashError};

type DriveCell = Arc<OnceCell<Arc<dyn Drive>>>;

struct Slot {
    id: u64,
    refs: usize,
    drive: DriveCell,
}

struct Arena {
    store: Arc<dyn DriveStore>,
    slots: Mutex<HashMap<DriveRef, Slot>>,
    next_slot: AtomicU64,
}

impl Arena {
    /// Take a reference on the slot for `drive_ref`, creating it if needed.
    fn reserve(&self, drive_ref: &DriveRef) -> (u64, DriveCell) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(drive_ref.clone()).or_insert_with(|| Slot {
            id: self.next_slot.fetch_add(1, Ordering::Relaxed),
            refs: 0,
            drive: Arc::new(OnceCell::new()),
        });
        slot.refs += 1;
        (slot.id, Arc::clone(&slot.drive))
    }

    /// Drop a reference. Returns the drive to tear down if this was the last one.
    fn unref(&self, drive_ref: &DriveRef, slot_id: u64) -> Option<Arc<dyn Drive>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        let slot = match slots.get_mut(drive_ref) {
            Some(slot) if slot.id == slot_id => slot,
            _ => {
                tracing::warn!(drive = %drive_ref, slot_id, "release of unknown session slot ignored");
                return None;
            }
        };

        slot.refs -= 1;
        if slot.refs > 0 {
            return None;
        }

        slots
            .remove(drive_ref)
            .and_then(|slot| slot.drive.get().cloned())
    }

    fn refs(&self, drive_ref: &DriveRef) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(drive_ref).map(|slot| slot.refs).unwrap_or(0)
    }
}

/// Close the session-owned handles of a drive. Failures are logged only.
async fn teardown(drive_ref: DriveRef, drive: Arc<dyn Drive>) {
    tracing::debug!(drive = %drive_ref, "last session released, closing core");

    if let Err(err) = drive.close_core().await {
        tracing::warn!(drive = %drive_ref, error = %err, "failed to close drive core");
    }
    if let Err(err) = drive.close_blobs().await {
        tracing::warn!(drive = %drive_ref, error = %err, "failed to close blobs core");
    }
}

async fn open_ready(store: Arc<dyn DriveStore>, drive_ref: DriveRef) -> Result<Arc<dyn Drive>> {
    let drive = store
        .open(&drive_ref)
        .await
        .map_err(|err| unavailable(&drive_ref, err))?;

    if let Err(err) = drive.ready().await {
        if let Err(close_err) = drive.close_core().await {
            tracing::debug!(drive = %drive_ref, error = %close_err, "close after failed ready");
        }
        return Err(unavailable(&drive_ref, err));
    }

    Ok(drive)
}

fn unavailable(drive_ref: &DriveRef, err: SlashError) -> SlashError {
    match err {
        SlashError::StorageClosed => SlashError::StorageClosed,
        other => SlashError::DriveUnavailable {
            drive: drive_ref.to_string(),
            reason: other.reason(),
        },
    }
}

/// Hands out sessions on an identity's drives.
///
/// Cloning is cheap; clones share the same arena.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use slashsync_lib::drive::{DriveRef, DriveSessionManager, MemoryDriveStore};
/// # async fn demo() -> slashsync_lib::Result<()> {
/// let manager = DriveSessionManager::new(Arc::new(MemoryDriveStore::random()));
///
/// let a = manager.acquire(DriveRef::Public).await?;
/// let b = manager.acquire(DriveRef::Public).await?;
/// assert_eq!(manager.open_sessions(&DriveRef::Public), 2);
///
/// manager.release(a).await?; // core stays open for `b`
/// manager.release(b).await?; // core closed here
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DriveSessionManager {
    arena: Arc<Arena>,
}

impl DriveSessionManager {
    /// Create a manager over a storage substrate.
    pub fn new(store: Arc<dyn DriveStore>) -> Self {
        Self {
            arena: Arc::new(Arena {
                store,
                slots: Mutex::new(HashMap::new()),
                next_slot: AtomicU64::new(0),
            }),
        }
    }

    /// The identity key of the underlying store.
    pub fn owner(&self) -> DriveKey {
        self.arena.store.owner()
    }

    /// True once the underlying store has been closed.
    pub fn is_closed(&self) -> bool {
        self.arena.store.is_closed()
    }

    /// Number of live sessions on `drive_ref`.
    pub fn open_sessions(&self, drive_ref: &DriveRef) -> usize {
        self.arena.refs(drive_ref)
    }

    /// Open a session on `drive_ref`.
    ///
    /// The first session on a drive opens it and waits for readiness; later
    /// sessions attach to the same drive.
    ///
    /// # Errors
    ///
    /// - `SlashError::StorageClosed` if the store is closed.
    /// - `SlashError::DriveUnavailable` if the drive cannot be opened or
    ///   never becomes ready. No retry is attempted.
    #[tracing::instrument(skip(self), fields(drive = %drive_ref))]
    pub async fn acquire(&self, drive_ref: DriveRef) -> Result<DriveSession> {
        if self.arena.store.is_closed() {
            return Err(SlashError::StorageClosed);
        }

        let (slot_id, cell) = self.arena.reserve(&drive_ref);
        let reservation = Reservation {
            arena: &*self.arena,
            drive_ref: &drive_ref,
            slot_id,
            armed: true,
        };
        let store = Arc::clone(&self.arena.store);
        let opened = cell
            .get_or_try_init(|| open_ready(store, drive_ref.clone()))
            .await
            .cloned();

        match opened {
            Ok(drive) => {
                reservation.disarm();
                Ok(DriveSession {
                    arena: Arc::clone(&self.arena),
                    drive_ref,
                    slot_id,
                    drive,
                    released: false,
                })
            }
            Err(err) => {
                reservation.disarm();
                if let Some(drive) = self.arena.unref(&drive_ref, slot_id) {
                    teardown(drive_ref, drive).await;
                }
                Err(err)
            }
        }
    }

    /// Release a session.
    ///
    /// Closes the drive's core and blobs core only if this was the last
    /// session on it. Cleanup failures are logged, not returned; the only
    /// error is a session that belongs to another manager (which is then
    /// released against its own manager).
    pub async fn release(&self, session: DriveSession) -> Result<()> {
        if !Arc::ptr_eq(&self.arena, &session.arena) {
            let drive = session.drive_ref.to_string();
            session.release().await;
            return Err(SlashError::Internal(format!(
                "session on {drive} was not acquired from this manager"
            )));
        }
        session.release().await;
        Ok(())
    }
}

/// A logical handle on a drive for one unit of work.
///
/// Release it with [`DriveSession::release`] or
/// [`DriveSessionManager::release`]. A session dropped without release still
/// returns its reference; the teardown is then spawned on the current runtime.
pub struct DriveSession {
    arena: Arc<Arena>,
    drive_ref: DriveRef,
    slot_id: u64,
    drive: Arc<dyn Drive>,
    released: bool,
}

impl DriveSession {
    /// Which drive this session is for.
    pub fn drive_ref(&self) -> &DriveRef {
        &self.drive_ref
    }

    /// The drive's public key.
    pub fn key(&self) -> DriveKey {
        self.drive.key()
    }

    /// The blobs core key, if the drive has one.
    pub async fn blobs_key(&self) -> Result<Option<DriveKey>> {
        self.drive.blobs_key().await
    }

    /// Read a file.
    pub async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.drive.get(path).await
    }

    /// Create or replace a file.
    pub async fn put(&self, path: &str, content: Vec<u8>) -> Result<()> {
        self.drive.put(path, content).await
    }

    /// Delete a file.
    pub async fn del(&self, path: &str) -> Result<()> {
        self.drive.del(path).await
    }

    /// List file paths under `prefix`.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.drive.list(prefix).await
    }

    /// Read and decode a JSON file. Missing or empty files are `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let bytes = self.get(path).await?;
        decode_json(path, bytes.as_deref())
    }

    /// Encode and write a JSON file.
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        self.put(path, encode_json(value)?).await
    }

    /// Start a write batch private to this session.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            session: self,
            staged: Mutex::new(BTreeMap::new()),
        }
    }

    /// Return this session's reference, closing the core if it was the last.
    pub async fn release(mut self) {
        self.released = true;
        if let Some(drive) = self.arena.unref(&self.drive_ref, self.slot_id) {
            teardown(self.drive_ref.clone(), drive).await;
        }
    }
}

impl Drop for DriveSession {
    fn drop(&mut self) {
        if !self.released {
            unref_detached(&self.arena, &self.drive_ref, self.slot_id);
        }
    }
}

/// A slot reference taken by an `acquire` that has not produced a session yet.
///
/// Returned to the arena if the acquire future is dropped mid-open.
struct Reservation<'a> {
    arena: &'a Arena,
    drive_ref: &'a DriveRef,
    slot_id: u64,
    armed: bool,
}

impl Reservation<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(drive = %self.drive_ref, "acquire cancelled, returning reference");
            unref_detached(self.arena, self.drive_ref, self.slot_id);
        }
    }
}

/// Drop a reference outside an async context, spawning the teardown if needed.
fn unref_detached(arena: &Arena, drive_ref: &DriveRef, slot_id: u64) {
    let Some(drive) = arena.unref(drive_ref, slot_id) else {
        return;
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(teardown(drive_ref.clone(), drive));
        }
        Err(_) => {
            tracing::warn!(drive = %drive_ref, "session dropped outside a runtime, core left open");
        }
    }
}

/// Writes staged in memory and committed atomically by [`WriteBatch::flush`].
///
/// Nothing is visible on the drive before the flush. A later put to the same
/// path replaces the earlier one.
pub struct WriteBatch<'a> {
    session: &'a DriveSession,
    staged: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl WriteBatch<'_> {
    /// Stage a file write.
    pub async fn put(&self, path: &str, content: Vec<u8>) -> Result<()> {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), content);
        Ok(())
    }

    /// Stage a JSON file write.
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        self.put(path, encode_json(value)?).await
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Commit every staged write in one atomic drive operation.
    pub async fn flush(self) -> Result<()> {
        let entries: Vec<(String, Vec<u8>)> = self
            .staged
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .collect();

        if entries.is_empty() {
            return Ok(());
        }

        self.session.drive.commit_batch(entries).await
    }
}
