use std::sync::Arc;

use crate::drive::{DriveSessionManager, DriveStore};
use crate::notify::{Notifier, STORAGE_CLOSED_MESSAGE, STORAGE_CLOSED_TITLE};
use crate::url::{Protocol, SlashUrl};
use crate::{DriveKey, Result, SlashError};

/// An identity: its key and the session manager over its drives.
///
/// Cloning is cheap and clones share one session arena.
#[derive(Clone)]
pub struct Slashtag {
    key: DriveKey,
    sessions: Arc<DriveSessionManager>,
}

impl Slashtag {
    /// Wrap a storage substrate.
    pub fn new(store: Arc<dyn DriveStore>) -> Self {
        let sessions = DriveSessionManager::new(store);
        Self {
            key: sessions.owner(),
            sessions: Arc::new(sessions),
        }
    }

    /// The identity key.
    pub fn key(&self) -> DriveKey {
        self.key
    }

    /// The identity's `slash:` URL.
    pub fn url(&self) -> SlashUrl {
        SlashUrl::new(Protocol::Slash, self.key)
    }

    /// Session manager shared by every component working on this identity.
    pub fn sessions(&self) -> &Arc<DriveSessionManager> {
        &self.sessions
    }

    /// True once the storage layer has been closed.
    pub fn is_closed(&self) -> bool {
        self.sessions.is_closed()
    }

    /// Fail with `StorageClosed`, notifying the user, if storage is closed.
    pub fn check_closed(&self, notifier: &dyn Notifier) -> Result<()> {
        if self.is_closed() {
            notifier.notify_error(STORAGE_CLOSED_TITLE, STORAGE_CLOSED_MESSAGE);
            return Err(SlashError::StorageClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Slashtag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slashtag").field("key", &self.key).finish()
    }
}
