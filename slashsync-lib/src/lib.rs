//! Slashtags synchronization library.
//!
//! Keeps an identity's public drive (`/profile.json`, `/slashpay.json`) and its
//! private `contacts` drive in sync with local wallet state. The storage
//! substrate, wallet, Lightning node and notification sink are all injected
//! through traits; this crate owns only the decision logic and the session
//! bookkeeping around them.
//!
//! # Features
//!
//! - **Drive sessions**: reference-counted sessions over shared drive cores
//!   ([`drive::DriveSessionManager`])
//! - **Contacts**: contact and profile CRUD, bulk import ([`contacts::ContactStore`])
//! - **slashpay.json**: debounced payment config reconciliation
//!   ([`payconfig::PaymentConfigSynchronizer`])
//! - **Seeding**: best-effort push of replication keys to a relay
//!   ([`seeding::SeedingClient`])
//! - **URLs**: `slash:`/`slashfeed:` parsing and routing ([`url`], [`router`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use slashsync_lib::drive::MemoryDriveStore;
//! use slashsync_lib::Slashtag;
//!
//! let store = Arc::new(MemoryDriveStore::random());
//! let slashtag = Slashtag::new(store);
//! assert!(slashtag.url().to_string().starts_with("slash:"));
//! ```

use std::fmt;

pub mod config;
pub mod contacts;
pub mod debounce;
pub mod drive;
pub mod encoding;
pub mod errors;
pub mod lightning;
pub mod models;
pub mod notify;
pub mod payconfig;
pub mod router;
pub mod seeding;
mod slashtag;
pub mod url;
pub mod wallet;

/// Test utilities: mock wallet, mock Lightning node, recording notifier.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{InvoiceFallback, SeedingConfig, SyncConfig};
pub use contacts::ContactStore;
pub use drive::{DriveRef, DriveSession, DriveSessionManager};
pub use errors::{SlashError, SlashErrorCode};
pub use models::{BasicProfile, ContactRecord, PaymentConfig, PaymentConfigEntry};
pub use notify::{Notifier, TracingNotifier};
pub use payconfig::{PaymentConfigSynchronizer, SyncContext, SyncOutcome};
pub use seeding::SeedingClient;
pub use slashtag::Slashtag;
pub use url::{parse as parse_url, validate as validate_url, SlashUrl};

/// Common result alias for slashsync operations.
pub type Result<T> = std::result::Result<T, SlashError>;

/// A 32-byte drive (or identity) public key.
///
/// Displays as lowercase hex, the form the seeding relay expects. URLs and
/// contact paths use the z-base-32 [`id`](DriveKey::id) instead.
///
/// # Example
///
/// ```
/// use slashsync_lib::DriveKey;
///
/// let key = DriveKey([0u8; 32]);
/// assert_eq!(key.to_string().len(), 64);
/// assert_eq!(key.id().len(), 52);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriveKey(pub [u8; 32]);

impl DriveKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// z-base-32 identifier used in URLs and contact paths.
    pub fn id(&self) -> String {
        encoding::zbase32_encode(&self.0)
    }

    /// A random key, for ephemeral identities and tests.
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl From<[u8; 32]> for DriveKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DriveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DriveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriveKey({})", self.id())
    }
}
