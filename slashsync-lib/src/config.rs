//! Configuration types for synchronization and seeding.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lightning::OFFLINE_INVOICE_EXPIRY_SECS;

/// Environment variable overriding the seeding endpoint.
pub const SEEDER_URL_ENV: &str = "SLASHSYNC_SEEDER_URL";

/// Default seeding relay endpoint.
pub const DEFAULT_SEEDER_URL: &str = "https://blocktank.synonym.to/seeding/hypercore";

/// What to publish when a stale Lightning invoice cannot be replaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceFallback {
    /// Keep publishing the previous invoice entry.
    #[default]
    KeepPrevious,
    /// Drop the invoice entry from the document.
    Omit,
}

/// Configuration for the seeding relay client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Relay endpoint receiving `{"publicKey": <hex>}` POSTs.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_SEEDER_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

impl SeedingConfig {
    /// Create a seeding configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: default_timeout(),
        }
    }

    /// Defaults, with the endpoint taken from `SLASHSYNC_SEEDER_URL` if set.
    pub fn from_env() -> Self {
        match std::env::var(SEEDER_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration for the payment config synchronizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet period after the last trigger before a run starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Expiry of newly created offline invoices.
    #[serde(default = "default_invoice_expiry")]
    pub invoice_expiry_secs: u64,

    /// Behaviour when invoice renewal fails.
    #[serde(default)]
    pub invoice_fallback: InvoiceFallback,
}

fn default_debounce_ms() -> u64 {
    5_000
}

fn default_invoice_expiry() -> u64 {
    OFFLINE_INVOICE_EXPIRY_SECS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            invoice_expiry_secs: default_invoice_expiry(),
            invoice_fallback: InvoiceFallback::default(),
        }
    }
}

impl SyncConfig {
    /// Set the debounce window.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the invoice expiry.
    pub fn with_invoice_expiry(mut self, secs: u64) -> Self {
        self.invoice_expiry_secs = secs;
        self
    }

    /// Set the invoice fallback policy.
    pub fn with_invoice_fallback(mut self, fallback: InvoiceFallback) -> Self {
        self.invoice_fallback = fallback;
        self
    }

    /// Debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
