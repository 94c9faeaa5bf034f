//! Error types for slashsync operations.
//!
//! Every operation in this crate either returns one of these errors or, for
//! background paths (payment config synchronization, seeding), logs it and
//! reports a plain outcome instead.

use thiserror::Error;

/// Error codes for FFI and mobile integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SlashErrorCode {
    /// Malformed identity URL
    InvalidUrl = 1000,
    /// Drive never became ready
    DriveUnavailable = 2000,
    /// Owning store is closed
    StorageClosed = 2001,
    /// Write, delete or batch flush failed
    WriteFailed = 3000,
    /// Read failed
    ReadFailed = 3001,
    /// Stored document could not be decoded
    DecodeFailed = 4000,
    /// Serialization error
    Serialization = 4001,
    /// Seeding relay rejected or unreachable
    SeedingFailed = 5000,
    /// Wallet subsystem error
    Wallet = 6000,
    /// Lightning subsystem error
    Lightning = 6001,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for slashsync operations.
#[derive(Debug, Error)]
pub enum SlashError {
    /// The URL could not be parsed as a slashtags URL.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl {
        /// The offending input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The drive's readiness future rejected.
    #[error("drive {drive} unavailable: {reason}")]
    DriveUnavailable {
        /// Drive reference description
        drive: String,
        /// Underlying error message
        reason: String,
    },

    /// The owning store has been closed; the app must restart.
    #[error("storage is closed")]
    StorageClosed,

    /// A write-side operation failed.
    #[error("write to {path} failed: {reason}")]
    WriteFailed {
        /// Drive path
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// A read failed.
    #[error("read of {path} failed: {reason}")]
    ReadFailed {
        /// Drive path
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// A stored document is not valid JSON (or legacy compact JSON).
    #[error("cannot decode {path}: {reason}")]
    DecodeFailed {
        /// Drive path
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Seeding request failed.
    #[error("seeding failed: {0}")]
    SeedingFailed(String),

    /// Wallet subsystem error.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Lightning subsystem error.
    #[error("lightning error: {0}")]
    Lightning(String),

    /// Internal/unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SlashError {
    /// Get the error code for FFI/mobile integration.
    pub fn code(&self) -> SlashErrorCode {
        match self {
            Self::InvalidUrl { .. } => SlashErrorCode::InvalidUrl,
            Self::DriveUnavailable { .. } => SlashErrorCode::DriveUnavailable,
            Self::StorageClosed => SlashErrorCode::StorageClosed,
            Self::WriteFailed { .. } => SlashErrorCode::WriteFailed,
            Self::ReadFailed { .. } => SlashErrorCode::ReadFailed,
            Self::DecodeFailed { .. } => SlashErrorCode::DecodeFailed,
            Self::Serialization(_) => SlashErrorCode::Serialization,
            Self::SeedingFailed(_) => SlashErrorCode::SeedingFailed,
            Self::Wallet(_) => SlashErrorCode::Wallet,
            Self::Lightning(_) => SlashErrorCode::Lightning,
            Self::Internal(_) => SlashErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for notifications).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the caller may retry the operation later.
    ///
    /// This layer never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DriveUnavailable { .. }
                | Self::WriteFailed { .. }
                | Self::ReadFailed { .. }
                | Self::SeedingFailed(_)
        )
    }

    /// Create an invalid url error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a write failure.
    pub fn write_failed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::WriteFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a read failure.
    pub fn read_failed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::ReadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a decode failure.
    pub fn decode_failed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::DecodeFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The underlying reason, without the path/url prefix.
    ///
    /// Notifications show this rather than the full `Display` output.
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidUrl { reason, .. }
            | Self::DriveUnavailable { reason, .. }
            | Self::WriteFailed { reason, .. }
            | Self::ReadFailed { reason, .. }
            | Self::DecodeFailed { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for SlashError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
