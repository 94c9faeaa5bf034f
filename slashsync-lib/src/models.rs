//! Documents stored on drives.
//!
//! - [`BasicProfile`] - `/profile.json` on the public drive, and the body of
//!   every contact file
//! - [`ContactRecord`] - a contact file together with the URL it belongs to
//! - [`PaymentConfig`] - `/slashpay.json` on the public drive
//!
//! # Examples
//!
//! ```
//! use slashsync_lib::{PaymentConfig, PaymentConfigEntry};
//!
//! let config = PaymentConfig::from_entries(vec![
//!     PaymentConfigEntry::new("p2wpkh", "bc1q..."),
//!     PaymentConfigEntry::lightning_invoice("lnbc1..."),
//! ]);
//! assert_eq!(config.find("p2wpkh"), Some("bc1q..."));
//! ```

use serde::{Deserialize, Serialize};

/// Path of the profile document on the public drive.
pub const PROFILE_PATH: &str = "/profile.json";

/// Path of the payment config document on the public drive.
pub const SLASHPAY_PATH: &str = "/slashpay.json";

/// Payment method type of the Lightning invoice entry.
pub const LIGHTNING_INVOICE: &str = "lightningInvoice";

/// A titled link shown on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLink {
    /// Display title
    pub title: String,
    /// Link target or free text
    pub url: String,
}

/// Public profile of an identity.
///
/// Fields this crate does not know about are preserved in `extra` so a
/// round trip never drops data written by other clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicProfile {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Short bio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Image, usually a `data:` URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Public links
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<ProfileLink>,
    /// Unknown fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BasicProfile {
    /// A profile with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the bio.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Append a link.
    pub fn with_link(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.push(ProfileLink {
            title: title.into(),
            url: url.into(),
        });
        self
    }
}

/// A contact: the profile stored for it and the URL it is keyed by.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactRecord {
    /// Identity URL, the primary key
    pub url: String,
    /// Stored profile fields
    pub profile: BasicProfile,
}

/// One payment method in `/slashpay.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentConfigEntry {
    /// Method type: an address type such as `p2wpkh`, or `lightningInvoice`
    #[serde(rename = "type")]
    pub kind: String,
    /// Address or payment request
    pub value: String,
}

impl PaymentConfigEntry {
    /// Create an entry.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Create a Lightning invoice entry.
    pub fn lightning_invoice(value: impl Into<String>) -> Self {
        Self::new(LIGHTNING_INVOICE, value)
    }
}

/// The published list of offline payment methods.
///
/// Serialized as a bare JSON array. An empty list means offline payments are
/// disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentConfig(Vec<PaymentConfigEntry>);

impl PaymentConfig {
    /// The empty config.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a config, keeping only the first entry of each type.
    pub fn from_entries(entries: impl IntoIterator<Item = PaymentConfigEntry>) -> Self {
        let mut kept: Vec<PaymentConfigEntry> = Vec::new();
        for entry in entries {
            if !kept.iter().any(|e| e.kind == entry.kind) {
                kept.push(entry);
            }
        }
        Self(kept)
    }

    /// Value of the first entry with type `kind`.
    pub fn find(&self, kind: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.value.as_str())
    }

    /// The entries in order.
    pub fn entries(&self) -> &[PaymentConfigEntry] {
        &self.0
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no payment method is published.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
