//! Lightning node contract.
//!
//! The node decodes payment requests and creates invoices. Which invoices are
//! still unpaid is tracked by the caller and passed in with each
//! synchronization snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Expiry of invoices published in `/slashpay.json`: one week.
pub const OFFLINE_INVOICE_EXPIRY_SECS: u64 = 60 * 60 * 24 * 7;

/// A decoded BOLT11 payment request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInvoice {
    /// Payment hash (hex).
    pub payment_hash: String,
    /// Amount in sats, `None` for zero-amount invoices.
    pub amount_sats: Option<u64>,
    /// Description.
    pub description: Option<String>,
    /// Creation time (unix seconds).
    pub timestamp: u64,
    /// Expiry delta in seconds.
    pub expiry: u64,
    /// Whether the invoice was expired at decode time.
    pub is_expired: bool,
}

impl DecodedInvoice {
    /// When the invoice expires, `None` if out of range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timestamp.saturating_add(self.expiry)).ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Whether the invoice is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expiry| expiry <= now)
    }
}

/// An invoice freshly created by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    /// The BOLT11 payment request string.
    pub to_str: String,
    /// Payment hash (hex).
    pub payment_hash: String,
}

/// Lightning node used for invoice decoding and creation.
#[async_trait]
pub trait LightningNode: Send + Sync {
    /// Decode a payment request.
    async fn decode_invoice(&self, payment_request: &str) -> Result<DecodedInvoice>;

    /// Create an invoice. `amount_sats == 0` creates a zero-amount invoice.
    async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry_delta_secs: u64,
    ) -> Result<CreatedInvoice>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let invoice = DecodedInvoice {
            payment_hash: String::new(),
            amount_sats: None,
            description: None,
            timestamp: 1_700_000_000,
            expiry: OFFLINE_INVOICE_EXPIRY_SECS,
            is_expired: false,
        };
        let expires_at = invoice.expires_at().unwrap();
        assert_eq!(expires_at.timestamp(), 1_700_604_800);
        assert!(!invoice.is_expired_at(DateTime::from_timestamp(1_700_000_001, 0).unwrap()));
        assert!(invoice.is_expired_at(expires_at));
    }
}
