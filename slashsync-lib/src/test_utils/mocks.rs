//! Scriptable wallet, Lightning node and notifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::lightning::{CreatedInvoice, DecodedInvoice, LightningNode, OFFLINE_INVOICE_EXPIRY_SECS};
use crate::notify::Notifier;
use crate::wallet::WalletSource;
use crate::{Result, SlashError};

/// Wallet returning a fixed receive address, or failing.
pub struct MockWallet {
    address: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl MockWallet {
    /// A wallet whose receive address is `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: RwLock::new(Some(address.into())),
            calls: AtomicUsize::new(0),
        }
    }

    /// A wallet whose address lookups always fail.
    pub fn failing() -> Self {
        Self {
            address: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Change the receive address.
    pub fn set_address(&self, address: impl Into<String>) {
        *self.address.write().unwrap() = Some(address.into());
    }

    /// Make lookups fail from now on.
    pub fn set_failing(&self) {
        *self.address.write().unwrap() = None;
    }

    /// Number of address lookups so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSource for MockWallet {
    async fn receive_address(&self, wallet: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.address
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| SlashError::Wallet(format!("no address for wallet '{wallet}'")))
    }
}

/// Parameters of one `create_invoice` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    /// Requested amount
    pub amount_sats: u64,
    /// Requested description
    pub description: String,
    /// Requested expiry
    pub expiry_delta_secs: u64,
}

/// Lightning node that decodes only invoices it knows about.
///
/// Unknown payment requests fail to decode. Created invoices are registered
/// as known and unexpired.
#[derive(Default)]
pub struct MockLightningNode {
    invoices: RwLock<HashMap<String, bool>>,
    requests: Mutex<Vec<InvoiceRequest>>,
    fail_create: AtomicBool,
    counter: AtomicUsize,
}

impl MockLightningNode {
    /// A node that knows no invoices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decodable, unexpired invoice.
    pub fn add_invoice(&self, payment_request: impl Into<String>) -> String {
        let payment_request = payment_request.into();
        self.invoices
            .write()
            .unwrap()
            .insert(payment_request.clone(), false);
        payment_request
    }

    /// Mark a known invoice as expired.
    pub fn expire(&self, payment_request: &str) {
        self.invoices
            .write()
            .unwrap()
            .insert(payment_request.to_string(), true);
    }

    /// Make invoice creation fail (or succeed again).
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Every `create_invoice` call so far, failed ones included.
    pub fn requests(&self) -> Vec<InvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LightningNode for MockLightningNode {
    async fn decode_invoice(&self, payment_request: &str) -> Result<DecodedInvoice> {
        let expired = self
            .invoices
            .read()
            .unwrap()
            .get(payment_request)
            .copied()
            .ok_or_else(|| SlashError::Lightning(format!("cannot decode '{payment_request}'")))?;

        let now = Utc::now();
        let created = if expired {
            now - chrono::Duration::seconds(OFFLINE_INVOICE_EXPIRY_SECS as i64 + 60)
        } else {
            now
        };
        let mut invoice = DecodedInvoice {
            payment_hash: hex::encode(payment_request.as_bytes()),
            amount_sats: None,
            description: None,
            timestamp: created.timestamp().max(0) as u64,
            expiry: OFFLINE_INVOICE_EXPIRY_SECS,
            is_expired: false,
        };
        invoice.is_expired = invoice.is_expired_at(now);
        Ok(invoice)
    }

    async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry_delta_secs: u64,
    ) -> Result<CreatedInvoice> {
        self.requests.lock().unwrap().push(InvoiceRequest {
            amount_sats,
            description: description.to_string(),
            expiry_delta_secs,
        });

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SlashError::Lightning("node offline".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let to_str = self.add_invoice(format!("lnbc1mock{n}"));
        Ok(CreatedInvoice {
            payment_hash: hex::encode(to_str.as_bytes()),
            to_str,
        })
    }
}

/// Notifier that records every notification.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, message)` pairs in order.
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }

    /// True if nothing was notified.
    pub fn is_empty(&self) -> bool {
        self.seen.lock().unwrap().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, title: &str, message: &str) {
        self.seen
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}
