//! Keeps `/slashpay.json` in sync with wallet and Lightning state.
//!
//! ```text
//! trigger(ctx) ──debounce──▶ sync_once(ctx)
//!                              │ acquire public drive
//!                              │ load /slashpay.json
//!                              │ fetch address, check invoice
//!                              │ reconcile ─▶ create invoice? ─▶ assemble
//!                              │ write if dirty
//!                              └ release
//! ```
//!
//! Runs are background work: failures are logged, never notified.

mod reconcile;

pub use reconcile::{
    assemble, reconcile, InvoiceCheck, InvoicePlan, Plan, ReconcileInputs, Reconciliation,
};

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::drive::{DriveRef, DriveSession};
use crate::lightning::LightningNode;
use crate::models::{PaymentConfig, LIGHTNING_INVOICE, SLASHPAY_PATH};
use crate::wallet::{AddressType, Network, WalletSource};
use crate::Slashtag;

/// State a run reconciles against, captured when it is triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncContext {
    /// Whether offline payments are enabled.
    pub offline_payments: bool,
    /// Identifier of the selected wallet.
    pub selected_wallet: String,
    /// Network of the selected wallet.
    pub network: Network,
    /// Address type selected in the wallet.
    pub address_type: AddressType,
    /// Payment requests of invoices known to be unpaid on this wallet and network.
    pub unpaid_invoices: Vec<String>,
}

/// Result of one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No identity attached, or its public drive could not be opened.
    NotReady,
    /// Nothing had to change; no write happened.
    Unchanged,
    /// Offline payments are off; `[]` was written.
    Cleared,
    /// A new document was written.
    Updated(PaymentConfig),
    /// The document had to change but the write failed.
    WriteFailed,
}

struct Inner {
    slashtag: RwLock<Option<Slashtag>>,
    wallet: Arc<dyn WalletSource>,
    lightning: Arc<dyn LightningNode>,
    config: SyncConfig,
    debouncer: Debouncer,
    last_outcome: Mutex<Option<SyncOutcome>>,
}

/// Debounced synchronizer of the payment config document.
///
/// Cloning is cheap; clones share the same debounce timer.
#[derive(Clone)]
pub struct PaymentConfigSynchronizer {
    inner: Arc<Inner>,
}

impl PaymentConfigSynchronizer {
    /// Create a synchronizer. Runs are no-ops until [`attach`](Self::attach).
    pub fn new(
        wallet: Arc<dyn WalletSource>,
        lightning: Arc<dyn LightningNode>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slashtag: RwLock::new(None),
                wallet,
                lightning,
                debouncer: Debouncer::new(config.debounce()),
                config,
                last_outcome: Mutex::new(None),
            }),
        }
    }

    /// Attach the identity whose public drive is synchronized.
    pub fn attach(&self, slashtag: Slashtag) {
        *self
            .inner
            .slashtag
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(slashtag);
    }

    /// Detach the identity; later runs are no-ops.
    pub fn detach(&self) {
        *self
            .inner
            .slashtag
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Schedule a run with `ctx` after the debounce window.
    ///
    /// A trigger within the window replaces the pending run and its context.
    pub fn trigger(&self, ctx: SyncContext) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.debouncer.trigger(async move {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let sync = PaymentConfigSynchronizer { inner };
            let outcome = sync.sync_once(&ctx).await;
            *sync
                .inner
                .last_outcome
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        });
    }

    /// Cancel a scheduled run that has not started yet.
    pub fn cancel_pending(&self) {
        self.inner.debouncer.cancel();
    }

    /// True while a run is scheduled but has not started.
    pub fn is_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Outcome of the most recent triggered run.
    pub fn last_outcome(&self) -> Option<SyncOutcome> {
        self.inner
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one synchronization now, bypassing the debounce.
    #[tracing::instrument(skip_all, fields(wallet = %ctx.selected_wallet))]
    pub async fn sync_once(&self, ctx: &SyncContext) -> SyncOutcome {
        let slashtag = self
            .inner
            .slashtag
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(slashtag) = slashtag else {
            tracing::debug!("no identity attached, skipping");
            return SyncOutcome::NotReady;
        };

        let session = match slashtag.sessions().acquire(DriveRef::Public).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "public drive not available, skipping");
                return SyncOutcome::NotReady;
            }
        };
        let outcome = self.run(&session, ctx).await;
        session.release().await;
        outcome
    }

    async fn run(&self, session: &DriveSession, ctx: &SyncContext) -> SyncOutcome {
        let current = match session.get_json::<PaymentConfig>(SLASHPAY_PATH).await {
            Ok(config) => config.unwrap_or_default(),
            Err(err) => {
                tracing::debug!(error = %err, "treating unreadable slashpay.json as empty");
                PaymentConfig::empty()
            }
        };

        let inputs = if ctx.offline_payments {
            self.gather(ctx, &current).await
        } else {
            ReconcileInputs::disabled(ctx.address_type)
        };

        let plan = match reconcile(&current, &inputs) {
            Reconciliation::Noop => {
                tracing::debug!("offline payments disabled and nothing published");
                return SyncOutcome::Unchanged;
            }
            Reconciliation::Clear => {
                return if write(session, &PaymentConfig::empty()).await {
                    SyncOutcome::Cleared
                } else {
                    SyncOutcome::WriteFailed
                };
            }
            Reconciliation::Plan(plan) => plan,
        };

        if !plan.dirty {
            tracing::debug!("slashpay.json is up to date");
            return SyncOutcome::Unchanged;
        }

        let created = if plan.needs_invoice() {
            self.create_invoice().await
        } else {
            None
        };
        let config = assemble(&plan, created, self.inner.config.invoice_fallback);

        if write(session, &config).await {
            SyncOutcome::Updated(config)
        } else {
            SyncOutcome::WriteFailed
        }
    }

    async fn gather(&self, ctx: &SyncContext, current: &PaymentConfig) -> ReconcileInputs {
        let receive_address = match self.inner.wallet.receive_address(&ctx.selected_wallet).await
        {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::debug!(error = %err, "no fresh receive address");
                None
            }
        };

        let invoice = match current.find(LIGHTNING_INVOICE) {
            Some(published) => {
                let still_unpaid = ctx.unpaid_invoices.iter().any(|i| i == published);
                match self.inner.lightning.decode_invoice(published).await {
                    Ok(decoded) => InvoiceCheck {
                        still_unpaid,
                        decodes: true,
                        expired: decoded.is_expired || decoded.is_expired_at(Utc::now()),
                    },
                    Err(err) => {
                        tracing::debug!(error = %err, "published invoice does not decode");
                        InvoiceCheck {
                            still_unpaid,
                            ..InvoiceCheck::default()
                        }
                    }
                }
            }
            None => InvoiceCheck::default(),
        };

        ReconcileInputs {
            offline_payments: true,
            address_type: ctx.address_type,
            receive_address,
            invoice,
        }
    }

    async fn create_invoice(&self) -> Option<String> {
        let expiry = self.inner.config.invoice_expiry_secs;
        match self.inner.lightning.create_invoice(0, "", expiry).await {
            Ok(invoice) => Some(invoice.to_str),
            Err(err) => {
                tracing::warn!(error = %err, "could not create offline invoice");
                None
            }
        }
    }
}

async fn write(session: &DriveSession, config: &PaymentConfig) -> bool {
    tracing::debug!(entries = config.len(), "pushing new slashpay.json");
    match session.put_json(SLASHPAY_PATH, config).await {
        Ok(()) => {
            tracing::info!(entries = config.len(), "updated slashpay.json");
            true
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to write slashpay.json");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvoiceFallback;
    use crate::drive::MemoryDriveStore;
    use crate::models::PaymentConfigEntry;
    use crate::test_utils::{MockLightningNode, MockWallet};
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryDriveStore>,
        wallet: Arc<MockWallet>,
        node: Arc<MockLightningNode>,
        sync: PaymentConfigSynchronizer,
    }

    impl Harness {
        fn new(config: SyncConfig) -> Self {
            let store = Arc::new(MemoryDriveStore::random());
            let wallet = Arc::new(MockWallet::new("addr1"));
            let node = Arc::new(MockLightningNode::new());
            let sync = PaymentConfigSynchronizer::new(wallet.clone(), node.clone(), config);
            sync.attach(Slashtag::new(store.clone()));
            Self {
                store,
                wallet,
                node,
                sync,
            }
        }

        fn publish(&self, config: &PaymentConfig) {
            let body = serde_json::to_vec(config).unwrap();
            self.store.write_file(&self.store.owner(), SLASHPAY_PATH, body);
        }

        fn published_bytes(&self) -> Option<Vec<u8>> {
            self.store.read_file(&self.store.owner(), SLASHPAY_PATH)
        }

        fn published(&self) -> PaymentConfig {
            serde_json::from_slice(&self.published_bytes().unwrap()).unwrap()
        }

        fn writes(&self) -> usize {
            self.store.write_count(&self.store.owner())
        }

        fn sessions(&self) -> usize {
            self.store.open_count(&self.store.owner()) - self.store.close_count(&self.store.owner())
        }
    }

    fn enabled(unpaid: &[&str]) -> SyncContext {
        SyncContext {
            offline_payments: true,
            selected_wallet: "wallet0".into(),
            unpaid_invoices: unpaid.iter().map(|s| s.to_string()).collect(),
            ..SyncContext::default()
        }
    }

    fn config(address: &str, invoice: &str) -> PaymentConfig {
        PaymentConfig::from_entries(vec![
            PaymentConfigEntry::new("p2wpkh", address),
            PaymentConfigEntry::lightning_invoice(invoice),
        ])
    }

    #[tokio::test]
    async fn test_unchanged_state_writes_nothing() {
        let h = Harness::new(SyncConfig::default());
        let invoice = h.node.add_invoice("lnbc1abc");
        h.publish(&config("addr1", &invoice));
        let before = h.published_bytes();

        let outcome = h.sync.sync_once(&enabled(&[&invoice])).await;

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(h.writes(), 0);
        assert_eq!(h.published_bytes(), before);
        assert_eq!(h.sessions(), 0);
    }

    #[tokio::test]
    async fn test_address_change_single_write() {
        let h = Harness::new(SyncConfig::default());
        let invoice = h.node.add_invoice("lnbc1abc");
        h.publish(&config("addr1", &invoice));
        h.wallet.set_address("addr2");

        let outcome = h.sync.sync_once(&enabled(&[&invoice])).await;

        assert_eq!(outcome, SyncOutcome::Updated(config("addr2", &invoice)));
        assert_eq!(h.published(), config("addr2", &invoice));
        assert_eq!(h.writes(), 1);
        assert!(h.node.requests().is_empty());
    }

    /// Node whose decoder never sets `is_expired`; only the timestamps tell.
    struct StaleFlagNode;

    #[async_trait::async_trait]
    impl LightningNode for StaleFlagNode {
        async fn decode_invoice(
            &self,
            _payment_request: &str,
        ) -> crate::Result<crate::lightning::DecodedInvoice> {
            Ok(crate::lightning::DecodedInvoice {
                payment_hash: "00".into(),
                amount_sats: None,
                description: None,
                timestamp: 1_600_000_000,
                expiry: 3_600,
                is_expired: false,
            })
        }

        async fn create_invoice(
            &self,
            _amount_sats: u64,
            _description: &str,
            _expiry_delta_secs: u64,
        ) -> crate::Result<crate::lightning::CreatedInvoice> {
            Ok(crate::lightning::CreatedInvoice {
                to_str: "lnbc1fresh".into(),
                payment_hash: "01".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_invoice_past_expiry_time_is_renewed() {
        let store = Arc::new(MemoryDriveStore::random());
        let wallet = Arc::new(MockWallet::new("addr1"));
        let sync =
            PaymentConfigSynchronizer::new(wallet, Arc::new(StaleFlagNode), SyncConfig::default());
        sync.attach(Slashtag::new(store.clone()));
        let body = serde_json::to_vec(&config("addr1", "lnbc1old")).unwrap();
        store.write_file(&store.owner(), SLASHPAY_PATH, body);

        let outcome = sync.sync_once(&enabled(&["lnbc1old"])).await;

        assert_eq!(outcome, SyncOutcome::Updated(config("addr1", "lnbc1fresh")));
    }

    #[tokio::test]
    async fn test_expired_invoice_failed_renewal_keeps_old() {
        let h = Harness::new(SyncConfig::default());
        let invoice = h.node.add_invoice("lnbc1old");
        h.node.expire(&invoice);
        h.node.fail_create(true);
        h.publish(&config("addr1", &invoice));

        let outcome = h.sync.sync_once(&enabled(&[&invoice])).await;

        assert_eq!(outcome, SyncOutcome::Updated(config("addr1", &invoice)));
        assert_eq!(h.writes(), 1);

        let requests = h.node.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount_sats, 0);
        assert_eq!(requests[0].description, "");
        assert_eq!(requests[0].expiry_delta_secs, 604_800);
    }

    #[tokio::test]
    async fn test_failed_renewal_with_omit_policy() {
        let h = Harness::new(SyncConfig::default().with_invoice_fallback(InvoiceFallback::Omit));
        let invoice = h.node.add_invoice("lnbc1old");
        h.node.expire(&invoice);
        h.node.fail_create(true);
        h.publish(&config("addr1", &invoice));

        h.sync.sync_once(&enabled(&[&invoice])).await;

        assert_eq!(h.published().find(LIGHTNING_INVOICE), None);
        assert_eq!(h.published().find("p2wpkh"), Some("addr1"));
    }

    #[tokio::test]
    async fn test_paid_invoice_is_replaced() {
        let h = Harness::new(SyncConfig::default());
        let invoice = h.node.add_invoice("lnbc1paid");
        h.publish(&config("addr1", &invoice));

        // no longer in the unpaid set
        let outcome = h.sync.sync_once(&enabled(&[])).await;

        assert_eq!(outcome, SyncOutcome::Updated(config("addr1", "lnbc1mock0")));
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let h = Harness::new(SyncConfig::default());

        let first = h.sync.sync_once(&enabled(&[])).await;
        let SyncOutcome::Updated(published) = first else {
            panic!("expected a write, got {first:?}");
        };
        let invoice = published.find(LIGHTNING_INVOICE).unwrap().to_string();
        let bytes = h.published_bytes();

        let second = h.sync.sync_once(&enabled(&[&invoice])).await;
        assert_eq!(second, SyncOutcome::Unchanged);
        assert_eq!(h.published_bytes(), bytes);
        assert_eq!(h.writes(), 1);
    }

    #[tokio::test]
    async fn test_disabled_teardown() {
        let h = Harness::new(SyncConfig::default());
        let disabled = SyncContext::default();

        assert_eq!(h.sync.sync_once(&disabled).await, SyncOutcome::Unchanged);
        assert_eq!(h.writes(), 0);

        h.publish(&config("addr1", "lnbc1"));
        assert_eq!(h.sync.sync_once(&disabled).await, SyncOutcome::Cleared);
        assert!(h.published().is_empty());
        assert_eq!(h.wallet.calls(), 0);

        assert_eq!(h.sync.sync_once(&disabled).await, SyncOutcome::Unchanged);
        assert_eq!(h.writes(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_document_is_empty() {
        let h = Harness::new(SyncConfig::default());
        h.store
            .write_file(&h.store.owner(), SLASHPAY_PATH, b"not json".to_vec());

        let outcome = h.sync.sync_once(&enabled(&[])).await;
        assert_eq!(outcome, SyncOutcome::Updated(config("addr1", "lnbc1mock0")));
    }

    #[tokio::test]
    async fn test_wallet_failure_keeps_address() {
        let h = Harness::new(SyncConfig::default());
        let invoice = h.node.add_invoice("lnbc1abc");
        h.publish(&config("addr1", &invoice));
        h.wallet.set_failing();

        assert_eq!(
            h.sync.sync_once(&enabled(&[&invoice])).await,
            SyncOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_not_raised() {
        let h = Harness::new(SyncConfig::default());
        h.store.fail_writes(true);

        assert_eq!(
            h.sync.sync_once(&enabled(&[])).await,
            SyncOutcome::WriteFailed
        );
        assert_eq!(h.sessions(), 0);
    }

    #[tokio::test]
    async fn test_detached_is_not_ready() {
        let h = Harness::new(SyncConfig::default());
        h.sync.detach();

        assert_eq!(
            h.sync.sync_once(&enabled(&[])).await,
            SyncOutcome::NotReady
        );
        assert_eq!(h.store.open_count(&h.store.owner()), 0);
    }

    #[tokio::test]
    async fn test_closed_store_is_not_ready() {
        let h = Harness::new(SyncConfig::default());
        h.store.close();

        assert_eq!(
            h.sync.sync_once(&enabled(&[])).await,
            SyncOutcome::NotReady
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_are_debounced() {
        let h = Harness::new(SyncConfig::default());

        h.sync.trigger(SyncContext::default());
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.sync.trigger(enabled(&[]));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(h.sync.is_pending());
        assert_eq!(h.writes(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!h.sync.is_pending());
        assert_eq!(h.writes(), 1);
        assert!(matches!(
            h.sync.last_outcome(),
            Some(SyncOutcome::Updated(_))
        ));
    }
}
