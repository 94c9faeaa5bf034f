//! Sync command - scripted slashpay.json scenario against mock wallet state

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use slashsync_lib::drive::MemoryDriveStore;
use slashsync_lib::models::LIGHTNING_INVOICE;
use slashsync_lib::test_utils::{MockLightningNode, MockWallet, TestFixtures};
use slashsync_lib::wallet::AddressType;
use slashsync_lib::{
    ContactStore, DriveKey, InvoiceFallback, PaymentConfig, PaymentConfigSynchronizer, Slashtag,
    SyncConfig, SyncContext, SyncOutcome,
};

use super::ephemeral_identity;
use crate::ui::{self, TerminalNotifier};

/// What changes between the first run and the debounced one.
pub struct Scenario {
    pub address_type: AddressType,
    pub new_address: Option<String>,
    pub expire_invoice: bool,
    pub fail_invoice: bool,
    pub disable: bool,
    pub omit_stale: bool,
    pub debounce_ms: u64,
}

pub async fn run(scenario: Scenario, verbose: bool) -> Result<()> {
    ui::header("slashpay.json Sync");

    let (store, slashtag) = ephemeral_identity();
    let wallet = Arc::new(MockWallet::new(TestFixtures::MAINNET_ADDRESSES[0]));
    let node = Arc::new(MockLightningNode::new());

    let fallback = if scenario.omit_stale {
        InvoiceFallback::Omit
    } else {
        InvoiceFallback::KeepPrevious
    };
    let config = SyncConfig::default()
        .with_debounce_ms(scenario.debounce_ms)
        .with_invoice_fallback(fallback);
    let sync = PaymentConfigSynchronizer::new(wallet.clone(), node.clone(), config);
    sync.attach(slashtag.clone());

    let mut ctx = SyncContext {
        offline_payments: true,
        selected_wallet: "wallet0".into(),
        address_type: scenario.address_type,
        ..SyncContext::default()
    };

    ui::info("Initial run");
    let outcome = sync.sync_once(&ctx).await;
    report(&outcome);
    let published = match outcome {
        SyncOutcome::Updated(config) => config,
        other => anyhow::bail!("Initial sync did not publish a config: {:?}", other),
    };
    let invoice = published.find(LIGHTNING_INVOICE).map(str::to_string);
    ctx.unpaid_invoices.extend(invoice.clone());

    if let Some(address) = &scenario.new_address {
        wallet.set_address(address.clone());
        ui::info(&format!("Wallet now receives on {}", address));
    }
    if scenario.expire_invoice {
        let invoice = invoice.as_deref().context("No invoice was published")?;
        node.expire(invoice);
        ui::info("Published invoice expired");
    }
    if scenario.fail_invoice {
        node.fail_create(true);
        ui::info("Lightning node stops creating invoices");
    }
    if scenario.disable {
        ctx.offline_payments = false;
        ui::info("Offline payments disabled");
    }

    ui::separator();
    ui::info(&format!(
        "Debounced run in {} ms",
        sync.config().debounce().as_millis()
    ));
    sync.trigger(ctx);
    let spinner = ui::spinner("Waiting for the quiet period...");
    let mut outcome = None;
    for _ in 0..(scenario.debounce_ms / 20 + 250) {
        outcome = sync.last_outcome();
        if outcome.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    spinner.finish_and_clear();
    report(&outcome.context("Debounced run never completed")?);

    if verbose {
        ui::key_value("Invoice requests", &node.requests().len().to_string());
        ui::key_value("Address lookups", &wallet.calls().to_string());
    }

    ui::separator();
    let seen = peer_view(&store, &slashtag).await?;
    ui::info("Published document as seen by a peer:");
    ui::json(&serde_json::to_value(&seen)?);

    Ok(())
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::NotReady => ui::warning("Identity not ready, nothing synced"),
        SyncOutcome::Unchanged => ui::success("Already up to date, nothing written"),
        SyncOutcome::Cleared => ui::success("Offline payments disabled, document cleared"),
        SyncOutcome::Updated(config) => {
            ui::success(&format!("Published {} entries", config.len()));
            for entry in config.entries() {
                ui::key_value(&entry.kind, &entry.value);
            }
        }
        SyncOutcome::WriteFailed => ui::error("Writing slashpay.json failed"),
    }
}

async fn peer_view(
    store: &Arc<MemoryDriveStore>,
    slashtag: &Slashtag,
) -> Result<PaymentConfig> {
    let peer = Slashtag::new(Arc::new(store.peer(DriveKey::random())));
    let reader = ContactStore::new(peer, Arc::new(TerminalNotifier));
    Ok(reader
        .get_remote_pay_config(&slashtag.url().to_string())
        .await?)
}
