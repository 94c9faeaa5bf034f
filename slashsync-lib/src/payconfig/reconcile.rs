//! Decision logic for `/slashpay.json`.
//!
//! Everything here is pure: the synchronizer gathers wallet and Lightning
//! state, [`reconcile`] decides what the document should become, and
//! [`assemble`] builds it once a requested invoice has (or has not) been
//! created.

use crate::config::InvoiceFallback;
use crate::models::{PaymentConfig, PaymentConfigEntry, LIGHTNING_INVOICE};
use crate::wallet::AddressType;

/// What is known about the currently published invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceCheck {
    /// The invoice is among the unpaid invoices known locally.
    pub still_unpaid: bool,
    /// The invoice decoded successfully.
    pub decodes: bool,
    /// The decoded invoice is expired.
    pub expired: bool,
}

impl InvoiceCheck {
    /// True if the invoice can stay published as is.
    pub fn is_current(&self) -> bool {
        self.still_unpaid && self.decodes && !self.expired
    }
}

/// Snapshot of the state a run reconciles against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileInputs {
    /// Whether offline payments are enabled.
    pub offline_payments: bool,
    /// The wallet's selected address type.
    pub address_type: AddressType,
    /// Freshly fetched receive address, `None` if the fetch failed.
    pub receive_address: Option<String>,
    /// State of the published invoice. Ignored if none is published.
    pub invoice: InvoiceCheck,
}

impl ReconcileInputs {
    /// Inputs for a wallet with offline payments turned off.
    pub fn disabled(address_type: AddressType) -> Self {
        Self {
            offline_payments: false,
            address_type,
            receive_address: None,
            invoice: InvoiceCheck::default(),
        }
    }
}

/// Fate of the Lightning invoice entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoicePlan {
    /// Keep publishing this invoice.
    Keep(String),
    /// Request a new invoice. `previous` is the stale one, if any.
    Renew {
        /// Invoice published before this run
        previous: Option<String>,
    },
}

/// Reconciliation of an enabled config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Address entry to publish.
    pub address: Option<PaymentConfigEntry>,
    /// What to do with the invoice entry.
    pub invoice: InvoicePlan,
    /// Whether the document must be rewritten.
    pub dirty: bool,
}

impl Plan {
    /// True if a new invoice has to be requested.
    pub fn needs_invoice(&self) -> bool {
        matches!(self.invoice, InvoicePlan::Renew { .. })
    }
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Offline payments are off and nothing is published.
    Noop,
    /// Offline payments are off but entries are published: write `[]`.
    Clear,
    /// Offline payments are on.
    Plan(Plan),
}

/// Decide how `current` has to change given `inputs`.
///
/// The address entry is replaced when a fresh address was fetched and
/// differs from the published one; it is kept when the fetch failed. The
/// invoice entry is kept only if [`InvoiceCheck::is_current`] holds,
/// otherwise renewal is requested and the plan is dirty.
pub fn reconcile(current: &PaymentConfig, inputs: &ReconcileInputs) -> Reconciliation {
    if !inputs.offline_payments {
        return if current.is_empty() {
            Reconciliation::Noop
        } else {
            Reconciliation::Clear
        };
    }

    let mut dirty = false;
    let kind = inputs.address_type.as_str();

    let published = current.find(kind);
    let address = match (inputs.receive_address.as_deref(), published) {
        (Some(fresh), old) if old != Some(fresh) => {
            dirty = true;
            Some(PaymentConfigEntry::new(kind, fresh))
        }
        (_, Some(old)) => Some(PaymentConfigEntry::new(kind, old)),
        (_, None) => None,
    };

    let invoice = match current.find(LIGHTNING_INVOICE) {
        Some(old) if inputs.invoice.is_current() => InvoicePlan::Keep(old.to_string()),
        previous => {
            dirty = true;
            InvoicePlan::Renew {
                previous: previous.map(str::to_string),
            }
        }
    };

    Reconciliation::Plan(Plan {
        address,
        invoice,
        dirty,
    })
}

/// Build the document for `plan`.
///
/// `created` is the invoice obtained for a renewal, `None` if the request
/// failed; `fallback` then decides whether the stale invoice stays.
pub fn assemble(plan: &Plan, created: Option<String>, fallback: InvoiceFallback) -> PaymentConfig {
    let invoice = match &plan.invoice {
        InvoicePlan::Keep(value) => Some(value.clone()),
        InvoicePlan::Renew { previous } => match (created, fallback) {
            (Some(fresh), _) => Some(fresh),
            (None, InvoiceFallback::KeepPrevious) => previous.clone(),
            (None, InvoiceFallback::Omit) => None,
        },
    };

    PaymentConfig::from_entries(
        plan.address
            .iter()
            .cloned()
            .chain(invoice.map(PaymentConfigEntry::lightning_invoice)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: InvoiceCheck = InvoiceCheck {
        still_unpaid: true,
        decodes: true,
        expired: false,
    };

    fn stored(address: &str, invoice: &str) -> PaymentConfig {
        PaymentConfig::from_entries(vec![
            PaymentConfigEntry::new("p2wpkh", address),
            PaymentConfigEntry::lightning_invoice(invoice),
        ])
    }

    fn enabled(address: Option<&str>, invoice: InvoiceCheck) -> ReconcileInputs {
        ReconcileInputs {
            offline_payments: true,
            address_type: AddressType::P2wpkh,
            receive_address: address.map(str::to_string),
            invoice,
        }
    }

    fn plan(reconciliation: Reconciliation) -> Plan {
        match reconciliation {
            Reconciliation::Plan(plan) => plan,
            other => panic!("expected a plan, got {other:?}"),
        }
    }

    #[test]
    fn test_disabled() {
        let inputs = ReconcileInputs::disabled(AddressType::P2wpkh);
        assert_eq!(
            reconcile(&PaymentConfig::empty(), &inputs),
            Reconciliation::Noop
        );
        assert_eq!(
            reconcile(&stored("addr1", "lnbc1"), &inputs),
            Reconciliation::Clear
        );
    }

    #[test]
    fn test_unchanged_state_is_clean() {
        let current = stored("addr1", "lnbc1");
        let plan = plan(reconcile(&current, &enabled(Some("addr1"), VALID)));

        assert!(!plan.dirty);
        assert!(!plan.needs_invoice());
        assert_eq!(assemble(&plan, None, InvoiceFallback::KeepPrevious), current);
    }

    #[test]
    fn test_new_address_only_touches_address() {
        let current = stored("addr1", "lnbc1");
        let plan = plan(reconcile(&current, &enabled(Some("addr2"), VALID)));

        assert!(plan.dirty);
        assert_eq!(
            assemble(&plan, None, InvoiceFallback::KeepPrevious),
            stored("addr2", "lnbc1")
        );
    }

    #[test]
    fn test_failed_address_fetch_keeps_old() {
        let current = stored("addr1", "lnbc1");
        let plan = plan(reconcile(&current, &enabled(None, VALID)));
        assert!(!plan.dirty);
        assert_eq!(plan.address, Some(PaymentConfigEntry::new("p2wpkh", "addr1")));

        let fresh = self::plan(reconcile(&PaymentConfig::empty(), &enabled(None, VALID)));
        assert_eq!(fresh.address, None);
    }

    #[test]
    fn test_stale_invoice_renewed() {
        for check in [
            InvoiceCheck {
                expired: true,
                ..VALID
            },
            InvoiceCheck {
                still_unpaid: false,
                ..VALID
            },
            InvoiceCheck {
                decodes: false,
                ..VALID
            },
        ] {
            let plan = plan(reconcile(&stored("addr1", "lnbc1"), &enabled(Some("addr1"), check)));
            assert!(plan.dirty);
            assert_eq!(
                plan.invoice,
                InvoicePlan::Renew {
                    previous: Some("lnbc1".into())
                }
            );
            assert_eq!(
                assemble(&plan, Some("lnbc2".into()), InvoiceFallback::KeepPrevious),
                stored("addr1", "lnbc2")
            );
        }
    }

    #[test]
    fn test_failed_renewal_fallback() {
        let expired = InvoiceCheck {
            expired: true,
            ..VALID
        };
        let plan = plan(reconcile(&stored("addr1", "lnbc1"), &enabled(Some("addr1"), expired)));

        assert_eq!(
            assemble(&plan, None, InvoiceFallback::KeepPrevious),
            stored("addr1", "lnbc1")
        );
        assert_eq!(
            assemble(&plan, None, InvoiceFallback::Omit),
            PaymentConfig::from_entries(vec![PaymentConfigEntry::new("p2wpkh", "addr1")])
        );
    }

    #[test]
    fn test_missing_invoice_requested() {
        let plan = plan(reconcile(&PaymentConfig::empty(), &enabled(Some("addr1"), VALID)));
        assert!(plan.needs_invoice());

        let config = assemble(&plan, Some("lnbc9".into()), InvoiceFallback::KeepPrevious);
        assert_eq!(config.entries()[0].kind, "p2wpkh");
        assert_eq!(config.entries()[1].kind, LIGHTNING_INVOICE);
    }

    #[test]
    fn test_address_type_switch_drops_other_types() {
        let current = stored("addr1", "lnbc1");
        let inputs = ReconcileInputs {
            address_type: AddressType::P2tr,
            ..enabled(Some("bc1p"), VALID)
        };
        let plan = plan(reconcile(&current, &inputs));
        let config = assemble(&plan, None, InvoiceFallback::KeepPrevious);

        assert_eq!(config.find("p2tr"), Some("bc1p"));
        assert_eq!(config.find("p2wpkh"), None);
    }
}
