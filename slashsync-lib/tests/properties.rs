//! Property tests for contact paths and payment config reconciliation.

use std::collections::HashSet;

use proptest::prelude::*;

use slashsync_lib::config::InvoiceFallback;
use slashsync_lib::contacts::contact_path;
use slashsync_lib::models::LIGHTNING_INVOICE;
use slashsync_lib::payconfig::{
    assemble, reconcile, InvoiceCheck, ReconcileInputs, Reconciliation,
};
use slashsync_lib::url::format_identity_url;
use slashsync_lib::wallet::AddressType;
use slashsync_lib::{DriveKey, PaymentConfig, PaymentConfigEntry};

fn arb_key() -> impl Strategy<Value = DriveKey> {
    any::<[u8; 32]>().prop_map(DriveKey)
}

fn arb_address_type() -> impl Strategy<Value = AddressType> {
    prop::sample::select(vec![
        AddressType::P2pkh,
        AddressType::P2sh,
        AddressType::P2wpkh,
        AddressType::P2tr,
    ])
}

fn arb_entries() -> impl Strategy<Value = Vec<PaymentConfigEntry>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["p2pkh", "p2sh", "p2wpkh", "p2tr", LIGHTNING_INVOICE]),
            "[a-z0-9]{1,12}",
        )
            .prop_map(|(kind, value)| PaymentConfigEntry::new(kind, value)),
        0..8,
    )
}

fn arb_check() -> impl Strategy<Value = InvoiceCheck> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(still_unpaid, decodes, expired)| {
        InvoiceCheck {
            still_unpaid,
            decodes,
            expired,
        }
    })
}

fn arb_fallback() -> impl Strategy<Value = InvoiceFallback> {
    prop::sample::select(vec![InvoiceFallback::KeepPrevious, InvoiceFallback::Omit])
}

fn assert_one_per_type(config: &PaymentConfig) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for entry in config.entries() {
        prop_assert!(seen.insert(entry.kind.clone()), "duplicate type {}", entry.kind);
    }
    Ok(())
}

proptest! {
    #[test]
    fn contact_path_is_pure_and_injective(a in arb_key(), b in arb_key()) {
        let url_a = format_identity_url(&a);
        let url_b = format_identity_url(&b);

        prop_assert_eq!(contact_path(&url_a).unwrap(), contact_path(&url_a).unwrap());
        if a != b {
            prop_assert_ne!(contact_path(&url_a).unwrap(), contact_path(&url_b).unwrap());
        }
    }

    #[test]
    fn contact_path_depends_only_on_key(key in arb_key(), path in "(/[a-z]{1,8}){0,2}", query in "[a-z=]{0,8}") {
        let decorated = format!("slash://{}{}?{}#x", key.id(), path, query);
        prop_assert_eq!(
            contact_path(&decorated).unwrap(),
            contact_path(&format_identity_url(&key)).unwrap()
        );
    }

    #[test]
    fn from_entries_keeps_one_per_type(entries in arb_entries()) {
        let config = PaymentConfig::from_entries(entries.clone());
        assert_one_per_type(&config)?;

        let kinds: HashSet<_> = entries.iter().map(|e| e.kind.clone()).collect();
        prop_assert_eq!(config.len(), kinds.len());
    }

    #[test]
    fn assembled_config_is_well_formed(
        entries in arb_entries(),
        address_type in arb_address_type(),
        receive_address in proptest::option::of("[a-z0-9]{4,10}"),
        check in arb_check(),
        created in proptest::option::of("lnbc[0-9]{4}"),
        fallback in arb_fallback(),
    ) {
        let current = PaymentConfig::from_entries(entries);
        let inputs = ReconcileInputs {
            offline_payments: true,
            address_type,
            receive_address,
            invoice: check,
        };

        let Reconciliation::Plan(plan) = reconcile(&current, &inputs) else {
            return Err(TestCaseError::fail("enabled inputs must yield a plan"));
        };
        let config = assemble(&plan, created, fallback);

        assert_one_per_type(&config)?;
        prop_assert!(config.len() <= 2);
        if let Some(first) = config.entries().first() {
            if config.len() == 2 {
                prop_assert_eq!(first.kind.as_str(), address_type.as_str());
            }
        }
    }

    #[test]
    fn second_run_with_same_state_is_clean(
        entries in arb_entries(),
        address_type in arb_address_type(),
        receive_address in proptest::option::of("[a-z0-9]{4,10}"),
        check in arb_check(),
        created in proptest::option::of("lnbc[0-9]{4}"),
        fallback in arb_fallback(),
    ) {
        let current = PaymentConfig::from_entries(entries);
        let inputs = ReconcileInputs {
            offline_payments: true,
            address_type,
            receive_address,
            invoice: check,
        };
        let Reconciliation::Plan(plan) = reconcile(&current, &inputs) else {
            return Err(TestCaseError::fail("enabled inputs must yield a plan"));
        };
        let written = assemble(&plan, created, fallback);
        prop_assume!(written.find(LIGHTNING_INVOICE).is_some());

        // the published invoice is now known, unpaid and valid
        let again = ReconcileInputs {
            invoice: InvoiceCheck { still_unpaid: true, decodes: true, expired: false },
            ..inputs
        };
        let Reconciliation::Plan(replan) = reconcile(&written, &again) else {
            return Err(TestCaseError::fail("enabled inputs must yield a plan"));
        };
        prop_assert!(!replan.dirty);
        prop_assert_eq!(assemble(&replan, None, fallback), written);
    }

    #[test]
    fn disabled_clears_anything(entries in arb_entries(), address_type in arb_address_type()) {
        let current = PaymentConfig::from_entries(entries);
        let expected = if current.is_empty() {
            Reconciliation::Noop
        } else {
            Reconciliation::Clear
        };
        prop_assert_eq!(reconcile(&current, &ReconcileInputs::disabled(address_type)), expected);
    }
}
