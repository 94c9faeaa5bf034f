//! Contacts command - bulk import and list contacts

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use slashsync_lib::notify::notify_sdk_error;
use slashsync_lib::url::format_identity_url;
use slashsync_lib::{ContactStore, DriveKey};

use super::ephemeral_identity;
use crate::ui::{self, TerminalNotifier};

pub async fn bulk(count: usize, verbose: bool) -> Result<()> {
    ui::header("Bulk Contacts");

    let (_store, slashtag) = ephemeral_identity();
    let contacts = ContactStore::new(slashtag, Arc::new(TerminalNotifier));

    let urls: Vec<String> = (0..count)
        .map(|_| format_identity_url(&DriveKey::random()))
        .collect();

    let saved = match contacts.save_bulk_contacts(&urls).await {
        Ok(saved) => saved,
        Err(err) => {
            notify_sdk_error(&TerminalNotifier, &err.to_string());
            return Err(err.into());
        }
    };
    ui::success(&format!("Saved {} contacts in one batch", saved));

    let listed = contacts.list_contacts().await?;
    if verbose {
        for record in &listed {
            println!(
                "  {} {}",
                record.profile.name.as_deref().unwrap_or("-").bold(),
                record.url.dimmed()
            );
        }
    }
    ui::key_value("Stored", &listed.len().to_string());

    Ok(())
}
