//! Whoami command - show a freshly generated identity

use anyhow::Result;

use super::ephemeral_identity;
use crate::ui;

pub async fn run(verbose: bool) -> Result<()> {
    ui::header("Ephemeral Identity");

    let (store, slashtag) = ephemeral_identity();
    ui::key_value("URL", &slashtag.url().to_string());
    ui::key_value("Key", &slashtag.key().to_hex());

    if verbose {
        ui::key_value("Contacts drive", &store.named_key("contacts").to_hex());
    }

    Ok(())
}
