//! Seed command - push a fresh identity's drives to the seeding relay

use anyhow::{Context, Result};
use slashsync_lib::{SeedingClient, SeedingConfig};

use super::ephemeral_identity;
use crate::ui;

pub async fn run(endpoint: Option<String>, timeout_secs: u64, verbose: bool) -> Result<()> {
    ui::header("Seed Drives");

    let config = endpoint
        .map(SeedingConfig::new)
        .unwrap_or_else(SeedingConfig::from_env)
        .with_timeout(timeout_secs);
    let client = SeedingClient::new(config).context("Failed to create seeding client")?;
    ui::key_value("Relay", &client.config().endpoint);
    tracing::debug!(timeout_secs, "seeding client ready");

    let (_store, slashtag) = ephemeral_identity();
    if verbose {
        ui::key_value("Identity", &slashtag.url().to_string());
    }

    let spinner = ui::spinner("Seeding public and contacts drives...");
    let seeded = client.seed(&slashtag).await;
    spinner.finish_and_clear();

    if seeded {
        ui::success("All replication keys accepted by the relay");
    } else {
        ui::warning("Seeding failed; run with --verbose for details");
    }

    Ok(())
}
