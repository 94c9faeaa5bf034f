//! Profile command - publish a profile and read it back as a peer

use std::sync::Arc;

use anyhow::{Context, Result};
use slashsync_lib::{BasicProfile, ContactStore, DriveKey, Slashtag};

use super::ephemeral_identity;
use crate::ui::{self, TerminalNotifier};

pub async fn run(
    name: &str,
    bio: Option<&str>,
    links: &[String],
    verbose: bool,
) -> Result<()> {
    ui::header("Profile");

    let (store, slashtag) = ephemeral_identity();
    let own = ContactStore::new(slashtag.clone(), Arc::new(TerminalNotifier));

    let mut profile = BasicProfile::named(name);
    if let Some(bio) = bio {
        profile = profile.with_bio(bio);
    }
    own.save_profile(&profile).await?;

    for link in links {
        let (title, url) = link
            .split_once('=')
            .context("Links must be given as title=url")?;
        own.add_profile_link(title, url).await?;
    }
    ui::success(&format!("Published profile for {}", slashtag.url()));

    // read it back through another identity on the same network
    let peer = Slashtag::new(Arc::new(store.peer(DriveKey::random())));
    let reader = ContactStore::new(peer, Arc::new(TerminalNotifier));
    let remote = reader
        .get_remote_profile(&slashtag.url().to_string())
        .await?
        .context("Profile not visible to peers")?;

    ui::key_value("Name", remote.name.as_deref().unwrap_or("-"));
    if let Some(bio) = &remote.bio {
        ui::key_value("Bio", bio);
    }
    for link in &remote.links {
        ui::key_value(&link.title, &link.url);
    }
    if verbose {
        ui::separator();
        ui::json(&serde_json::to_value(&remote)?);
    }

    Ok(())
}
