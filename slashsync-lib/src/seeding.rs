//! Best-effort seeding of an identity's drives.
//!
//! The relay keeps drives available while the owner is offline. For both the
//! public and the contacts drive, the drive key and its blobs key are POSTed
//! as `{"publicKey": "<hex>"}`; seeding succeeds only if every request gets
//! a 200.

use futures::future::join_all;
use serde::Serialize;

use crate::config::SeedingConfig;
use crate::drive::{DriveRef, DriveSession};
use crate::{DriveKey, Result, SlashError, Slashtag};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeedRequest {
    public_key: String,
}

/// HTTP client for the seeding relay.
pub struct SeedingClient {
    config: SeedingConfig,
    client: reqwest::Client,
}

impl SeedingClient {
    /// Create a client for the given relay configuration.
    pub fn new(config: SeedingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SlashError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a client from `SLASHSYNC_SEEDER_URL` or the default relay.
    pub fn from_env() -> Result<Self> {
        Self::new(SeedingConfig::from_env())
    }

    /// Get the configuration.
    pub fn config(&self) -> &SeedingConfig {
        &self.config
    }

    /// Seed the public and contacts drives of `slashtag`.
    ///
    /// Never fails: any unavailable drive, network error or non-200 response
    /// yields `false` and is logged. Sessions are released in every case.
    #[tracing::instrument(skip_all, fields(identity = %slashtag.key().id()))]
    pub async fn seed(&self, slashtag: &Slashtag) -> bool {
        let sessions = slashtag.sessions();
        let (public, contacts) = futures::join!(
            sessions.acquire(DriveRef::Public),
            sessions.acquire(DriveRef::contacts()),
        );

        let mut opened = Vec::with_capacity(2);
        let mut failed = false;
        for acquired in [public, contacts] {
            match acquired {
                Ok(session) => opened.push(session),
                Err(err) => {
                    tracing::debug!(error = %err, "cannot seed, drive unavailable");
                    failed = true;
                }
            }
        }

        let seeded = if failed {
            false
        } else {
            join_all(opened.iter().map(|session| self.seed_drive(session)))
                .await
                .into_iter()
                .all(|result| match result {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::debug!(error = %err, "error in seeding drives request");
                        false
                    }
                })
        };

        for session in opened {
            session.release().await;
        }

        tracing::info!(seeded, "seeding finished");
        seeded
    }

    async fn seed_drive(&self, session: &DriveSession) -> Result<()> {
        let mut keys = vec![session.key()];
        match session.blobs_key().await? {
            Some(blobs) => keys.push(blobs),
            None => tracing::debug!(drive = %session.drive_ref(), "drive has no blobs core"),
        }

        for key in keys {
            self.seed_key(&key).await?;
        }
        Ok(())
    }

    /// POST one replication key to the relay.
    ///
    /// # Errors
    ///
    /// `SlashError::SeedingFailed` on network errors or any status but 200.
    pub async fn seed_key(&self, key: &DriveKey) -> Result<()> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&SeedRequest {
                public_key: key.to_hex(),
            })
            .send()
            .await
            .map_err(|e| SlashError::SeedingFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SlashError::SeedingFailed(format!(
                "relay answered {} for {}",
                status,
                key.to_hex()
            )));
        }
        Ok(())
    }
}
