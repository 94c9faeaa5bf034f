//! Contacts and profile storage.
//!
//! Contacts live on the private `contacts` drive, one JSON file per contact at
//! `/<id>`, where `<id>` is the z-base-32 id of the key in the contact's URL.
//! The own profile is `/profile.json` on the public drive. Remote profiles and
//! payment configs are read from other identities' public drives.
//!
//! Every operation first checks whether the storage layer is closed. Saves and
//! deletes are user-initiated, so their failures are also shown to the user
//! through the [`Notifier`].

use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;

use crate::drive::{DriveRef, DriveSession};
use crate::encoding::{to_data_url, zbase32_decode};
use crate::models::{BasicProfile, ContactRecord, PaymentConfig, PROFILE_PATH, SLASHPAY_PATH};
use crate::notify::Notifier;
use crate::url::{format_identity_url, parse};
use crate::{DriveKey, Result, SlashError, Slashtag};

const SAVE_CONTACT_ERROR: &str = "Error while saving contact: ";
const DELETE_CONTACT_ERROR: &str = "Error while deleting contact: ";
const SAVE_PROFILE_ERROR: &str = "Error while saving profile: ";

/// Storage path of the contact identified by `url`.
///
/// Depends only on the key in the URL, so every URL naming the same identity
/// maps to the same file.
///
/// # Errors
///
/// `SlashError::InvalidUrl` if `url` does not parse.
pub fn contact_path(url: &str) -> Result<String> {
    Ok(format!("/{}", parse(url)?.id()))
}

/// Inverse of [`contact_path`]: the identity URL stored at `path`.
fn url_from_path(path: &str) -> Option<String> {
    let bytes = zbase32_decode(path.strip_prefix('/')?)?;
    let key: [u8; 32] = bytes.try_into().ok()?;
    Some(format_identity_url(&DriveKey(key)))
}

/// Treat a stored document that fails to decode as absent.
fn absent_if_undecodable<T>(path: &str, decoded: Result<Option<T>>) -> Result<Option<T>> {
    match decoded {
        Err(SlashError::DecodeFailed { reason, .. }) => {
            tracing::debug!(path, %reason, "ignoring undecodable document");
            Ok(None)
        }
        other => other,
    }
}

/// Read a binary file and return it as a `data:` URL.
///
/// Returns `Ok(None)` if the file does not exist.
pub async fn read_as_data_url(session: &DriveSession, path: &str) -> Result<Option<String>> {
    Ok(session
        .get(path)
        .await?
        .map(|bytes| to_data_url(path, &bytes)))
}

/// Contact and profile operations for one identity.
pub struct ContactStore {
    slashtag: Slashtag,
    notifier: Arc<dyn Notifier>,
}

impl ContactStore {
    /// Create a store for `slashtag`, reporting failures to `notifier`.
    pub fn new(slashtag: Slashtag, notifier: Arc<dyn Notifier>) -> Self {
        Self { slashtag, notifier }
    }

    /// The identity this store works on.
    pub fn slashtag(&self) -> &Slashtag {
        &self.slashtag
    }

    async fn acquire(&self, drive_ref: DriveRef) -> Result<DriveSession> {
        self.slashtag.sessions().acquire(drive_ref).await
    }

    fn report<T>(&self, title: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, "{}", title.trim_end_matches([':', ' ']));
            self.notifier.notify_error(title, &err.reason());
        }
        result
    }

    /// Save `profile` as the contact for `url`, replacing any existing record.
    #[tracing::instrument(skip(self, profile))]
    pub async fn save_contact(&self, url: &str, profile: &BasicProfile) -> Result<()> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let result = self.write_contact(url, profile).await;
        self.report(SAVE_CONTACT_ERROR, result)
    }

    async fn write_contact(&self, url: &str, profile: &BasicProfile) -> Result<()> {
        let path = contact_path(url)?;
        let session = self.acquire(DriveRef::contacts()).await?;
        let written = session.put_json(&path, profile).await;
        session.release().await;
        written.map_err(|err| SlashError::write_failed(path, err.reason()))
    }

    /// Delete the contact for `url`. Deleting a missing contact succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete_contact(&self, url: &str) -> Result<()> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let result = self.remove_contact(url).await;
        self.report(DELETE_CONTACT_ERROR, result)
    }

    async fn remove_contact(&self, url: &str) -> Result<()> {
        let path = contact_path(url)?;
        let session = self.acquire(DriveRef::contacts()).await?;
        let deleted = session.del(&path).await;
        session.release().await;
        deleted.map_err(|err| SlashError::write_failed(path, err.reason()))
    }

    /// Load the contact for `url`.
    pub async fn get_contact(&self, url: &str) -> Result<Option<ContactRecord>> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let path = contact_path(url)?;

        let session = self.acquire(DriveRef::contacts()).await?;
        let decoded = session.get_json::<BasicProfile>(&path).await;
        session.release().await;

        let record = absent_if_undecodable(&path, decoded)?.map(|profile| ContactRecord {
            url: url_from_path(&path).unwrap_or_else(|| url.to_string()),
            profile,
        });
        Ok(record)
    }

    /// Every contact on the contacts drive, in path order.
    ///
    /// Files that do not decode or whose name is not a key id are skipped.
    pub async fn list_contacts(&self) -> Result<Vec<ContactRecord>> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let session = self.acquire(DriveRef::contacts()).await?;
        let records = collect_contacts(&session).await;
        session.release().await;
        records
    }

    /// Save many contacts in one atomic batch.
    ///
    /// Each contact gets a random six hex digit name. Nothing is written if
    /// any URL is invalid. Returns the number of contacts written.
    #[tracing::instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn save_bulk_contacts<S: AsRef<str>>(&self, urls: &[S]) -> Result<usize> {
        self.slashtag.check_closed(self.notifier.as_ref())?;

        let records = {
            let mut rng = rand::thread_rng();
            urls.iter()
                .map(|url| {
                    let name = format!("{:06x}", rng.gen_range(0..0x0100_0000u32));
                    Ok((contact_path(url.as_ref())?, BasicProfile::named(name)))
                })
                .collect::<Result<Vec<_>>>()?
        };

        tracing::debug!("saving bulk contacts");
        let session = self.acquire(DriveRef::contacts()).await?;
        let written = stage_and_flush(&session, &records).await;
        session.release().await;
        written?;

        tracing::info!(count = records.len(), "saved bulk contacts");
        Ok(records.len())
    }

    /// Write the own profile to `/profile.json`.
    #[tracing::instrument(skip_all)]
    pub async fn save_profile(&self, profile: &BasicProfile) -> Result<()> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let result = self.write_profile(profile).await;
        self.report(SAVE_PROFILE_ERROR, result)
    }

    async fn write_profile(&self, profile: &BasicProfile) -> Result<()> {
        let session = self.acquire(DriveRef::Public).await?;
        let written = session.put_json(PROFILE_PATH, profile).await;
        session.release().await;
        written.map_err(|err| SlashError::write_failed(PROFILE_PATH, err.reason()))
    }

    /// The own profile, if one has been saved.
    pub async fn get_profile(&self) -> Result<Option<BasicProfile>> {
        self.slashtag.check_closed(self.notifier.as_ref())?;
        let session = self.acquire(DriveRef::Public).await?;
        let decoded = session.get_json(PROFILE_PATH).await;
        session.release().await;
        absent_if_undecodable(PROFILE_PATH, decoded)
    }

    /// Append a link to the own profile and save it.
    pub async fn add_profile_link(&self, title: &str, url: &str) -> Result<BasicProfile> {
        let profile = self
            .get_profile()
            .await?
            .unwrap_or_default()
            .with_link(title, url);
        self.save_profile(&profile).await?;
        Ok(profile)
    }

    /// Read the profile published by the identity behind `url`.
    ///
    /// An unreachable drive or a closed store yields `None`.
    pub async fn get_remote_profile(&self, url: &str) -> Result<Option<BasicProfile>> {
        let key = parse(url)?.key;
        self.read_remote(key, PROFILE_PATH).await
    }

    /// Read the payment config published by the identity behind `url`.
    ///
    /// An unreachable drive, a closed store or a malformed document yields
    /// the empty config.
    pub async fn get_remote_pay_config(&self, url: &str) -> Result<PaymentConfig> {
        let key = parse(url)?.key;
        Ok(self
            .read_remote::<PaymentConfig>(key, SLASHPAY_PATH)
            .await?
            .unwrap_or_default())
    }

    async fn read_remote<T: serde::de::DeserializeOwned>(
        &self,
        key: DriveKey,
        path: &str,
    ) -> Result<Option<T>> {
        if self.slashtag.is_closed() {
            tracing::debug!(path, "skipping remote read, store is closed");
            return Ok(None);
        }

        let session = match self.acquire(DriveRef::Remote(key)).await {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(remote = %key.id(), error = %err, "remote drive unavailable");
                return Ok(None);
            }
        };
        let decoded = session.get_json(path).await;
        session.release().await;

        match absent_if_undecodable(path, decoded) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!(remote = %key.id(), path, error = %err, "remote read failed");
                Ok(None)
            }
        }
    }
}

async fn collect_contacts(session: &DriveSession) -> Result<Vec<ContactRecord>> {
    let mut records = Vec::new();
    for path in session.list("/").await? {
        let Some(url) = url_from_path(&path) else {
            tracing::debug!(%path, "skipping file that is not a contact");
            continue;
        };
        match absent_if_undecodable(&path, session.get_json::<BasicProfile>(&path).await)? {
            Some(profile) => records.push(ContactRecord { url, profile }),
            None => continue,
        }
    }
    Ok(records)
}

async fn stage_and_flush(session: &DriveSession, records: &[(String, BasicProfile)]) -> Result<()> {
    let batch = session.batch();
    join_all(
        records
            .iter()
            .map(|(path, profile)| batch.put_json(path, profile)),
    )
    .await
    .into_iter()
    .collect::<Result<Vec<()>>>()?;
    batch.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::MemoryDriveStore;
    use crate::test_utils::{test_url, RecordingNotifier};

    fn setup() -> (Arc<MemoryDriveStore>, Arc<RecordingNotifier>, ContactStore) {
        let store = Arc::new(MemoryDriveStore::random());
        let notifier = Arc::new(RecordingNotifier::new());
        let contacts = ContactStore::new(Slashtag::new(store.clone()), notifier.clone());
        (store, notifier, contacts)
    }

    #[test]
    fn test_contact_path_ignores_url_decoration() {
        let key = DriveKey([7; 32]);
        let plain = format_identity_url(&key);
        let decorated = format!("slash://{}/profile.json?relay=x#frag", key.id());

        assert_eq!(contact_path(&plain).unwrap(), format!("/{}", key.id()));
        assert_eq!(contact_path(&plain).unwrap(), contact_path(&decorated).unwrap());
        assert!(contact_path("https://example.com").is_err());
    }

    #[tokio::test]
    async fn test_save_get_delete_contact() {
        let (store, notifier, contacts) = setup();
        let url = test_url();

        contacts
            .save_contact(&url, &BasicProfile::named("Alice"))
            .await
            .unwrap();
        let record = contacts.get_contact(&url).await.unwrap().unwrap();
        assert_eq!(record.url, url);
        assert_eq!(record.profile.name.as_deref(), Some("Alice"));

        contacts.delete_contact(&url).await.unwrap();
        assert!(contacts.get_contact(&url).await.unwrap().is_none());

        assert!(notifier.is_empty());
        assert_eq!(
            contacts.slashtag().sessions().open_sessions(&DriveRef::contacts()),
            0
        );
        let contacts_key = store.named_key("contacts");
        assert_eq!(store.open_count(&contacts_key), store.close_count(&contacts_key));
    }

    #[tokio::test]
    async fn test_save_contact_failure_notifies() {
        let (store, notifier, contacts) = setup();
        store.fail_writes(true);

        let err = contacts
            .save_contact(&test_url(), &BasicProfile::named("Bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, SlashError::WriteFailed { .. }));

        let seen = notifier.notifications();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Error while saving contact: ");
        assert_eq!(seen[0].1, "injected write failure");
        assert_eq!(
            contacts.slashtag().sessions().open_sessions(&DriveRef::contacts()),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_failure_notifies() {
        let (store, notifier, contacts) = setup();
        store.fail_writes(true);

        assert!(contacts.delete_contact(&test_url()).await.is_err());
        assert_eq!(notifier.notifications()[0].0, "Error while deleting contact: ");
    }

    #[tokio::test]
    async fn test_closed_store_notifies_restart() {
        let (store, notifier, contacts) = setup();
        store.close();

        let err = contacts
            .save_contact(&test_url(), &BasicProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlashError::StorageClosed));
        assert_eq!(
            notifier.notifications(),
            vec![("SDK is closed".to_string(), "please restart Bitkit!".to_string())]
        );
    }

    #[tokio::test]
    async fn test_bulk_contacts_single_commit() {
        let (store, _, contacts) = setup();
        let urls: Vec<String> = (0..25).map(|_| test_url()).collect();

        assert_eq!(contacts.save_bulk_contacts(&urls).await.unwrap(), 25);
        assert_eq!(store.write_count(&store.named_key("contacts")), 1);

        let listed = contacts.list_contacts().await.unwrap();
        assert_eq!(listed.len(), 25);
        for record in &listed {
            let name = record.profile.name.as_deref().unwrap();
            assert_eq!(name.len(), 6);
            assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(urls.contains(&record.url));
        }
    }

    #[tokio::test]
    async fn test_bulk_contacts_rejects_invalid_url() {
        let (store, _, contacts) = setup();
        let urls = vec![test_url(), "slash:nope".to_string()];

        assert!(matches!(
            contacts.save_bulk_contacts(&urls).await,
            Err(SlashError::InvalidUrl { .. })
        ));
        assert_eq!(store.write_count(&store.named_key("contacts")), 0);
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let (store, _, contacts) = setup();
        let url = test_url();
        contacts
            .save_contact(&url, &BasicProfile::named("Carol"))
            .await
            .unwrap();

        let drive = store.named_key("contacts");
        store.write_file(&drive, "/notes.txt", b"hello".to_vec());
        let broken = format!("/{}", DriveKey([9; 32]).id());
        store.write_file(&drive, &broken, b"{not json".to_vec());

        let listed = contacts.list_contacts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].url, url);
    }

    #[tokio::test]
    async fn test_profile_links_accumulate() {
        let (_, _, contacts) = setup();
        contacts
            .save_profile(&BasicProfile::named("Dave"))
            .await
            .unwrap();

        contacts.add_profile_link("web", "https://a").await.unwrap();
        let profile = contacts.add_profile_link("x", "@dave").await.unwrap();
        assert_eq!(profile.links.len(), 2);

        let stored = contacts.get_profile().await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Dave"));
        assert_eq!(stored.links[1].title, "x");
    }

    #[tokio::test]
    async fn test_remote_reads() {
        let (store, _, contacts) = setup();
        let remote = DriveKey::random();
        store.write_file(&remote, PROFILE_PATH, br#"{"name":"Eve"}"#.to_vec());
        store.write_file(
            &remote,
            SLASHPAY_PATH,
            br#"[{"type":"p2wpkh","value":"bc1q"}]"#.to_vec(),
        );
        let url = format_identity_url(&remote);

        let profile = contacts.get_remote_profile(&url).await.unwrap().unwrap();
        assert_eq!(profile.name.as_deref(), Some("Eve"));
        let config = contacts.get_remote_pay_config(&url).await.unwrap();
        assert_eq!(config.find("p2wpkh"), Some("bc1q"));

        let unreachable = DriveKey::random();
        store.set_unreachable(unreachable);
        let url = format_identity_url(&unreachable);
        assert!(contacts.get_remote_pay_config(&url).await.unwrap().is_empty());
        assert!(contacts.get_remote_profile(&url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_as_data_url() {
        let (store, _, contacts) = setup();
        store.write_file(&store.owner(), "/avatar.png", vec![0x89, b'P', b'N', b'G']);

        let session = contacts
            .slashtag()
            .sessions()
            .acquire(DriveRef::Public)
            .await
            .unwrap();
        let url = read_as_data_url(&session, "/avatar.png").await.unwrap().unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw==");
        assert!(read_as_data_url(&session, "/missing.png")
            .await
            .unwrap()
            .is_none());
        session.release().await;
    }
}
