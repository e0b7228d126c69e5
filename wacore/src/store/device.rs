use crate::crypto::{KeyPair, SignedPreKey};
use crate::store::error::{Result, StoreError};
use crate::store::traits::*;
use crate::types::{Jid, SignalAddress};
use log::error;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Decides whether a failed storage action is retried.
///
/// Arguments: the device, a description of the action, the 1-based attempt
/// that just failed, and the error. Returning `true` retries.
pub type DatabaseErrorHandler = Arc<dyn Fn(&Device, &str, u32, &StoreError) -> bool + Send + Sync>;

/// The persisted part of a [`Device`]: keys, identifiers and profile strings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SerializableDevice {
    pub id: Option<Jid>,
    pub lid: Option<Jid>,
    pub registration_id: u32,
    pub noise_key: KeyPair,
    pub identity_key: KeyPair,
    pub signed_pre_key: SignedPreKey,
    pub adv_secret_key: [u8; 32],
    pub account: Option<Vec<u8>>,
    pub platform: String,
    pub business_name: String,
    pub push_name: String,
}

/// One linked device: its own key material plus handles to every store it
/// reads and writes through.
#[derive(Clone)]
pub struct Device {
    pub id: Option<Jid>,
    pub lid: Option<Jid>,
    pub registration_id: u32,
    pub noise_key: KeyPair,
    pub identity_key: KeyPair,
    pub signed_pre_key: SignedPreKey,
    pub adv_secret_key: [u8; 32],
    /// Serialized `ADVSignedDeviceIdentity`, kept opaque.
    pub account: Option<Vec<u8>>,
    pub platform: String,
    pub business_name: String,
    pub push_name: String,

    pub identities: Arc<dyn IdentityStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub pre_keys: Arc<dyn PreKeyStore>,
    pub sender_keys: Arc<dyn SenderKeyStore>,
    pub app_state_keys: Arc<dyn AppStateSyncKeyStore>,
    pub app_state: Arc<dyn AppStateStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub chat_settings: Arc<dyn ChatSettingsStore>,
    pub msg_secrets: Arc<dyn MsgSecretStore>,
    pub privacy_tokens: Arc<dyn PrivacyTokenStore>,
    pub lids: Arc<dyn LidStore>,
    pub container: Arc<dyn DeviceContainer>,

    pub database_error_handler: Option<DatabaseErrorHandler>,
}

impl Device {
    /// Creates a new, unregistered device with fresh keys.
    pub fn new<S>(
        stores: Arc<S>,
        lids: Arc<dyn LidStore>,
        container: Arc<dyn DeviceContainer>,
    ) -> Self
    where
        S: AllSessionSpecificStores + 'static,
    {
        let identity_key = KeyPair::new();
        let signed_pre_key = identity_key.create_signed_prekey(1);
        let mut adv_secret_key = [0u8; 32];
        rand::rng().fill_bytes(&mut adv_secret_key);

        Self {
            id: None,
            lid: None,
            registration_id: rand::rng().random_range(1..=16380),
            noise_key: KeyPair::new(),
            identity_key,
            signed_pre_key,
            adv_secret_key,
            account: None,
            platform: String::new(),
            business_name: String::new(),
            push_name: String::new(),

            identities: stores.clone(),
            sessions: stores.clone(),
            pre_keys: stores.clone(),
            sender_keys: stores.clone(),
            app_state_keys: stores.clone(),
            app_state: stores.clone(),
            contacts: stores.clone(),
            chat_settings: stores.clone(),
            msg_secrets: stores.clone(),
            privacy_tokens: stores,
            lids,
            container,

            database_error_handler: None,
        }
    }

    pub fn with_error_handler(mut self, handler: DatabaseErrorHandler) -> Self {
        self.database_error_handler = Some(handler);
        self
    }

    pub fn to_serializable(&self) -> SerializableDevice {
        SerializableDevice {
            id: self.id.clone(),
            lid: self.lid.clone(),
            registration_id: self.registration_id,
            noise_key: self.noise_key.clone(),
            identity_key: self.identity_key.clone(),
            signed_pre_key: self.signed_pre_key.clone(),
            adv_secret_key: self.adv_secret_key,
            account: self.account.clone(),
            platform: self.platform.clone(),
            business_name: self.business_name.clone(),
            push_name: self.push_name.clone(),
        }
    }

    pub fn load_from_serializable(&mut self, loaded: SerializableDevice) {
        self.id = loaded.id;
        self.lid = loaded.lid;
        self.registration_id = loaded.registration_id;
        self.noise_key = loaded.noise_key;
        self.identity_key = loaded.identity_key;
        self.signed_pre_key = loaded.signed_pre_key;
        self.adv_secret_key = loaded.adv_secret_key;
        self.account = loaded.account;
        self.platform = loaded.platform;
        self.business_name = loaded.business_name;
        self.push_name = loaded.push_name;
    }

    /// The phone-number JID, or the empty JID when unset or deleted.
    pub fn get_jid(&self) -> Jid {
        self.id.clone().unwrap_or_default()
    }

    /// The LID, or the empty JID when unset or deleted.
    pub fn get_lid(&self) -> Jid {
        self.lid.clone().unwrap_or_default()
    }

    fn require_jid(&self) -> Result<&Jid> {
        self.id.as_ref().ok_or(StoreError::DeviceIdMustBeSet)
    }

    /// Signal address of this device's own account.
    pub fn own_signal_address(&self) -> Result<SignalAddress> {
        self.require_jid().map(SignalAddress::from_jid)
    }

    /// Inserts or updates this record in its container.
    pub async fn save(&self) -> Result<()> {
        self.require_jid()?;
        self.container.put_device(self).await
    }

    /// Removes this record from its container and clears the addressing
    /// fields. Keys stay readable but addressed operations fail afterwards.
    pub async fn delete(&mut self) -> Result<()> {
        self.require_jid()?;
        let container = self.container.clone();
        container.delete_device(self).await?;
        self.id = None;
        self.lid = None;
        Ok(())
    }

    /// Consults the configured handler, or logs and gives up when there is
    /// none.
    pub fn handle_database_error(&self, attempt: u32, err: &StoreError, action: &str) -> bool {
        match &self.database_error_handler {
            Some(handler) => handler(self, action, attempt, err),
            None => {
                error!("Failed to {action}: {err}");
                false
            }
        }
    }

    /// Runs `op`, retrying transient failures for as long as the error
    /// handler asks to. Non-transient errors are returned immediately.
    pub async fn with_retry<T, F, Fut>(&self, action: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if !self.handle_database_error(attempt, &err, action) {
                        return Err(err);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("lid", &self.lid)
            .field("registration_id", &self.registration_id)
            .field("platform", &self.platform)
            .field("push_name", &self.push_name)
            .finish_non_exhaustive()
    }
}
