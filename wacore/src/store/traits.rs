use crate::crypto::PreKey;
use crate::store::error::Result;
use crate::types::{
    ContactEntry, ContactInfo, Jid, LocalChatSettings, MessageSecretInsert, PrivacyToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::collections::HashMap;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()>;
    /// Removes the identity of every device addressed under `phone`.
    async fn delete_all_identities(&self, phone: &str) -> Result<()>;
    async fn delete_identity(&self, address: &str) -> Result<()>;
    /// Trust-on-first-use: true when nothing is stored for `address` or the
    /// stored key equals `key`; false when a different key is stored.
    async fn is_trusted_identity(&self, address: &str, key: &[u8; 32]) -> Result<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>>;
    async fn has_session(&self, address: &str) -> Result<bool>;
    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()>;
    async fn delete_all_sessions(&self, phone: &str) -> Result<()>;
    async fn delete_session(&self, address: &str) -> Result<()>;
    /// Re-keys every session (and the identity and sender keys that go with
    /// it) addressed under `pn` to the same device under `lid`.
    ///
    /// Readers observe either the complete pre-migration or the complete
    /// post-migration state. Dropping the future before it resolves leaves
    /// the store unchanged.
    async fn migrate_pn_to_lid(&self, pn: &Jid, lid: &Jid) -> Result<()>;
}

#[async_trait]
pub trait PreKeyStore: Send + Sync {
    /// Returns up to `count` pre-keys that are not uploaded yet, generating
    /// fresh ones (with never-before-used IDs) to cover any shortfall.
    async fn get_or_gen_pre_keys(&self, count: u32) -> Result<Vec<PreKey>>;
    async fn gen_one_pre_key(&self) -> Result<PreKey>;
    /// Fails with `StoreError::NotFound` when the ID is absent.
    async fn get_pre_key(&self, id: u32) -> Result<PreKey>;
    async fn remove_pre_key(&self, id: u32) -> Result<()>;
    /// Raises the uploaded watermark to `up_to_id`. Never lowers it.
    async fn mark_pre_keys_as_uploaded(&self, up_to_id: u32) -> Result<()>;
    /// Number of stored pre-keys with an ID at or below the watermark.
    async fn uploaded_pre_key_count(&self) -> Result<usize>;
}

#[async_trait]
pub trait SenderKeyStore: Send + Sync {
    async fn put_sender_key(&self, group: &str, user: &str, session: &[u8]) -> Result<()>;
    async fn get_sender_key(&self, group: &str, user: &str) -> Result<Option<Vec<u8>>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStateSyncKey {
    pub key_data: Vec<u8>,
    pub fingerprint: Vec<u8>,
    pub timestamp: i64,
}

#[async_trait]
pub trait AppStateSyncKeyStore: Send + Sync {
    async fn put_app_state_sync_key(&self, id: &[u8], key: AppStateSyncKey) -> Result<()>;
    async fn get_app_state_sync_key(&self, id: &[u8]) -> Result<Option<AppStateSyncKey>>;
    async fn get_latest_app_state_sync_key_id(&self) -> Result<Option<Vec<u8>>>;
}

/// Version and running LTHash of one app-state collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashState {
    pub version: u64,
    #[serde(with = "BigArray")]
    pub hash: [u8; 128],
}

impl Default for HashState {
    fn default() -> Self {
        Self {
            version: 0,
            hash: [0; 128],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStateMutationMAC {
    pub index_mac: Vec<u8>,
    pub value_mac: Vec<u8>,
}

#[async_trait]
pub trait AppStateStore: Send + Sync {
    /// Stores whatever version is given; keeping versions monotonic is the
    /// caller's job.
    async fn put_app_state_version(&self, name: &str, version: u64, hash: [u8; 128])
    -> Result<()>;
    /// Unseen collections report `HashState::default()`.
    async fn get_app_state_version(&self, name: &str) -> Result<HashState>;
    /// Resets the collection, including its mutation MAC index.
    async fn delete_app_state_version(&self, name: &str) -> Result<()>;

    async fn put_app_state_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()>;
    async fn delete_app_state_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>])
    -> Result<()>;
    async fn get_app_state_mutation_mac(
        &self,
        name: &str,
        index_mac: &[u8],
    ) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Returns whether the name changed, and the previous value.
    async fn put_push_name(&self, user: &Jid, push_name: &str) -> Result<(bool, String)>;
    async fn put_business_name(&self, user: &Jid, business_name: &str) -> Result<(bool, String)>;
    async fn put_contact_name(&self, user: &Jid, full_name: &str, first_name: &str)
    -> Result<()>;
    async fn put_all_contact_names(&self, contacts: &[ContactEntry]) -> Result<()>;
    async fn get_contact(&self, user: &Jid) -> Result<Option<ContactInfo>>;
    async fn get_all_contacts(&self) -> Result<HashMap<Jid, ContactInfo>>;
}

#[async_trait]
pub trait ChatSettingsStore: Send + Sync {
    async fn put_muted_until(&self, chat: &Jid, muted_until: Option<DateTime<Utc>>)
    -> Result<()>;
    async fn put_pinned(&self, chat: &Jid, pinned: bool) -> Result<()>;
    async fn put_archived(&self, chat: &Jid, archived: bool) -> Result<()>;
    async fn get_chat_settings(&self, chat: &Jid) -> Result<Option<LocalChatSettings>>;
}

#[async_trait]
pub trait MsgSecretStore: Send + Sync {
    async fn put_message_secrets(&self, inserts: &[MessageSecretInsert]) -> Result<()>;
    async fn put_message_secret(
        &self,
        chat: &Jid,
        sender: &Jid,
        id: &str,
        secret: &[u8],
    ) -> Result<()>;
    async fn get_message_secret(
        &self,
        chat: &Jid,
        sender: &Jid,
        id: &str,
    ) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait PrivacyTokenStore: Send + Sync {
    async fn put_privacy_tokens(&self, tokens: &[PrivacyToken]) -> Result<()>;
    async fn get_privacy_token(&self, user: &Jid) -> Result<Option<PrivacyToken>>;
}

/// A LID ↔ phone number pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LidMapping {
    pub lid: Jid,
    pub pn: Jid,
}

/// Bidirectional LID ↔ phone number mapping, shared by every device.
#[async_trait]
pub trait LidStore: Send + Sync {
    /// All-or-nothing: either every mapping is visible afterwards or none is.
    async fn put_many_lid_mappings(&self, mappings: &[LidMapping]) -> Result<()>;
    async fn put_lid_mapping(&self, lid: &Jid, pn: &Jid) -> Result<()>;
    async fn get_pn_for_lid(&self, lid: &Jid) -> Result<Option<Jid>>;
    async fn get_lid_for_pn(&self, pn: &Jid) -> Result<Option<Jid>>;
}

/// Persists whole device records.
#[async_trait]
pub trait DeviceContainer: Send + Sync {
    async fn put_device(&self, device: &crate::store::Device) -> Result<()>;
    async fn delete_device(&self, device: &crate::store::Device) -> Result<()>;
}

pub trait AllSessionSpecificStores:
    IdentityStore
    + SessionStore
    + PreKeyStore
    + SenderKeyStore
    + AppStateSyncKeyStore
    + AppStateStore
    + ContactStore
    + ChatSettingsStore
    + MsgSecretStore
    + PrivacyTokenStore
    + Send
    + Sync
{
}

impl<T> AllSessionSpecificStores for T where
    T: IdentityStore
        + SessionStore
        + PreKeyStore
        + SenderKeyStore
        + AppStateSyncKeyStore
        + AppStateStore
        + ContactStore
        + ChatSettingsStore
        + MsgSecretStore
        + PrivacyTokenStore
        + Send
        + Sync
{
}

pub trait AllGlobalStores: LidStore + Send + Sync {}

impl<T> AllGlobalStores for T where T: LidStore + Send + Sync {}

pub trait AllStores: AllSessionSpecificStores + AllGlobalStores {}

impl<T> AllStores for T where T: AllSessionSpecificStores + AllGlobalStores {}
