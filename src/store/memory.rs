use crate::config::StoreConfig;
use crate::store::generic::GenericMemoryStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, RwLock};
use wacore::crypto::{KeyPair, PreKey};
use wacore::store::error::{Result, StoreError};
use wacore::store::traits::*;
use wacore::types::address::phone_of;
use wacore::types::{
    ContactEntry, ContactInfo, Jid, LocalChatSettings, MessageId, MessageSecretInsert,
    PrivacyToken, SignalAddress,
};

/// Identity keys, sessions and sender keys. They share one lock so that a
/// PN to LID migration is observed all at once.
#[derive(Default)]
struct SignalTables {
    identities: HashMap<String, [u8; 32]>,
    sessions: HashMap<String, Vec<u8>>,
    /// Keyed by (group, sender address).
    sender_keys: HashMap<(String, String), Vec<u8>>,
}

struct PreKeyTable {
    keys: BTreeMap<u32, KeyPair>,
    /// Wider than the ID type so the end of the ID space is representable.
    next_id: u64,
    first_id: u32,
    /// `None` until something is marked, so a first ID of zero is not
    /// counted as uploaded from the start.
    uploaded_up_to: Option<u32>,
}

impl PreKeyTable {
    fn generate(&mut self, count: u32, max_id: u32) -> Result<Vec<PreKey>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = self.next_id + u64::from(count) - 1;
        if last > u64::from(max_id) {
            return Err(StoreError::PreKeyIdsExhausted { max: max_id });
        }
        // Both bounds were just checked against a u32 maximum.
        let generated: Vec<PreKey> = (self.next_id..=last)
            .map(|id| PreKey::new(id as u32))
            .collect();
        for key in &generated {
            self.keys.insert(key.key_id, key.key_pair.clone());
        }
        self.next_id = last + 1;
        Ok(generated)
    }

    fn highest_generated(&self) -> Option<u32> {
        (self.next_id > u64::from(self.first_id)).then(|| (self.next_id - 1) as u32)
    }

    fn pending(&self) -> impl Iterator<Item = (&u32, &KeyPair)> {
        let start = match self.uploaded_up_to {
            Some(up_to) => Bound::Excluded(up_to),
            None => Bound::Unbounded,
        };
        self.keys.range((start, Bound::Unbounded))
    }
}

struct MacEntry {
    version: u64,
    value_mac: Vec<u8>,
}

#[derive(Default)]
struct AppStateTables {
    versions: HashMap<String, HashState>,
    mutation_macs: HashMap<String, HashMap<Vec<u8>, MacEntry>>,
}

type SecretKey = (Jid, Jid, MessageId);

/// Session-specific stores for one device, held entirely in memory.
pub struct MemoryStore {
    config: StoreConfig,
    signal: RwLock<SignalTables>,
    pre_keys: Mutex<PreKeyTable>,
    sync_keys: RwLock<HashMap<Vec<u8>, AppStateSyncKey>>,
    app_state: RwLock<AppStateTables>,
    contacts: GenericMemoryStore<Jid, ContactInfo>,
    chat_settings: GenericMemoryStore<Jid, LocalChatSettings>,
    msg_secrets: GenericMemoryStore<SecretKey, Vec<u8>>,
    privacy_tokens: GenericMemoryStore<Jid, PrivacyToken>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let pre_keys = PreKeyTable {
            keys: BTreeMap::new(),
            next_id: u64::from(config.first_pre_key_id),
            first_id: config.first_pre_key_id,
            uploaded_up_to: None,
        };
        Self {
            config,
            signal: RwLock::new(SignalTables::default()),
            pre_keys: Mutex::new(pre_keys),
            sync_keys: RwLock::new(HashMap::new()),
            app_state: RwLock::new(AppStateTables::default()),
            contacts: GenericMemoryStore::new(),
            chat_settings: GenericMemoryStore::new(),
            msg_secrets: GenericMemoryStore::new(),
            privacy_tokens: GenericMemoryStore::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

fn is_under(address: &str, phone: &str) -> bool {
    phone_of(address).is_some_and(|user| user == phone)
}

/// Addresses in `keys` that belong to `account`, paired with their target
/// under `target`.
fn plan_rekey<'a, I>(keys: I, account: &SignalAddress, target: &Jid) -> Vec<(String, String)>
where
    I: Iterator<Item = &'a String>,
{
    keys.filter_map(|key| {
        let address = SignalAddress::parse(key)?;
        (address.user == account.user && address.server == account.server)
            .then(|| (key.clone(), address.rebase(target).to_string()))
    })
    .collect()
}

fn rekey<V>(map: &mut HashMap<String, V>, plan: &[(String, String)]) {
    for (from, to) in plan {
        if let Some(value) = map.remove(from) {
            map.insert(to.clone(), value);
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        self.signal
            .write()
            .await
            .identities
            .insert(address.to_string(), key);
        Ok(())
    }

    async fn delete_all_identities(&self, phone: &str) -> Result<()> {
        self.signal
            .write()
            .await
            .identities
            .retain(|address, _| !is_under(address, phone));
        Ok(())
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.signal.write().await.identities.remove(address);
        Ok(())
    }

    async fn is_trusted_identity(&self, address: &str, key: &[u8; 32]) -> Result<bool> {
        let tables = self.signal.read().await;
        Ok(match tables.identities.get(address) {
            None => true,
            Some(stored) => bool::from(stored[..].ct_eq(&key[..])),
        })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.signal.read().await.sessions.get(address).cloned())
    }

    async fn has_session(&self, address: &str) -> Result<bool> {
        Ok(self.signal.read().await.sessions.contains_key(address))
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        self.signal
            .write()
            .await
            .sessions
            .insert(address.to_string(), session.to_vec());
        Ok(())
    }

    async fn delete_all_sessions(&self, phone: &str) -> Result<()> {
        self.signal
            .write()
            .await
            .sessions
            .retain(|address, _| !is_under(address, phone));
        Ok(())
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.signal.write().await.sessions.remove(address);
        Ok(())
    }

    async fn migrate_pn_to_lid(&self, pn: &Jid, lid: &Jid) -> Result<()> {
        if !pn.is_pn() || !lid.is_lid() {
            return Err(StoreError::InvalidArgument(format!(
                "cannot migrate {pn} to {lid}: expected a phone number and a LID"
            )));
        }
        let account = SignalAddress::from_jid(&pn.to_non_ad());
        let target = lid.to_non_ad();

        let mut tables = self.signal.write().await;
        let sessions = plan_rekey(tables.sessions.keys(), &account, &target);
        let identities = plan_rekey(tables.identities.keys(), &account, &target);
        let sender_keys: Vec<((String, String), (String, String))> = tables
            .sender_keys
            .keys()
            .filter_map(|(group, user)| {
                let address = SignalAddress::parse(user)?;
                (address.user == account.user && address.server == account.server).then(|| {
                    (
                        (group.clone(), user.clone()),
                        (group.clone(), address.rebase(&target).to_string()),
                    )
                })
            })
            .collect();

        if sessions.is_empty() && identities.is_empty() && sender_keys.is_empty() {
            return Ok(());
        }

        rekey(&mut tables.sessions, &sessions);
        rekey(&mut tables.identities, &identities);
        for (from, to) in sender_keys.iter() {
            if let Some(value) = tables.sender_keys.remove(from) {
                tables.sender_keys.insert(to.clone(), value);
            }
        }
        debug!(
            "Migrated {} sessions, {} identity keys and {} sender keys from {pn} to {lid}",
            sessions.len(),
            identities.len(),
            sender_keys.len()
        );
        Ok(())
    }
}

#[async_trait]
impl PreKeyStore for MemoryStore {
    async fn get_or_gen_pre_keys(&self, count: u32) -> Result<Vec<PreKey>> {
        let mut table = self.pre_keys.lock().await;
        let mut keys: Vec<PreKey> = table
            .pending()
            .take(count as usize)
            .map(|(&key_id, key_pair)| PreKey {
                key_id,
                key_pair: key_pair.clone(),
            })
            .collect();
        let shortfall = count - keys.len() as u32;
        if shortfall > 0 {
            keys.extend(table.generate(shortfall, self.config.max_pre_key_id)?);
            debug!("Generated {shortfall} new pre-keys");
        }
        Ok(keys)
    }

    async fn gen_one_pre_key(&self) -> Result<PreKey> {
        let mut table = self.pre_keys.lock().await;
        let mut generated = table.generate(1, self.config.max_pre_key_id)?;
        generated.pop().ok_or_else(|| {
            StoreError::Database("pre-key generation produced no key".to_string())
        })
    }

    async fn get_pre_key(&self, id: u32) -> Result<PreKey> {
        let table = self.pre_keys.lock().await;
        table
            .keys
            .get(&id)
            .map(|key_pair| PreKey {
                key_id: id,
                key_pair: key_pair.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(format!("pre-key {id}")))
    }

    async fn remove_pre_key(&self, id: u32) -> Result<()> {
        self.pre_keys.lock().await.keys.remove(&id);
        Ok(())
    }

    async fn mark_pre_keys_as_uploaded(&self, up_to_id: u32) -> Result<()> {
        let mut table = self.pre_keys.lock().await;
        let Some(highest) = table.highest_generated() else {
            return Ok(());
        };
        let clamped = up_to_id.min(highest);
        if table.uploaded_up_to.is_none_or(|current| clamped > current) {
            table.uploaded_up_to = Some(clamped);
        }
        Ok(())
    }

    async fn uploaded_pre_key_count(&self) -> Result<usize> {
        let table = self.pre_keys.lock().await;
        Ok(match table.uploaded_up_to {
            Some(up_to) => table.keys.range(..=up_to).count(),
            None => 0,
        })
    }
}

#[async_trait]
impl SenderKeyStore for MemoryStore {
    async fn put_sender_key(&self, group: &str, user: &str, session: &[u8]) -> Result<()> {
        self.signal
            .write()
            .await
            .sender_keys
            .insert((group.to_string(), user.to_string()), session.to_vec());
        Ok(())
    }

    async fn get_sender_key(&self, group: &str, user: &str) -> Result<Option<Vec<u8>>> {
        let tables = self.signal.read().await;
        Ok(tables
            .sender_keys
            .get(&(group.to_string(), user.to_string()))
            .cloned())
    }
}

#[async_trait]
impl AppStateSyncKeyStore for MemoryStore {
    async fn put_app_state_sync_key(&self, id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let mut keys = self.sync_keys.write().await;
        if let Some(existing) = keys.get(id)
            && existing.timestamp >= key.timestamp
        {
            debug!(
                "Ignoring app state sync key {} that is not newer than the stored one",
                hex::encode(id)
            );
            return Ok(());
        }
        keys.insert(id.to_vec(), key);
        Ok(())
    }

    async fn get_app_state_sync_key(&self, id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        Ok(self.sync_keys.read().await.get(id).cloned())
    }

    async fn get_latest_app_state_sync_key_id(&self) -> Result<Option<Vec<u8>>> {
        let keys = self.sync_keys.read().await;
        Ok(keys
            .iter()
            .max_by(|(a_id, a), (b_id, b)| a.timestamp.cmp(&b.timestamp).then(a_id.cmp(b_id)))
            .map(|(id, _)| id.clone()))
    }
}

#[async_trait]
impl AppStateStore for MemoryStore {
    async fn put_app_state_version(
        &self,
        name: &str,
        version: u64,
        hash: [u8; 128],
    ) -> Result<()> {
        let mut tables = self.app_state.write().await;
        if let Some(current) = tables.versions.get(name)
            && current.version > version
        {
            warn!(
                "App state {name} moved back from version {} to {version}",
                current.version
            );
        }
        tables
            .versions
            .insert(name.to_string(), HashState { version, hash });
        Ok(())
    }

    async fn get_app_state_version(&self, name: &str) -> Result<HashState> {
        let tables = self.app_state.read().await;
        Ok(tables.versions.get(name).cloned().unwrap_or_default())
    }

    async fn delete_app_state_version(&self, name: &str) -> Result<()> {
        let mut tables = self.app_state.write().await;
        tables.versions.remove(name);
        tables.mutation_macs.remove(name);
        Ok(())
    }

    async fn put_app_state_mutation_macs(
        &self,
        name: &str,
        version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        let mut tables = self.app_state.write().await;
        let index = tables.mutation_macs.entry(name.to_string()).or_default();
        let mut skipped = 0;
        for mutation in mutations {
            match index.get(&mutation.index_mac) {
                Some(existing) if existing.version > version => skipped += 1,
                _ => {
                    index.insert(
                        mutation.index_mac.clone(),
                        MacEntry {
                            version,
                            value_mac: mutation.value_mac.clone(),
                        },
                    );
                }
            }
        }
        debug!(
            "Stored {} mutation MACs for {name} at version {version} ({skipped} superseded)",
            mutations.len() - skipped
        );
        Ok(())
    }

    async fn delete_app_state_mutation_macs(
        &self,
        name: &str,
        index_macs: &[Vec<u8>],
    ) -> Result<()> {
        let mut tables = self.app_state.write().await;
        if let Some(index) = tables.mutation_macs.get_mut(name) {
            for index_mac in index_macs {
                index.remove(index_mac);
            }
        }
        Ok(())
    }

    async fn get_app_state_mutation_mac(
        &self,
        name: &str,
        index_mac: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let tables = self.app_state.read().await;
        Ok(tables
            .mutation_macs
            .get(name)
            .and_then(|index| index.get(index_mac))
            .map(|entry| entry.value_mac.clone()))
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn put_push_name(&self, user: &Jid, push_name: &str) -> Result<(bool, String)> {
        Ok(self
            .contacts
            .update_if_changed(user.to_non_ad(), |contact| {
                if contact.push_name == push_name {
                    (false, contact.push_name.clone())
                } else {
                    (true, std::mem::replace(&mut contact.push_name, push_name.to_string()))
                }
            })
            .await)
    }

    async fn put_business_name(&self, user: &Jid, business_name: &str) -> Result<(bool, String)> {
        Ok(self
            .contacts
            .update_if_changed(user.to_non_ad(), |contact| {
                if contact.business_name == business_name {
                    (false, contact.business_name.clone())
                } else {
                    (
                        true,
                        std::mem::replace(&mut contact.business_name, business_name.to_string()),
                    )
                }
            })
            .await)
    }

    async fn put_contact_name(
        &self,
        user: &Jid,
        full_name: &str,
        first_name: &str,
    ) -> Result<()> {
        self.contacts
            .update(user.to_non_ad(), |contact| {
                contact.full_name = full_name.to_string();
                contact.first_name = first_name.to_string();
            })
            .await;
        Ok(())
    }

    async fn put_all_contact_names(&self, contacts: &[ContactEntry]) -> Result<()> {
        let names: HashMap<Jid, &ContactEntry> = contacts
            .iter()
            .map(|entry| (entry.jid.to_non_ad(), entry))
            .collect();
        self.contacts
            .update_many(names.keys().cloned(), |jid, contact| {
                if let Some(entry) = names.get(jid) {
                    contact.full_name = entry.full_name.clone();
                    contact.first_name = entry.first_name.clone();
                }
            })
            .await;
        debug!("Stored names for {} contacts", names.len());
        Ok(())
    }

    async fn get_contact(&self, user: &Jid) -> Result<Option<ContactInfo>> {
        Ok(self.contacts.get(&user.to_non_ad()).await)
    }

    async fn get_all_contacts(&self) -> Result<HashMap<Jid, ContactInfo>> {
        Ok(self.contacts.all().await)
    }
}

#[async_trait]
impl ChatSettingsStore for MemoryStore {
    async fn put_muted_until(
        &self,
        chat: &Jid,
        muted_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.chat_settings
            .update(chat.to_non_ad(), |settings| settings.muted_until = muted_until)
            .await;
        Ok(())
    }

    async fn put_pinned(&self, chat: &Jid, pinned: bool) -> Result<()> {
        self.chat_settings
            .update(chat.to_non_ad(), |settings| settings.pinned = pinned)
            .await;
        Ok(())
    }

    async fn put_archived(&self, chat: &Jid, archived: bool) -> Result<()> {
        self.chat_settings
            .update(chat.to_non_ad(), |settings| settings.archived = archived)
            .await;
        Ok(())
    }

    async fn get_chat_settings(&self, chat: &Jid) -> Result<Option<LocalChatSettings>> {
        Ok(self.chat_settings.get(&chat.to_non_ad()).await)
    }
}

fn secret_key(chat: &Jid, sender: &Jid, id: &str) -> SecretKey {
    (chat.to_non_ad(), sender.to_non_ad(), id.to_string())
}

#[async_trait]
impl MsgSecretStore for MemoryStore {
    async fn put_message_secrets(&self, inserts: &[MessageSecretInsert]) -> Result<()> {
        self.msg_secrets
            .put_many_if_absent(inserts.iter().map(|insert| {
                (
                    secret_key(&insert.chat, &insert.sender, &insert.id),
                    insert.secret.clone(),
                )
            }))
            .await;
        Ok(())
    }

    async fn put_message_secret(
        &self,
        chat: &Jid,
        sender: &Jid,
        id: &str,
        secret: &[u8],
    ) -> Result<()> {
        self.msg_secrets
            .put_if_absent(secret_key(chat, sender, id), secret.to_vec())
            .await;
        Ok(())
    }

    async fn get_message_secret(
        &self,
        chat: &Jid,
        sender: &Jid,
        id: &str,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self.msg_secrets.get(&secret_key(chat, sender, id)).await)
    }
}

#[async_trait]
impl PrivacyTokenStore for MemoryStore {
    async fn put_privacy_tokens(&self, tokens: &[PrivacyToken]) -> Result<()> {
        self.privacy_tokens
            .put_many(
                tokens
                    .iter()
                    .map(|token| (token.user.to_non_ad(), token.clone())),
            )
            .await;
        Ok(())
    }

    async fn get_privacy_token(&self, user: &Jid) -> Result<Option<PrivacyToken>> {
        Ok(self.privacy_tokens.get(&user.to_non_ad()).await)
    }
}
