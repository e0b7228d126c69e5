use crate::config::StoreConfig;
use crate::store::lid::MemoryLidStore;
use crate::store::memory::MemoryStore;
use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use wacore::store::error::{Result, StoreError};
use wacore::store::traits::{DeviceContainer, LidStore};
use wacore::store::{Device, SerializableDevice};
use wacore::types::Jid;

type NoiseKey = [u8; 32];

struct Snapshot {
    noise_key: NoiseKey,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Records {
    /// Saved devices by JID.
    snapshots: BTreeMap<String, Snapshot>,
    /// Stores of saved devices.
    stores: HashMap<NoiseKey, Arc<MemoryStore>>,
    /// Stores of devices that have not been saved yet. Only the device holds
    /// them, so they go away with it.
    unsaved: HashMap<NoiseKey, Weak<MemoryStore>>,
}

/// Holds device records for a process and hands out [`Device`]s wired to
/// in-memory stores.
///
/// Records are kept as bincode snapshots keyed by JID. Each device's
/// session-specific stores are keyed by its noise public key, which does not
/// change when the device learns its JID. The LID store is shared.
pub struct MemoryContainer {
    config: StoreConfig,
    records: RwLock<Records>,
    lids: Arc<MemoryLidStore>,
}

impl MemoryContainer {
    pub fn new() -> Arc<Self> {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            records: RwLock::new(Records::default()),
            lids: Arc::new(MemoryLidStore::new()),
        })
    }

    pub fn lids(&self) -> Arc<MemoryLidStore> {
        self.lids.clone()
    }

    /// A fresh, unsaved device with its own stores.
    pub async fn new_device(self: &Arc<Self>) -> Device {
        let stores = Arc::new(MemoryStore::with_config(self.config.clone()));
        let device = Device::new(stores.clone(), self.shared_lids(), self.as_container());

        let mut records = self.records.write().await;
        records.unsaved.retain(|_, store| store.strong_count() > 0);
        records
            .unsaved
            .insert(device.noise_key.public_key, Arc::downgrade(&stores));
        device
    }

    pub async fn get_device(self: &Arc<Self>, jid: &Jid) -> Result<Option<Device>> {
        let bytes = self
            .records
            .read()
            .await
            .snapshots
            .get(&jid.to_string())
            .map(|snapshot| snapshot.bytes.clone());
        match bytes {
            Some(bytes) => Ok(Some(self.restore(&bytes).await?)),
            None => Ok(None),
        }
    }

    /// Every saved device, ordered by JID.
    pub async fn get_all_devices(self: &Arc<Self>) -> Result<Vec<Device>> {
        let snapshots: Vec<Vec<u8>> = self
            .records
            .read()
            .await
            .snapshots
            .values()
            .map(|snapshot| snapshot.bytes.clone())
            .collect();
        let mut devices = Vec::with_capacity(snapshots.len());
        for bytes in &snapshots {
            devices.push(self.restore(bytes).await?);
        }
        Ok(devices)
    }

    pub async fn get_first_device(self: &Arc<Self>) -> Result<Option<Device>> {
        let first = self
            .records
            .read()
            .await
            .snapshots
            .values()
            .next()
            .map(|snapshot| snapshot.bytes.clone());
        match first {
            Some(bytes) => Ok(Some(self.restore(&bytes).await?)),
            None => Ok(None),
        }
    }

    fn shared_lids(&self) -> Arc<dyn LidStore> {
        self.lids.clone()
    }

    fn as_container(self: &Arc<Self>) -> Arc<dyn DeviceContainer> {
        self.clone()
    }

    async fn restore(self: &Arc<Self>, bytes: &[u8]) -> Result<Device> {
        let (snapshot, _): (SerializableDevice, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Records saved from devices built elsewhere have no stores here yet.
        let stores = self
            .records
            .write()
            .await
            .stores
            .entry(snapshot.noise_key.public_key)
            .or_insert_with(|| Arc::new(MemoryStore::with_config(self.config.clone())))
            .clone();

        let mut device = Device::new(stores, self.shared_lids(), self.as_container());
        device.load_from_serializable(snapshot);
        Ok(device)
    }
}

#[async_trait]
impl DeviceContainer for MemoryContainer {
    async fn put_device(&self, device: &Device) -> Result<()> {
        let jid = device.id.as_ref().ok_or(StoreError::DeviceIdMustBeSet)?;
        let key = jid.to_string();
        let noise_key = device.noise_key.public_key;
        let bytes =
            bincode::serde::encode_to_vec(device.to_serializable(), bincode::config::standard())
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut records = self.records.write().await;
        // A device that changed its JID replaces its earlier record.
        records
            .snapshots
            .retain(|saved, snapshot| *saved == key || snapshot.noise_key != noise_key);
        records
            .snapshots
            .insert(key, Snapshot { noise_key, bytes });
        if let Some(stores) = records
            .unsaved
            .remove(&noise_key)
            .and_then(|store| store.upgrade())
        {
            records.stores.insert(noise_key, stores);
        }
        debug!("Saved device {jid}");
        Ok(())
    }

    async fn delete_device(&self, device: &Device) -> Result<()> {
        let jid = device.id.as_ref().ok_or(StoreError::DeviceIdMustBeSet)?;
        let noise_key = device.noise_key.public_key;
        let mut records = self.records.write().await;
        records.snapshots.remove(&jid.to_string());
        // In-flight operations keep their own handles to the stores.
        records.stores.remove(&noise_key);
        records.unsaved.remove(&noise_key);
        debug!("Deleted device {jid}");
        Ok(())
    }
}
