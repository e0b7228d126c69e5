//! LID to phone number mapping shared by every device of a container.
//!
//! Both directions live behind one lock, so a reader never sees a pair
//! resolvable one way and missing the other. Mappings are stored on user
//! parts; lookups put the queried device number back on the result.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;
use wacore::store::error::{Result, StoreError};
use wacore::store::traits::{LidMapping, LidStore};
use wacore::types::Jid;
use wacore::types::jid::{DEFAULT_USER_SERVER, HIDDEN_USER_SERVER};

#[derive(Default)]
struct LidTables {
    lid_to_pn: HashMap<String, String>,
    pn_to_lid: HashMap<String, String>,
}

impl LidTables {
    /// Inserts the pair and unlinks whatever either side was paired with
    /// before, keeping the two maps inverse to each other.
    fn link(&mut self, lid: String, pn: String) {
        if let Some(old_pn) = self.lid_to_pn.insert(lid.clone(), pn.clone())
            && old_pn != pn
            && self.pn_to_lid.get(&old_pn) == Some(&lid)
        {
            self.pn_to_lid.remove(&old_pn);
        }
        if let Some(old_lid) = self.pn_to_lid.insert(pn.clone(), lid.clone())
            && old_lid != lid
            && self.lid_to_pn.get(&old_lid) == Some(&pn)
        {
            self.lid_to_pn.remove(&old_lid);
        }
    }
}

#[derive(Default)]
pub struct MemoryLidStore {
    tables: RwLock<LidTables>,
}

impl MemoryLidStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.lid_to_pn.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn validate(lid: &Jid, pn: &Jid) -> Result<(String, String)> {
    if lid.server != HIDDEN_USER_SERVER || lid.user.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "expected a LID on the {HIDDEN_USER_SERVER} server, got {lid}"
        )));
    }
    if pn.server != DEFAULT_USER_SERVER || pn.user.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "expected a phone number on the {DEFAULT_USER_SERVER} server, got {pn}"
        )));
    }
    Ok((lid.user.clone(), pn.user.clone()))
}

#[async_trait]
impl LidStore for MemoryLidStore {
    async fn put_many_lid_mappings(&self, mappings: &[LidMapping]) -> Result<()> {
        let pairs = mappings
            .iter()
            .map(|mapping| validate(&mapping.lid, &mapping.pn))
            .collect::<Result<Vec<_>>>()?;
        if pairs.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().await;
        for (lid, pn) in pairs {
            tables.link(lid, pn);
        }
        debug!("Stored {} LID mappings", mappings.len());
        Ok(())
    }

    async fn put_lid_mapping(&self, lid: &Jid, pn: &Jid) -> Result<()> {
        let (lid, pn) = validate(lid, pn)?;
        self.tables.write().await.link(lid, pn);
        Ok(())
    }

    async fn get_pn_for_lid(&self, lid: &Jid) -> Result<Option<Jid>> {
        if !lid.is_lid() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .lid_to_pn
            .get(&lid.user)
            .map(|user| Jid::pn(user).with_device(lid.device)))
    }

    async fn get_lid_for_pn(&self, pn: &Jid) -> Result<Option<Jid>> {
        if pn.server != DEFAULT_USER_SERVER {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .pn_to_lid
            .get(&pn.user)
            .map(|user| Jid::lid(user).with_device(pn.device)))
    }
}
