use crate::types::jid::{Jid, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names known for a contact. Each field is updated independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub first_name: String,
    pub full_name: String,
    pub push_name: String,
    pub business_name: String,
}

/// A bulk contact-name write, as delivered by address book sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub jid: Jid,
    pub first_name: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalChatSettings {
    pub muted_until: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub archived: bool,
}

impl LocalChatSettings {
    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSecretInsert {
    pub chat: Jid,
    pub sender: Jid,
    pub id: MessageId,
    pub secret: Vec<u8>,
}

/// Trusted-contact token for a user. Only the latest one is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyToken {
    pub user: Jid,
    pub token: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}
