use serde::{Deserialize, Serialize};

/// Highest pre-key ID the wire format can carry (24 bits).
pub const MAX_PRE_KEY_ID: u32 = 0xFF_FFFF;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// ID given to the first generated pre-key.
    pub first_pre_key_id: u32,
    /// Generation fails once this ID has been handed out; IDs are never reused.
    pub max_pre_key_id: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            first_pre_key_id: 1,
            max_pre_key_id: MAX_PRE_KEY_ID,
        }
    }
}
