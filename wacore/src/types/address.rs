//! Signal address strings used as keys for identity, session and sender-key
//! records.
//!
//! Format: `{user}[:device]@{server}.0`
//! - `:device` is only present when `device != 0`
//! - `s.whatsapp.net` is written as `c.us`
//! - the trailing `.0` is the Signal device slot, which is always zero because
//!   the device is already encoded in the name
//!
//! Examples: `123456789@lid.0`, `123456789:33@lid.0`, `5511999887766@c.us.0`

use crate::types::jid::{DEFAULT_USER_SERVER, HIDDEN_USER_SERVER, Jid, LEGACY_USER_SERVER};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalAddress {
    pub user: String,
    pub device: u16,
    pub server: String,
}

impl SignalAddress {
    pub fn from_jid(jid: &Jid) -> Self {
        let server = match jid.server.as_str() {
            DEFAULT_USER_SERVER => LEGACY_USER_SERVER,
            other => other,
        };
        Self {
            user: jid.user.clone(),
            device: jid.device,
            server: server.to_string(),
        }
    }

    /// Parses an address produced by `Display`. Returns `None` for strings
    /// that are not Signal addresses.
    pub fn parse(address: &str) -> Option<Self> {
        let name = address.strip_suffix(".0").unwrap_or(address);
        let (user_part, server) = name.split_once('@')?;
        if user_part.is_empty() || server.is_empty() {
            return None;
        }
        let (user, device) = match user_part.rsplit_once(':') {
            Some((u, d)) => (u, d.parse().ok()?),
            None => (user_part, 0),
        };
        Some(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }

    pub fn is_pn(&self) -> bool {
        self.server == LEGACY_USER_SERVER
    }

    pub fn is_lid(&self) -> bool {
        self.server == HIDDEN_USER_SERVER
    }

    /// Same device slot, re-addressed under another account.
    pub fn rebase(&self, target: &Jid) -> Self {
        let mut rebased = Self::from_jid(target);
        rebased.device = self.device;
        rebased
    }
}

impl fmt::Display for SignalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user)?;
        if self.device != 0 {
            write!(f, ":{}", self.device)?;
        }
        write!(f, "@{}.0", self.server)
    }
}

/// Phone number of an address string, or `None` when it is not addressed
/// under a phone number. LID and group addresses never match.
pub fn phone_of(address: &str) -> Option<String> {
    SignalAddress::parse(address)
        .filter(SignalAddress::is_pn)
        .map(|a| a.user)
}
