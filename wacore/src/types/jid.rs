use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
pub const LEGACY_USER_SERVER: &str = "c.us";
pub const GROUP_SERVER: &str = "g.us";
pub const BROADCAST_SERVER: &str = "broadcast";
pub const HIDDEN_USER_SERVER: &str = "lid";
pub const HOSTED_SERVER: &str = "hosted";

pub type MessageId = String;

#[derive(Debug, Error)]
pub enum JidError {
    #[error("Invalid JID format: {0}")]
    InvalidFormat(String),
    #[error("Failed to parse component: {0}")]
    Parse(#[from] std::num::ParseIntError),
}

/// A WhatsApp identifier: `user[.agent][:device]@server`.
///
/// The empty JID (`Jid::default()`) stands for "no identifier" and is what
/// lookups hand back for unset addressing fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Jid {
    pub user: String,
    pub server: String,
    pub agent: u8,
    pub device: u16,
    pub integrator: u16,
}

impl Jid {
    pub fn new(user: &str, server: &str) -> Self {
        Self {
            user: user.to_string(),
            server: server.to_string(),
            ..Default::default()
        }
    }

    pub fn pn(user: &str) -> Self {
        Self::new(user, DEFAULT_USER_SERVER)
    }

    pub fn lid(user: &str) -> Self {
        Self::new(user, HIDDEN_USER_SERVER)
    }

    pub fn with_device(mut self, device: u16) -> Self {
        self.device = device;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty()
    }

    pub fn is_lid(&self) -> bool {
        self.server == HIDDEN_USER_SERVER
    }

    pub fn is_pn(&self) -> bool {
        self.server == DEFAULT_USER_SERVER || self.server == LEGACY_USER_SERVER
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_ad(&self) -> bool {
        self.device > 0
            && (self.server == DEFAULT_USER_SERVER
                || self.server == HIDDEN_USER_SERVER
                || self.server == HOSTED_SERVER)
    }

    /// Strips agent and device, leaving the account-level identifier.
    pub fn to_non_ad(&self) -> Self {
        Self {
            user: self.user.clone(),
            server: self.server.clone(),
            integrator: self.integrator,
            ..Default::default()
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_part, server) = match s.split_once('@') {
            Some((u, s)) => (u, s.to_string()),
            None => ("", s.to_string()),
        };

        if server.is_empty() {
            return Err(JidError::InvalidFormat(s.to_string()));
        }
        if user_part.is_empty() {
            return Ok(Jid::new("", &server));
        }

        // LID users may contain dots that are part of the identity.
        if server == HIDDEN_USER_SERVER {
            let (user, device) = match user_part.rsplit_once(':') {
                Some((u, d)) => (u, d.parse()?),
                None => (user_part, 0),
            };
            return Ok(Jid {
                user: user.to_string(),
                server,
                device,
                ..Default::default()
            });
        }

        let mut user = user_part;
        let mut device = 0;
        let mut agent = 0;

        if let Some((u, d)) = user_part.rsplit_once(':') {
            user = u;
            device = d.parse()?;
        }
        if let Some((u, a)) = user.rsplit_once('.')
            && let Ok(a) = a.parse::<u8>()
        {
            user = u;
            agent = a;
        }

        Ok(Jid {
            user: user.to_string(),
            server,
            agent,
            device,
            integrator: 0,
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.server)
        } else {
            write!(f, "{}", self.user)?;
            if self.agent > 0 {
                write!(f, ".{}", self.agent)?;
            }
            if self.device > 0 {
                write!(f, ":{}", self.device)?;
            }
            write!(f, "@{}", self.server)
        }
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Jid::from_str(&value)
    }
}
