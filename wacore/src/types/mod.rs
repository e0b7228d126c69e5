pub mod address;
pub mod contact;
pub mod jid;

pub use address::SignalAddress;
pub use contact::{ContactEntry, ContactInfo, LocalChatSettings, MessageSecretInsert, PrivacyToken};
pub use jid::{Jid, JidError, MessageId};
