pub mod key_pair;
pub mod xed25519;

pub use key_pair::{KeyPair, PreKey, SignedPreKey};
