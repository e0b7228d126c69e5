use crate::crypto::xed25519;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use x25519_dalek::{PublicKey, StaticSecret};

/// The DJB type prefix Signal puts in front of serialized Curve25519 keys.
const DJB_TYPE: u8 = 5;

/// An X25519 key pair, stored as raw bytes so it round-trips bit-exact.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: [u8; 32],
    pub private_key: [u8; 32],
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    pub fn new() -> Self {
        let mut private_key = [0u8; 32];
        rand::rng().fill_bytes(&mut private_key);
        Self::from_private_key(private_key)
    }

    pub fn from_private_key(private_key: [u8; 32]) -> Self {
        let private = StaticSecret::from(private_key);
        let public = PublicKey::from(&private);
        Self {
            public_key: *public.as_bytes(),
            private_key: private.to_bytes(),
        }
    }

    /// Signs `0x05 || other.public_key` with XEd25519.
    pub fn sign(&self, key_to_sign: &KeyPair) -> [u8; 64] {
        let mut message = [0u8; 33];
        message[0] = DJB_TYPE;
        message[1..].copy_from_slice(&key_to_sign.public_key);
        xed25519::sign(&self.private_key, &message)
    }

    pub fn create_signed_prekey(&self, key_id: u32) -> SignedPreKey {
        let pre_key = PreKey::new(key_id);
        let signature = self.sign(&pre_key.key_pair);
        SignedPreKey { pre_key, signature }
    }
}

impl Default for KeyPair {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-time pre-key. IDs are assigned by the pre-key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKey {
    pub key_id: u32,
    pub key_pair: KeyPair,
}

impl PreKey {
    pub fn new(key_id: u32) -> Self {
        Self {
            key_id,
            key_pair: KeyPair::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreKey {
    pub pre_key: PreKey,
    #[serde(with = "BigArray")]
    pub signature: [u8; 64],
}

impl SignedPreKey {
    pub fn key_id(&self) -> u32 {
        self.pre_key.key_id
    }

    pub fn verify(&self, identity_public_key: &[u8; 32]) -> bool {
        let mut message = [0u8; 33];
        message[0] = DJB_TYPE;
        message[1..].copy_from_slice(&self.pre_key.key_pair.public_key);
        xed25519::verify(identity_public_key, &message, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_private_key_is_deterministic() {
        let kp = KeyPair::new();
        assert_eq!(KeyPair::from_private_key(kp.private_key), kp);
    }

    #[test]
    fn test_signed_prekey_verifies_against_identity() {
        let identity = KeyPair::new();
        let signed = identity.create_signed_prekey(1);
        assert_eq!(signed.key_id(), 1);
        assert!(signed.verify(&identity.public_key));
        assert!(!signed.verify(&KeyPair::new().public_key));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let kp = KeyPair::from_private_key([7u8; 32]);
        let rendered = format!("{kp:?}");
        assert!(!rendered.contains(&hex::encode([7u8; 32])));
    }
}
