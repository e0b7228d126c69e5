// SPDX-FileCopyrightText: 2023 Dominik George <nik@naturalnet.de>
// SPDX-FileCopyrightText: 2024 Tulir Asokan
//
// SPDX-License-Identifier: Apache-2.0

//! XEd25519 signatures over X25519 keys, as used for signed pre-keys.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::{Scalar, clamp_integer};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha512};

/// Derives the Edwards key pair for a Montgomery private key, negating the
/// scalar when needed so the public key's sign bit is zero.
fn edwards_key_pair(private_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let clamped = clamp_integer(*private_key);
    let scalar = Scalar::from_bytes_mod_order(clamped);
    let public = EdwardsPoint::mul_base(&scalar).compress().to_bytes();

    if public[31] & 0x80 == 0 {
        return (clamped, public);
    }
    let negated = -scalar;
    (
        negated.to_bytes(),
        EdwardsPoint::mul_base(&negated).compress().to_bytes(),
    )
}

const fn hash1_prefix() -> [u8; 32] {
    let mut prefix = [0xffu8; 32];
    prefix[0] = 0xfe;
    prefix
}

pub fn sign(private_key: &[u8; 32], message: &[u8]) -> [u8; 64] {
    let (ed_private, ed_public) = edwards_key_pair(private_key);

    let mut nonce = [0u8; 64];
    rand::rng().fill_bytes(&mut nonce);

    let r: [u8; 64] = Sha512::new()
        .chain_update(hash1_prefix())
        .chain_update(ed_private)
        .chain_update(message)
        .chain_update(nonce)
        .finalize()
        .into();
    let r = Scalar::from_bytes_mod_order_wide(&r);
    let r_point = EdwardsPoint::mul_base(&r).compress().to_bytes();

    let h: [u8; 64] = Sha512::new()
        .chain_update(r_point)
        .chain_update(ed_public)
        .chain_update(message)
        .finalize()
        .into();
    let h = Scalar::from_bytes_mod_order_wide(&h);
    let s = r + h * Scalar::from_bytes_mod_order(ed_private);

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&r_point);
    signature[32..].copy_from_slice(&s.to_bytes());
    signature
}

pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    let sign_bit = (signature[63] & 0x80) >> 7;
    let Some(edwards) = MontgomeryPoint(*public_key).to_edwards(sign_bit) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&edwards.compress().to_bytes()) else {
        return false;
    };

    let mut cleaned = *signature;
    cleaned[63] &= 0x7f;
    verifying_key
        .verify(message, &Signature::from_bytes(&cleaned))
        .is_ok()
}
