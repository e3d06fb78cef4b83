// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Key vault seam.
//!
//! Wallet signing-key material is sealed before persistence. The vault is
//! an opaque collaborator: production deployments back it with an HSM or
//! enclave sealing; [`HmacStreamVault`] is the in-process implementation
//! used in sandbox, built on an HMAC-SHA256 keystream with an integrity
//! tag over the ciphertext.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TAG_LEN: usize = 16;

/// Vault failure.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("sealed payload is malformed")]
    Malformed,

    #[error("sealed payload failed integrity verification")]
    IntegrityFailure,
}

/// Seals and unseals key material.
pub trait KeyVault: Send + Sync {
    /// Seal plaintext into an opaque string.
    fn encrypt(&self, plaintext: &[u8]) -> String;

    /// Unseal a previously sealed payload, verifying integrity.
    fn decrypt(&self, sealed: &str) -> Result<Vec<u8>, VaultError>;
}

/// HMAC-SHA256 keystream vault for sandbox deployments.
pub struct HmacStreamVault {
    key: Vec<u8>,
}

impl HmacStreamVault {
    pub fn new(master_key: impl AsRef<[u8]>) -> Self {
        Self {
            key: master_key.as_ref().to_vec(),
        }
    }

    fn keystream_block(&self, nonce: &[u8], counter: u64) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(nonce);
        mac.update(&counter.to_be_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn apply_keystream(&self, nonce: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for (block_idx, chunk) in data.chunks(32).enumerate() {
            let block = self.keystream_block(nonce, block_idx as u64);
            for (byte, key_byte) in chunk.iter().zip(block.iter()) {
                out.push(byte ^ key_byte);
            }
        }
        out
    }

    fn tag(&self, nonce: &[u8], ciphertext: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(b"tag");
        mac.update(nonce);
        mac.update(ciphertext);
        mac.finalize().into_bytes()[..TAG_LEN].to_vec()
    }
}

impl KeyVault for HmacStreamVault {
    fn encrypt(&self, plaintext: &[u8]) -> String {
        let nonce = uuid::Uuid::new_v4().into_bytes();
        let ciphertext = self.apply_keystream(&nonce, plaintext);
        let tag = self.tag(&nonce, &ciphertext);
        format!(
            "{}.{}.{}",
            hex::encode(nonce),
            hex::encode(&ciphertext),
            hex::encode(&tag)
        )
    }

    fn decrypt(&self, sealed: &str) -> Result<Vec<u8>, VaultError> {
        let mut parts = sealed.split('.');
        let nonce = hex::decode(parts.next().ok_or(VaultError::Malformed)?)
            .map_err(|_| VaultError::Malformed)?;
        let ciphertext = hex::decode(parts.next().ok_or(VaultError::Malformed)?)
            .map_err(|_| VaultError::Malformed)?;
        let tag = hex::decode(parts.next().ok_or(VaultError::Malformed)?)
            .map_err(|_| VaultError::Malformed)?;
        if parts.next().is_some() {
            return Err(VaultError::Malformed);
        }

        let expected = self.tag(&nonce, &ciphertext);
        if tag.len() != TAG_LEN || tag != expected {
            return Err(VaultError::IntegrityFailure);
        }

        Ok(self.apply_keystream(&nonce, &ciphertext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let vault = HmacStreamVault::new("master-secret");
        let sealed = vault.encrypt(b"302e0201003005...");
        let opened = vault.decrypt(&sealed).unwrap();
        assert_eq!(opened, b"302e0201003005...");
    }

    #[test]
    fn sealed_payloads_are_nonce_randomized() {
        let vault = HmacStreamVault::new("master-secret");
        assert_ne!(vault.encrypt(b"key"), vault.encrypt(b"key"));
    }

    #[test]
    fn tampered_payload_fails_integrity() {
        let vault = HmacStreamVault::new("master-secret");
        let sealed = vault.encrypt(b"key material");
        let mut tampered = sealed.clone();
        // Flip a ciphertext nibble.
        let idx = sealed.find('.').unwrap() + 1;
        let flipped = if &sealed[idx..idx + 1] == "0" { "1" } else { "0" };
        tampered.replace_range(idx..idx + 1, flipped);
        assert!(matches!(
            vault.decrypt(&tampered),
            Err(VaultError::IntegrityFailure)
        ));
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let vault = HmacStreamVault::new("master-secret");
        let other = HmacStreamVault::new("different-secret");
        let sealed = vault.encrypt(b"key material");
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let vault = HmacStreamVault::new("master-secret");
        assert!(matches!(
            vault.decrypt("not-a-sealed-payload"),
            Err(VaultError::Malformed)
        ));
    }
}
