//! Key types, key agreement and domain-separated hashing.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{decode_key, encode_key, KEY_LEN};
use crate::error::{CoreError, Result};

/// Label under which a root key's fingerprint is computed.
pub const KEY_HASH_LABEL: &str = "disco 2024 encryption key hash";

/// Label under which a shared secret becomes a sealing key.
const SHARED_KEY_LABEL: &str = "disco 2024 shared secret key";

/// Domain-separated hash (BLAKE3 in key derivation mode).
///
/// Used for fingerprints of secret keys and for deriving subordinate keys.
pub fn hash(label: &str, data: &[u8]) -> [u8; 32] {
    blake3::derive_key(label, data)
}

/// A 256-bit symmetric key.
///
/// The node root key is one of these; so is every key derived from it.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Parse a base58-encoded key.
    pub fn decode(text: &str) -> Result<Self> {
        decode_key(text).map(Self)
    }

    /// Encode as base58.
    pub fn encode(&self) -> String {
        encode_key(&self.0)
    }

    /// Derive a subordinate key under `label`.
    pub fn derive(&self, label: &str) -> Self {
        Self(hash(label, &self.0))
    }

    /// Base58 fingerprint of this key, safe to persist.
    pub fn fingerprint(&self) -> String {
        encode_key(&hash(KEY_HASH_LABEL, &self.0))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// An X25519 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; KEY_LEN]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, failing unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Parse a base58-encoded public key.
    pub fn decode(text: &str) -> Result<Self> {
        decode_key(text).map(Self)
    }

    /// Encode as base58.
    pub fn encode(&self) -> String {
        encode_key(&self.0)
    }

    /// Convert to x25519-dalek PublicKey.
    pub fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret key. Zeroized on drop.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::thread_rng()))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Create from a slice, failing unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CoreError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, bytes.len()))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Fails when the peer key is a low-order point, since the result would not
    /// depend on our secret.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> Result<SharedKey> {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        if !shared.was_contributory() {
            return Err(CoreError::InvalidKey(
                "non-contributory key agreement".to_string(),
            ));
        }
        Ok(SharedKey(*shared.as_bytes()))
    }
}

/// A shared secret derived from X25519 key agreement. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The sealing key both sides of the exchange use.
    pub fn symmetric_key(&self) -> SymmetricKey {
        SymmetricKey(hash(SHARED_KEY_LABEL, &self.0))
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(..)")
    }
}

/// X25519 exchange against `peer_public`.
///
/// When `own` is `None` a fresh ephemeral secret is generated. Returns the
/// shared secret and our public key, which the peer needs to reach the same
/// secret.
pub fn diffie_hellman(
    peer_public: &[u8],
    own: Option<&X25519StaticSecret>,
) -> Result<(SharedKey, X25519PublicKey)> {
    let peer = X25519PublicKey::from_slice(peer_public)?;
    let ephemeral;
    let own = match own {
        Some(secret) => secret,
        None => {
            ephemeral = X25519StaticSecret::generate();
            &ephemeral
        }
    };
    let shared = own.diffie_hellman(&peer)?;
    Ok((shared, own.public_key()))
}
