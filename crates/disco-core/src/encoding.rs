//! Base58 text encoding for keys, tokens and ciphertexts.

use crate::error::{CoreError, Result};

/// Length of every key Disco handles.
pub const KEY_LEN: usize = 32;

/// Encode bytes as base58.
pub fn encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode base58 text of any length.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Encode a 32-byte key as base58.
pub fn encode_key(key: &[u8; KEY_LEN]) -> String {
    encode(key)
}

/// Decode a base58 key, requiring exactly 32 bytes.
pub fn decode_key(text: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| CoreError::InvalidKey(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidKey(format!("expected {} bytes, got {}", KEY_LEN, len)))
}
