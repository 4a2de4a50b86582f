//! Chunked authenticated encryption.
//!
//! Plaintext is split into [`CHUNK_SIZE`] pieces and each piece is sealed
//! independently with XChaCha20-Poly1305 under a fresh random nonce. Every
//! frame on the wire is:
//!
//! ```text
//! u32 LE length of (nonce ‖ sealed) ‖ nonce (24 bytes) ‖ sealed chunk
//! ```
//!
//! The frame index and a final-frame flag are bound as associated data, so
//! frames cannot be reordered, dropped or truncated without failing
//! authentication. An empty plaintext seals to an empty ciphertext.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::crypto::{SymmetricKey, X25519PublicKey, X25519StaticSecret};
use crate::error::{CoreError, Result};

/// Plaintext bytes per frame.
pub const CHUNK_SIZE: usize = 16 * 1024;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const LEN_PREFIX: usize = 4;
const MAX_FRAME: usize = NONCE_LEN + CHUNK_SIZE + TAG_LEN;

/// Seal `plaintext` under `key`.
pub fn encrypt_symmetric(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    seal(plaintext, key, None)
}

/// Open a ciphertext produced by [`encrypt_symmetric`].
pub fn decrypt_symmetric(ciphertext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    open(ciphertext, key, None)
}

/// Like [`encrypt_symmetric`], checking `cancel` before every chunk.
pub fn encrypt_symmetric_cancellable(
    plaintext: &[u8],
    key: &SymmetricKey,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    seal(plaintext, key, Some(cancel))
}

/// Like [`decrypt_symmetric`], checking `cancel` before every chunk.
pub fn decrypt_symmetric_cancellable(
    ciphertext: &[u8],
    key: &SymmetricKey,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    open(ciphertext, key, Some(cancel))
}

/// Seal `data` for the holder of `peer_public`.
///
/// The sealing key is the X25519 agreement of `own_private` and `peer_public`
/// run through a key derivation, so either side of the pair can open it.
pub fn encrypt_asymmetric(
    data: &[u8],
    peer_public: &X25519PublicKey,
    own_private: &X25519StaticSecret,
) -> Result<Vec<u8>> {
    let key = own_private.diffie_hellman(peer_public)?.symmetric_key();
    seal(data, &key, None)
}

/// Open data sealed with [`encrypt_asymmetric`] by the holder of `peer_public`.
pub fn decrypt_asymmetric(
    data: &[u8],
    peer_public: &X25519PublicKey,
    own_private: &X25519StaticSecret,
) -> Result<Vec<u8>> {
    let key = own_private.diffie_hellman(peer_public)?.symmetric_key();
    open(data, &key, None)
}

fn check(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(CoreError::Cancelled),
        _ => Ok(()),
    }
}

fn frame_aad(index: u64, last: bool) -> [u8; 9] {
    let mut aad = [0u8; 9];
    aad[..8].copy_from_slice(&index.to_le_bytes());
    aad[8] = u8::from(last);
    aad
}

fn seal(plaintext: &[u8], key: &SymmetricKey, cancel: Option<&CancellationToken>) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;

    let frames = plaintext.len().div_ceil(CHUNK_SIZE);
    let mut out = Vec::with_capacity(plaintext.len() + frames * (LEN_PREFIX + NONCE_LEN + TAG_LEN));
    let mut rng = rand::thread_rng();

    for (index, chunk) in plaintext.chunks(CHUNK_SIZE).enumerate() {
        check(cancel)?;

        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let aad = frame_aad(index as u64, index + 1 == frames);
        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: chunk, aad: &aad })
            .map_err(|e| CoreError::EncryptionFailed(e.to_string()))?;

        // Bounded by MAX_FRAME, well inside u32.
        let frame_len = (NONCE_LEN + sealed.len()) as u32;
        out.extend_from_slice(&frame_len.to_le_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
    }

    Ok(out)
}

fn open(ciphertext: &[u8], key: &SymmetricKey, cancel: Option<&CancellationToken>) -> Result<Vec<u8>> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CoreError::DecryptionFailed)?;

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut rest = ciphertext;
    let mut index: u64 = 0;

    while !rest.is_empty() {
        check(cancel)?;

        if rest.len() < LEN_PREFIX {
            return Err(CoreError::DecryptionFailed);
        }
        let (prefix, tail) = rest.split_at(LEN_PREFIX);
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let frame_len = u32::from_le_bytes(len_bytes) as usize;
        if !(NONCE_LEN + TAG_LEN..=MAX_FRAME).contains(&frame_len) || tail.len() < frame_len {
            return Err(CoreError::DecryptionFailed);
        }

        let (frame, next) = tail.split_at(frame_len);
        let (nonce, sealed) = frame.split_at(NONCE_LEN);
        let aad = frame_aad(index, next.is_empty());
        let chunk = cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad: &aad })
            .map_err(|_| CoreError::DecryptionFailed)?;

        out.extend_from_slice(&chunk);
        rest = next;
        index += 1;
    }

    Ok(out)
}
