//! Composite invitation tokens.
//!
//! A composite token is what an administrator hands to the joining operator:
//! base58 of the 32-byte invitation token followed by the issuer's ephemeral
//! public key. The second half of the token binds it to that public key, so
//! a corrupted key segment is caught locally before anything is sent.

use std::fmt;

use rand::RngCore;

use disco_core::{decode, encode, hash, CoreError, X25519PublicKey};
use disco_identity::Invite;

use crate::error::Result;

/// Length of the invitation token.
pub const TOKEN_LEN: usize = 32;

/// Length of a decoded composite token.
pub const COMPOSITE_LEN: usize = TOKEN_LEN + 32;

const RANDOM_LEN: usize = 16;
const BINDING_LABEL: &str = "disco 2024 invite token binding";

fn binding_tag(random: &[u8], public_key: &X25519PublicKey) -> [u8; TOKEN_LEN - RANDOM_LEN] {
    let mut input = Vec::with_capacity(RANDOM_LEN + 32);
    input.extend_from_slice(random);
    input.extend_from_slice(public_key.as_bytes());
    let digest = hash(BINDING_LABEL, &input);
    let mut tag = [0u8; TOKEN_LEN - RANDOM_LEN];
    tag.copy_from_slice(&digest[..TOKEN_LEN - RANDOM_LEN]);
    tag
}

/// An invitation token together with the issuer's ephemeral public key.
#[derive(Clone, PartialEq, Eq)]
pub struct CompositeToken {
    token: [u8; TOKEN_LEN],
    public_key: X25519PublicKey,
}

impl CompositeToken {
    /// Generate a fresh token bound to `public_key`.
    pub fn generate(public_key: X25519PublicKey) -> Self {
        let mut token = [0u8; TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut token[..RANDOM_LEN]);
        let tag = binding_tag(&token[..RANDOM_LEN], &public_key);
        token[RANDOM_LEN..].copy_from_slice(&tag);
        Self { token, public_key }
    }

    /// Rebuild the composite token of a stored invitation.
    pub fn from_invite(invite: &Invite) -> Self {
        Self {
            token: invite.token,
            public_key: invite.public_key,
        }
    }

    /// The 32-byte token the issuer looks invitations up by.
    pub fn token(&self) -> &[u8; TOKEN_LEN] {
        &self.token
    }

    /// The issuer's ephemeral public key.
    pub fn public_key(&self) -> &X25519PublicKey {
        &self.public_key
    }

    /// Base58 of the token half alone, as sent in the `Authorization` header.
    pub fn encode_token(&self) -> String {
        encode(&self.token)
    }

    /// Base58 of the full 64 bytes.
    pub fn encode(&self) -> String {
        let mut bytes = [0u8; COMPOSITE_LEN];
        bytes[..TOKEN_LEN].copy_from_slice(&self.token);
        bytes[TOKEN_LEN..].copy_from_slice(self.public_key.as_bytes());
        encode(&bytes)
    }

    /// Parse a composite token.
    ///
    /// Fails with `InvalidToken` unless the text decodes to exactly 64 bytes,
    /// and with `InvalidKey` when the public key does not match the binding.
    pub fn decode(text: &str) -> Result<Self> {
        let bytes = decode(text.trim())
            .map_err(|e| CoreError::InvalidToken(format!("token is not valid base58: {}", e)))?;
        if bytes.len() != COMPOSITE_LEN {
            return Err(CoreError::InvalidToken(format!(
                "expected {} bytes, got {}",
                COMPOSITE_LEN,
                bytes.len()
            ))
            .into());
        }

        let mut token = [0u8; TOKEN_LEN];
        token.copy_from_slice(&bytes[..TOKEN_LEN]);
        let public_key = X25519PublicKey::from_slice(&bytes[TOKEN_LEN..])?;

        if binding_tag(&token[..RANDOM_LEN], &public_key) != token[RANDOM_LEN..] {
            return Err(CoreError::InvalidKey(
                "public key does not match the invitation token".to_string(),
            )
            .into());
        }

        Ok(Self { token, public_key })
    }
}

impl fmt::Display for CompositeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for CompositeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeToken")
            .field("public_key", &self.public_key.encode())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PairError;
    use disco_core::X25519StaticSecret;
    use proptest::prelude::*;

    fn fresh() -> CompositeToken {
        CompositeToken::generate(X25519StaticSecret::generate().public_key())
    }

    #[test]
    fn test_decodes_to_same_parts() {
        let token = fresh();
        let parsed = CompositeToken::decode(&token.encode()).unwrap();
        assert_eq!(parsed, token);
        assert_eq!(decode(&token.encode()).unwrap().len(), COMPOSITE_LEN);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let short = encode(&[1u8; 63]);
        assert!(matches!(
            CompositeToken::decode(&short),
            Err(PairError::Core(CoreError::InvalidToken(_)))
        ));
        assert!(matches!(
            CompositeToken::decode("0OIl"),
            Err(PairError::Core(CoreError::InvalidToken(_)))
        ));
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let token = fresh();
        let pasted = format!("  {}\n", token);
        assert_eq!(CompositeToken::decode(&pasted).unwrap(), token);
    }

    #[test]
    fn test_debug_hides_token() {
        let token = fresh();
        let debug = format!("{:?}", token);
        assert!(!debug.contains(&token.encode_token()));
    }

    proptest! {
        #[test]
        fn test_tampered_key_detected(index in TOKEN_LEN..COMPOSITE_LEN, bit in 0u8..8) {
            let token = fresh();
            let mut bytes = decode(&token.encode()).unwrap();
            bytes[index] ^= 1 << bit;
            let result = CompositeToken::decode(&encode(&bytes));
            prop_assert!(matches!(result, Err(PairError::Core(CoreError::InvalidKey(_)))));
        }
    }
}
