//! Invitations: single-use, expiring grants of a user's identity to a new node.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use disco_core::X25519PublicKey;

use crate::user::User;

/// Length of an invitation UUID.
pub const INVITE_UUID_LEN: usize = 12;

const UUID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// An invitation for a remote node to join as `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    /// Catalog-assigned identifier; 0 until persisted.
    pub id: i64,
    /// Short public identifier, see [`generate_invite_uuid`].
    pub uuid: String,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Expiry time (Unix ms).
    pub expires: i64,
    /// The user the joining node will act as.
    pub user: User,
    /// Secret token the joiner presents.
    pub token: [u8; 32],
    /// Public half of the invitation's ephemeral key pair.
    pub public_key: X25519PublicKey,
    /// Ephemeral private key, sealed with the node's root key.
    pub private_key_enc: Vec<u8>,
}

impl Invite {
    /// Whether the invitation has expired at `now` (Unix ms).
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires <= now
    }
}

/// Generate a 12-character lowercase alphanumeric UUID starting with a letter.
pub fn generate_invite_uuid() -> String {
    let mut rng = rand::thread_rng();
    let mut uuid = String::with_capacity(INVITE_UUID_LEN);
    uuid.push(char::from(UUID_ALPHABET[rng.gen_range(0..26)]));
    for _ in 1..INVITE_UUID_LEN {
        uuid.push(char::from(UUID_ALPHABET[rng.gen_range(0..UUID_ALPHABET.len())]));
    }
    uuid
}

/// Check that `s` could be all or a prefix of an invitation UUID.
pub fn is_valid_uuid_prefix(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= INVITE_UUID_LEN
        && s.bytes().all(|b| UUID_ALPHABET.contains(&b))
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
