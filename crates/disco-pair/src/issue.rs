//! Issuing side of the handshake.

use std::time::Duration;

use zeroize::Zeroizing;

use disco_core::{encrypt_symmetric, SymmetricKey, X25519StaticSecret};
use disco_identity::{generate_invite_uuid, now_millis, Invite};
use disco_store::{Catalog, StoreError};

use crate::error::{PairError, Result};
use crate::token::CompositeToken;

/// UUID generation attempts before giving up on collisions.
const UUID_ATTEMPTS: usize = 3;

/// A stored invitation and the composite token to hand out for it.
#[derive(Debug, Clone)]
pub struct IssuedInvite {
    pub invite: Invite,
    pub token: CompositeToken,
}

fn expiry(ttl: Duration) -> Result<i64> {
    if ttl.is_zero() {
        return Err(PairError::BadRequest("invite TTL must be positive".to_string()));
    }
    let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    Ok(now_millis().saturating_add(ttl))
}

/// Create an invitation for the existing user `user_name`, valid for `ttl`.
///
/// The ephemeral private key is sealed with `root_key` before it is stored.
pub async fn issue_invite(
    catalog: &dyn Catalog,
    root_key: &SymmetricKey,
    user_name: &str,
    ttl: Duration,
) -> Result<IssuedInvite> {
    let user = catalog.user(user_name).await?;
    let expires = expiry(ttl)?;

    let ephemeral = X25519StaticSecret::generate();
    let public_key = ephemeral.public_key();
    let token = CompositeToken::generate(public_key);
    let secret = Zeroizing::new(ephemeral.to_bytes());
    let private_key_enc = encrypt_symmetric(secret.as_slice(), root_key)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let invite = Invite {
            id: 0,
            uuid: generate_invite_uuid(),
            created_at: now_millis(),
            expires,
            user: user.clone(),
            token: *token.token(),
            public_key,
            private_key_enc: private_key_enc.clone(),
        };
        match catalog.create_invite(&invite).await {
            Ok(invite) => {
                tracing::info!(uuid = %invite.uuid, user = %invite.user.name, "invite created");
                return Ok(IssuedInvite { invite, token });
            }
            Err(StoreError::AlreadyExists(_)) if attempt < UUID_ATTEMPTS => {
                tracing::debug!(attempt, "invite UUID collision, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Move the expiry of invitation `uuid` (or a unique prefix) to now + `ttl`.
pub async fn extend_invite(catalog: &dyn Catalog, uuid: &str, ttl: Duration) -> Result<Invite> {
    let expires = expiry(ttl)?;
    let invite = catalog.update_invite_expiry(uuid, expires).await?;
    tracing::info!(uuid = %invite.uuid, expires, "invite updated");
    Ok(invite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_core::{decrypt_symmetric, X25519StaticSecret};
    use disco_identity::User;
    use disco_store::MemoryCatalog;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn catalog_with_bob() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog.create_user(&User::remote("bob", vec![])).await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_issue_stores_sealed_secret() {
        let catalog = catalog_with_bob().await;
        let root = SymmetricKey::generate();

        let issued = issue_invite(&catalog, &root, "bob", HOUR).await.unwrap();
        let stored = catalog.invite(&issued.invite.uuid).await.unwrap();

        assert_eq!(stored.token, *issued.token.token());
        assert_eq!(stored.public_key, *issued.token.public_key());
        assert!(stored.expires > now_millis() + HOUR.as_millis() as i64 - 60_000);

        let secret = decrypt_symmetric(&stored.private_key_enc, &root).unwrap();
        let secret = X25519StaticSecret::from_slice(&secret).unwrap();
        assert_eq!(secret.public_key(), stored.public_key);
    }

    #[tokio::test]
    async fn test_issue_requires_user() {
        let catalog = MemoryCatalog::new();
        let err = issue_invite(&catalog, &SymmetricKey::generate(), "nobody", HOUR)
            .await
            .unwrap_err();
        assert!(matches!(err, PairError::Store(e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let catalog = catalog_with_bob().await;
        let err = issue_invite(&catalog, &SymmetricKey::generate(), "bob", Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PairError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_extend_by_prefix() {
        let catalog = catalog_with_bob().await;
        let issued = issue_invite(&catalog, &SymmetricKey::generate(), "bob", HOUR)
            .await
            .unwrap();

        let prefix = &issued.invite.uuid[..6];
        let extended = extend_invite(&catalog, prefix, 10 * HOUR).await.unwrap();
        assert_eq!(extended.uuid, issued.invite.uuid);
        assert!(extended.expires > issued.invite.expires);
    }
}
