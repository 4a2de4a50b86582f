//! Joining side of the handshake.

use zeroize::Zeroizing;

use disco_core::{decode, decrypt_symmetric, encrypt_symmetric, SymmetricKey, X25519StaticSecret};
use disco_identity::{now_millis, Remote};
use disco_store::{Catalog, StoreError};

use crate::error::{PairError, Result};
use crate::messages::{JoinRequest, JoinResponse};
use crate::token::CompositeToken;
use crate::transport::JoinTransport;

/// Redeem `composite` against the node at `address` and store the resulting
/// credentials as remote `name`.
///
/// Nothing is sent if the token is malformed or the name is taken, and
/// nothing is stored unless the credentials decrypt.
pub async fn redeem_invite(
    transport: &dyn JoinTransport,
    catalog: &dyn Catalog,
    root_key: &SymmetricKey,
    name: &str,
    address: &str,
    composite: &str,
) -> Result<Remote> {
    let token = CompositeToken::decode(composite)?;

    match catalog.remote(name).await {
        Ok(_) => {
            return Err(StoreError::AlreadyExists(format!("remote '{}' already exists", name)).into())
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let ephemeral = X25519StaticSecret::generate();
    let sealing_key = ephemeral.diffie_hellman(token.public_key())?.symmetric_key();

    let request = JoinRequest::new(token.token(), &ephemeral.public_key());
    let response = transport.join(address, request).await?;

    let JoinResponse {
        tls_ca_cert,
        tls_server_san,
        tls_client_cert_enc,
        tls_client_key_enc,
    } = response;
    let cert = open_field(&tls_client_cert_enc, &sealing_key, "tls_client_cert_enc")?;
    let key = open_field(&tls_client_key_enc, &sealing_key, "tls_client_key_enc")?;

    let remote = Remote {
        id: 0,
        created_at: now_millis(),
        name: name.to_string(),
        address: address.to_string(),
        tls_ca_cert,
        tls_server_san,
        tls_client_cert_enc: encrypt_symmetric(&cert, root_key)?,
        tls_client_key_enc: encrypt_symmetric(&key, root_key)?,
    };
    let remote = catalog.create_remote(&remote).await?;
    tracing::info!(remote = %remote.name, address = %remote.address, "joined remote node");
    Ok(remote)
}

fn open_field(field: &str, key: &SymmetricKey, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    let sealed = decode(field)
        .map_err(|_| PairError::Protocol(format!("{} is not valid base58", name)))?;
    Ok(Zeroizing::new(decrypt_symmetric(&sealed, key)?))
}

/// TLS client credentials of a remote, unsealed.
pub struct RemoteCredentials {
    /// The remote's CA certificate, PEM.
    pub ca_cert_pem: String,
    /// Name to verify the remote's server certificate against.
    pub server_san: String,
    /// Client certificate, PEM.
    pub cert_pem: String,
    /// Client private key, PEM.
    pub key_pem: Zeroizing<String>,
}

impl RemoteCredentials {
    /// Unseal the credentials stored for `remote`.
    pub fn open(remote: &Remote, root_key: &SymmetricKey) -> Result<Self> {
        let cert = decrypt_symmetric(&remote.tls_client_cert_enc, root_key)?;
        let mut key = Zeroizing::new(decrypt_symmetric(&remote.tls_client_key_enc, root_key)?);
        let cert_pem = String::from_utf8(cert)
            .map_err(|_| PairError::Protocol("client certificate is not valid PEM".to_string()))?;
        let key_pem = String::from_utf8(std::mem::take(&mut *key))
            .map_err(|_| PairError::Protocol("client key is not valid PEM".to_string()))?;
        Ok(Self {
            ca_cert_pem: remote.tls_ca_cert.clone(),
            server_san: remote.tls_server_san.clone(),
            cert_pem,
            key_pem: Zeroizing::new(key_pem),
        })
    }
}

impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("server_san", &self.server_san)
            .finish_non_exhaustive()
    }
}
