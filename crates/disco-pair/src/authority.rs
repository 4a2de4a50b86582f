//! The node certificate authority.
//!
//! Each node owns one CA, created at init and persisted in the catalog with
//! its private key sealed by the root key. It signs the server's leaf
//! certificate and every client certificate handed out by a join.

use std::time::{Duration, SystemTime};

use zeroize::Zeroizing;

use disco_core::{
    decrypt_symmetric, encrypt_symmetric, issue_certificate, CoreError, IssuedCertificate, Issuer,
    SymmetricKey,
};
use disco_store::NodeMeta;

use crate::error::Result;

/// Common name of the node CA certificate.
pub const CA_COMMON_NAME: &str = "disco CA";

/// Common name of the server leaf certificate.
pub const SERVER_COMMON_NAME: &str = "disco server";

/// Subject alternative name carried by client certificates.
pub const CLIENT_SAN: &str = "localhost";

/// Validity of a node CA.
pub const CA_VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A CA certificate with its private key in the clear.
pub struct CertificateAuthority {
    cert_pem: String,
    key_pem: Zeroizing<String>,
    server_san: String,
}

impl CertificateAuthority {
    /// Create a new self-signed CA for a server reachable as `server_san`.
    pub fn generate(server_san: impl Into<String>) -> Result<Self> {
        let server_san = server_san.into();
        let issued = issue_certificate(
            CA_COMMON_NAME,
            &[server_san.clone()],
            SystemTime::now() + CA_VALIDITY,
            None,
        )?;
        Ok(Self::from_issued(issued, server_san))
    }

    /// Unseal a CA persisted in node metadata.
    pub fn from_meta(meta: &NodeMeta, root_key: &SymmetricKey) -> Result<Self> {
        let mut key = Zeroizing::new(decrypt_symmetric(&meta.ca_key_enc, root_key)?);
        let key_pem = String::from_utf8(std::mem::take(&mut *key)).map_err(|_| {
            CoreError::CertificateError("CA private key is not valid PEM".to_string())
        })?;
        Ok(Self {
            cert_pem: meta.ca_cert_pem.clone(),
            key_pem: Zeroizing::new(key_pem),
            server_san: meta.server_san.clone(),
        })
    }

    /// Seal this CA into node metadata for `version`.
    pub fn to_meta(&self, version: &str, root_key: &SymmetricKey) -> Result<NodeMeta> {
        Ok(NodeMeta {
            version: version.to_string(),
            ca_cert_pem: self.cert_pem.clone(),
            ca_key_enc: encrypt_symmetric(self.key_pem.as_bytes(), root_key)?,
            server_san: self.server_san.clone(),
        })
    }

    fn from_issued(issued: IssuedCertificate, server_san: String) -> Self {
        let IssuedCertificate { cert_pem, key_pem } = issued;
        Self {
            cert_pem,
            key_pem: Zeroizing::new(key_pem),
            server_san,
        }
    }

    fn issuer(&self) -> Issuer<'_> {
        Issuer {
            cert_pem: &self.cert_pem,
            key_pem: &self.key_pem,
        }
    }

    /// The CA certificate, PEM.
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// The name clients verify the server certificate against.
    pub fn server_san(&self) -> &str {
        &self.server_san
    }

    /// Issue a client certificate identifying `user`.
    pub fn issue_client(&self, user: &str, validity: Duration) -> Result<IssuedCertificate> {
        Ok(issue_certificate(
            user,
            &[CLIENT_SAN.to_string()],
            SystemTime::now() + validity,
            Some(self.issuer()),
        )?)
    }

    /// Issue the server's leaf certificate.
    pub fn issue_server(&self, validity: Duration) -> Result<IssuedCertificate> {
        Ok(issue_certificate(
            SERVER_COMMON_NAME,
            &[self.server_san.clone()],
            SystemTime::now() + validity,
            Some(self.issuer()),
        )?)
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("server_san", &self.server_san)
            .finish_non_exhaustive()
    }
}
