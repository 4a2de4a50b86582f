//! rustls configuration for both ends of a connection.
//!
//! Both ends speak TLS 1.3 only and trust exactly one root: the CA of the
//! node that serves.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::error::{NetError, Result};

/// ALPN identifiers offered by the server, most preferred first.
const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Parse every certificate in a PEM bundle.
pub fn parse_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| NetError::Tls(format!("invalid certificate PEM: {}", e)))?;
    if certs.is_empty() {
        return Err(NetError::Tls("no certificate found in PEM".to_string()));
    }
    Ok(certs)
}

/// Parse the first private key in a PEM bundle.
pub fn parse_key(pem: &str) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| NetError::Tls(format!("invalid private key PEM: {}", e)))?
        .ok_or_else(|| NetError::Tls("no private key found in PEM".to_string()))
}

fn root_store(ca_pem: &str) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in parse_certs(ca_pem)? {
        roots.add(cert)?;
    }
    Ok(roots)
}

/// Server configuration presenting `cert_pem` and verifying any client
/// certificate against `ca_pem`. Clients without a certificate are still
/// accepted at the handshake; routes that need one check for it.
pub fn server_config(ca_pem: &str, cert_pem: &str, key_pem: &str) -> Result<Arc<ServerConfig>> {
    let provider = provider();
    let verifier = WebPkiClientVerifier::builder_with_provider(
        Arc::new(root_store(ca_pem)?),
        provider.clone(),
    )
    .allow_unauthenticated()
    .build()
    .map_err(|e| NetError::Tls(e.to_string()))?;

    let mut chain = parse_certs(cert_pem)?;
    chain.extend(parse_certs(ca_pem)?);

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, parse_key(key_pem)?)?;
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(Arc::new(config))
}

/// Client configuration trusting `ca_pem` and authenticating with the
/// given client certificate.
pub fn client_config(ca_pem: &str, cert_pem: &str, key_pem: &str) -> Result<ClientConfig> {
    let mut config = ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_root_certificates(root_store(ca_pem)?)
        .with_client_auth_cert(parse_certs(cert_pem)?, parse_key(key_pem)?)?;
    // The HTTP client is built without HTTP/2.
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_pair::CertificateAuthority;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_configs_from_authority() {
        let ca = CertificateAuthority::generate("localhost").unwrap();
        let server = ca.issue_server(DAY).unwrap();
        let client = ca.issue_client("bob", DAY).unwrap();

        let config = server_config(ca.cert_pem(), &server.cert_pem, &server.key_pem).unwrap();
        assert_eq!(config.alpn_protocols[0], b"h2");
        client_config(ca.cert_pem(), &client.cert_pem, &client.key_pem).unwrap();
    }

    #[test]
    fn test_rejects_garbage_pem() {
        assert!(matches!(parse_certs("nothing here"), Err(NetError::Tls(_))));
        assert!(matches!(parse_key("nothing here"), Err(NetError::Tls(_))));
    }
}
