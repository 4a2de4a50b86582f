//! HTTP clients for talking to other nodes.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode, Url};

use disco_core::SymmetricKey;
use disco_identity::Remote;
use disco_pair::{JoinRequest, JoinResponse, JoinTransport, PairError, RemoteCredentials};
use disco_store::{Keys, StoreError};

use crate::api::join::JoinBody;
use crate::api::store::KeysBody;
use crate::api::{ErrorBody, API_PREFIX};
use crate::error::{NetError, Result};
use crate::tls;

/// Port assumed when an address has none.
pub const DEFAULT_PORT: u16 = 2020;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// `address` as `host:port`, with [`DEFAULT_PORT`] added when it has none.
///
/// Bare and bracketed IPv6 addresses are recognised before looking for a
/// `:port` suffix.
fn with_port(address: &str) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    let bare = address
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(address);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    match address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => address.to_string(),
        _ => format!("{}:{}", address, DEFAULT_PORT),
    }
}

async fn resolve(address: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(with_port(address))
        .await?
        .next()
        .ok_or_else(|| {
            NetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("address '{}' did not resolve", address),
            ))
        })
}

/// Turn a non-success response into `NetError::Remote`.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(NetError::Remote {
        status: status.as_u16(),
        message,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Join
// ─────────────────────────────────────────────────────────────────────────────

/// Sends join requests over plaintext HTTP.
#[derive(Debug, Clone)]
pub struct HttpJoinTransport {
    client: Client,
}

impl HttpJoinTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl JoinTransport for HttpJoinTransport {
    async fn join(&self, address: &str, request: JoinRequest) -> disco_pair::Result<JoinResponse> {
        let url = format!("http://{}{}/join", with_port(address), API_PREFIX);
        let mut builder = self.client.post(url).body(request.public_key);
        if let Some(token) = request.token {
            builder = builder.header(AUTHORIZATION, token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PairError::Transport(e.to_string()))?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(PairError::Unauthorized),
            status => {
                let message = match check(response).await {
                    Err(NetError::Remote { message, .. }) => message,
                    _ => String::new(),
                };
                return Err(if status == StatusCode::BAD_REQUEST {
                    PairError::BadRequest(message)
                } else {
                    PairError::Protocol(format!("join failed with {}: {}", status, message))
                });
            }
        }

        let body: JoinBody = response
            .json()
            .await
            .map_err(|e| PairError::Protocol(format!("invalid join response: {}", e)))?;
        Ok(body.response)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Store operations against a remote node over mutual TLS.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base: Url,
}

impl RemoteClient {
    /// Build a client for `remote`, unsealing its credentials with `root_key`.
    ///
    /// The remote's server name is pinned to its resolved address so the
    /// certificate is checked against the name the remote was joined with.
    pub async fn connect(remote: &Remote, root_key: &SymmetricKey, timeout: Duration) -> Result<Self> {
        let creds = RemoteCredentials::open(remote, root_key)?;
        let config = tls::client_config(&creds.ca_cert_pem, &creds.cert_pem, &creds.key_pem)?;
        let addr = resolve(&remote.address).await?;

        let client = Client::builder()
            .use_preconfigured_tls(config)
            .resolve(&creds.server_san, addr)
            .timeout(timeout)
            .build()?;
        let base = Url::parse(&format!("https://{}:{}/", creds.server_san, addr.port()))
            .map_err(|e| NetError::Tls(format!("invalid server name '{}': {}", creds.server_san, e)))?;

        Ok(Self { client, base })
    }

    fn value_url(&self, key: &str, namespace: &str) -> Result<Url> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey.into());
        }
        self.url(&["store", "value"], key, namespace)
    }

    fn url(&self, segments: &[&str], key: &str, namespace: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NetError::Tls("base URL cannot carry a path".to_string()))?
            .clear()
            .extend(API_PREFIX.trim_start_matches('/').split('/'))
            .extend(segments)
            .extend(key.split('/').filter(|_| !key.is_empty()));
        url.query_pairs_mut().append_pair("namespace", namespace);
        Ok(url)
    }

    /// Get `key`, `None` if the remote has no such key.
    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.value_url(key, namespace)?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = check(response).await?.bytes().await?;
        Ok(Some(value.to_vec()))
    }

    pub async fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        let url = self.value_url(key, namespace)?;
        check(self.client.post(url).body(value.to_vec()).send().await?).await?;
        Ok(())
    }

    pub async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let url = self.value_url(key, namespace)?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    /// List keys starting with `prefix`; `namespace` may be `*`.
    pub async fn list(&self, namespace: &str, prefix: &str) -> Result<Keys> {
        let url = self.url(&["store", "keys"], prefix, namespace)?;
        let body: KeysBody = check(self.client.get(url).send().await?).await?.json().await?;
        Ok(body.keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        assert_eq!(with_port("10.0.0.1"), "10.0.0.1:2020");
        assert_eq!(with_port("node:3000"), "node:3000");
        assert_eq!(with_port("localhost"), "localhost:2020");
    }

    #[test]
    fn test_default_port_ipv6() {
        assert_eq!(with_port("::1"), "[::1]:2020");
        assert_eq!(with_port("[::1]"), "[::1]:2020");
        assert_eq!(with_port("[::1]:3000"), "[::1]:3000");
        assert_eq!(with_port("fe80::1:2"), "[fe80::1:2]:2020");
        assert_eq!(with_port("127.0.0.1:80"), "127.0.0.1:80");
    }

    #[tokio::test]
    async fn test_resolve_bare_ipv6() {
        let addr = resolve("::1").await.unwrap();
        assert_eq!(addr, "[::1]:2020".parse::<SocketAddr>().unwrap());
    }
}
