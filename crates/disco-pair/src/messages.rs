//! Join handshake message types.
//!
//! Both messages carry binary material as base58 text so they survive HTTP
//! headers, plain bodies and JSON unchanged.

use serde::{Deserialize, Serialize};

use disco_core::{decode, encode, X25519PublicKey};

use crate::error::{PairError, Result};
use crate::token::TOKEN_LEN;

/// A join request as it arrives from the network.
///
/// Fields are kept as received; [`JoinRequest::validate`] checks their shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Base58 invitation token (the `Authorization` header).
    pub token: Option<String>,
    /// Base58 ephemeral public key of the joining node (the body).
    pub public_key: String,
}

impl JoinRequest {
    /// Build a request from decoded parts.
    pub fn new(token: &[u8; TOKEN_LEN], public_key: &X25519PublicKey) -> Self {
        Self {
            token: Some(encode(token)),
            public_key: public_key.encode(),
        }
    }

    /// Decode the token and public key, failing with `BadRequest`.
    pub fn validate(&self) -> Result<([u8; TOKEN_LEN], X25519PublicKey)> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PairError::BadRequest("missing invitation token".to_string()))?;
        let token: [u8; TOKEN_LEN] = decode(token)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| PairError::BadRequest("malformed invitation token".to_string()))?;

        let public_key = decode(self.public_key.trim())
            .map_err(|_| PairError::BadRequest("public key is not valid base58".to_string()))?;
        let public_key = X25519PublicKey::from_slice(&public_key)
            .map_err(|e| PairError::BadRequest(e.to_string()))?;

        Ok((token, public_key))
    }
}

/// Credentials returned by a successful join.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    /// The issuer's CA certificate, PEM.
    pub tls_ca_cert: String,
    /// Server name to verify the issuer's TLS certificate against.
    pub tls_server_san: String,
    /// Client certificate PEM sealed with the handshake secret, base58.
    pub tls_client_cert_enc: String,
    /// Client private key PEM sealed with the handshake secret, base58.
    pub tls_client_key_enc: String,
}

impl std::fmt::Debug for JoinResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinResponse")
            .field("tls_server_san", &self.tls_server_san)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_core::X25519StaticSecret;

    fn valid() -> JoinRequest {
        JoinRequest::new(&[3u8; TOKEN_LEN], &X25519StaticSecret::generate().public_key())
    }

    #[test]
    fn test_valid_request() {
        let request = valid();
        let (token, _) = request.validate().unwrap();
        assert_eq!(token, [3u8; TOKEN_LEN]);
    }

    #[test]
    fn test_shape_errors_are_bad_requests() {
        let cases = [
            JoinRequest { token: None, ..valid() },
            JoinRequest { token: Some("  ".to_string()), ..valid() },
            JoinRequest { token: Some(encode(&[1u8; 31])), ..valid() },
            JoinRequest { public_key: "not base58!".to_string(), ..valid() },
            JoinRequest { public_key: encode(&[1u8; 33]), ..valid() },
            JoinRequest { public_key: String::new(), ..valid() },
        ];
        for case in cases {
            assert!(
                matches!(case.validate(), Err(PairError::BadRequest(_))),
                "{:?}",
                case
            );
        }
    }

    #[test]
    fn test_response_json_field_names() {
        let response = JoinResponse {
            tls_ca_cert: "ca".to_string(),
            tls_server_san: "localhost".to_string(),
            tls_client_cert_enc: "c".to_string(),
            tls_client_key_enc: "k".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        for field in [
            "tls_ca_cert",
            "tls_server_san",
            "tls_client_cert_enc",
            "tls_client_key_enc",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
