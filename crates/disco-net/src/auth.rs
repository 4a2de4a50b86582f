//! Client certificate authentication.
//!
//! The TLS layer has already verified the certificate chain against the node
//! CA. This middleware only maps the certificate subject to a catalog user.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use disco_identity::User;

use crate::api::{ApiError, ApiState};
use crate::hybrid::ConnInfo;

/// Subject common name of a DER certificate.
pub fn subject_common_name(der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
    let cn = cert
        .subject()
        .iter_common_name()
        .next()?
        .as_str()
        .ok()?
        .to_string();
    Some(cn)
}

/// Require a verified client certificate naming an existing user.
///
/// The user is inserted into the request extensions for handlers.
pub async fn require_user(State(state): State<ApiState>, mut req: Request, next: Next) -> Response {
    // Request bodies are not Sync.
    let info = req.extensions().get::<ConnInfo>().cloned();
    match authenticate(&state, info).await {
        Ok(user) => {
            tracing::debug!(user = %user.name, path = %req.uri().path(), "authenticated request");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

async fn authenticate(state: &ApiState, info: Option<ConnInfo>) -> Result<User, ApiError> {
    let info = info.ok_or_else(|| {
        tracing::warn!("request without connection info");
        ApiError::Unauthorized
    })?;
    if !info.tls {
        tracing::warn!(peer = %info.peer_addr, "store request over plaintext rejected");
        return Err(ApiError::Unauthorized);
    }
    let cert = info.client_cert.as_ref().ok_or_else(|| {
        tracing::warn!(peer = %info.peer_addr, "store request without client certificate");
        ApiError::Unauthorized
    })?;
    let cn = subject_common_name(&cert[..]).ok_or_else(|| {
        tracing::warn!(peer = %info.peer_addr, "client certificate has no subject CN");
        ApiError::Unauthorized
    })?;

    state.catalog.user(&cn).await.map_err(|e| {
        tracing::warn!(subject = %cn, peer = %info.peer_addr, error = %e, "unknown certificate subject");
        ApiError::Unauthorized
    })
}
