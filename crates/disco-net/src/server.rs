//! The node server.
//!
//! Each accepted connection is classified and served on its own task. The
//! server mints a fresh leaf certificate from the node CA every time it
//! starts.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use disco_pair::CertificateAuthority;

use crate::api::{self, ApiState};
use crate::error::Result;
use crate::hybrid::{Classifier, HybridListener};
use crate::tls;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:2020";

/// Configuration for the node server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub listen_addr: String,
    /// Validity of the server leaf certificate.
    pub server_cert_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            server_cert_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// A bound server, ready to accept connections.
pub struct Server {
    listener: HybridListener,
    router: Router,
}

impl Server {
    /// Mint the server certificate and bind the listener.
    pub async fn bind(
        config: &ServerConfig,
        authority: &CertificateAuthority,
        state: ApiState,
    ) -> Result<Self> {
        let leaf = authority.issue_server(config.server_cert_ttl)?;
        let tls = tls::server_config(authority.cert_pem(), &leaf.cert_pem, &leaf.key_pem)?;
        let listener = HybridListener::bind(config.listen_addr.as_str(), tls).await?;
        let router = api::router(state).layer(TraceLayer::new_for_http());

        tracing::info!(
            addr = %listener.local_addr()?,
            san = %authority.server_san(),
            "server listening"
        );
        Ok(Self { listener, router })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled, then let open
    /// connections finish their in-flight requests.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let classifier = self.listener.classifier();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    connections.spawn(serve_connection(
                        classifier.clone(),
                        stream,
                        peer,
                        self.router.clone(),
                        shutdown.clone(),
                    ));
                }
            }
        }

        tracing::info!(open = connections.len(), "server shutting down");
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

async fn serve_connection(
    classifier: Classifier,
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
) {
    let (stream, info) = match classifier.classify(stream, peer).await {
        Ok(Some(classified)) => classified,
        Ok(None) => return,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "handshake failed");
            return;
        }
    };

    let service = router.map_request(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(info.clone());
        req
    });
    let service = TowerToHyperService::new(service);

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(peer = %peer, error = %e, "connection error");
    }
}
