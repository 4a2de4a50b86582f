//! A real server on one port, reached over plaintext, TLS and mutual TLS.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use disco_core::SymmetricKey;
use disco_identity::{Role, User};
use disco_net::{ApiState, HttpJoinTransport, NetError, RemoteClient, Server, ServerConfig};
use disco_pair::{
    issue_invite, redeem_invite, CertificateAuthority, JoinConfig, JoinRequest, JoinService,
    JoinTransport, PairError,
};
use disco_store::{Catalog, MemoryCatalog, MemoryStore, Store};

struct Running {
    addr: SocketAddr,
    catalog: Arc<MemoryCatalog>,
    store: Arc<MemoryStore>,
    root: SymmetricKey,
    authority: Arc<CertificateAuthority>,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<disco_net::Result<()>>,
}

async fn start() -> Running {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .create_role(&Role::new("rw", vec!["rw:default:store:*".parse().unwrap()]))
        .await
        .unwrap();
    catalog
        .create_user(&User::remote("carol", vec![Role::new("rw", vec![])]))
        .await
        .unwrap();

    let root = SymmetricKey::generate();
    let store = Arc::new(MemoryStore::new(root.derive("test store")));
    let authority = Arc::new(CertificateAuthority::generate("localhost").unwrap());
    let join = Arc::new(JoinService::new(
        catalog.clone(),
        root.clone(),
        authority.clone(),
        JoinConfig::default(),
    ));
    let state = ApiState {
        store: store.clone(),
        catalog: catalog.clone(),
        join,
    };
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    };
    let server = Server::bind(&config, &authority, state).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.serve(shutdown.clone()));

    Running {
        addr,
        catalog,
        store,
        root,
        authority,
        shutdown,
        handle,
    }
}

async fn raw_http(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

/// A TLS client that trusts the node CA but presents no certificate.
fn anonymous_tls_client(server: &Running) -> reqwest::Client {
    let mut roots = rustls::RootCertStore::empty();
    for cert in disco_net::tls::parse_certs(server.authority.cert_pem()).unwrap() {
        roots.add(cert).unwrap();
    }
    let mut config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS13])
    .unwrap()
    .with_root_certificates(roots)
    .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    reqwest::Client::builder()
        .use_preconfigured_tls(config)
        .resolve("localhost", server.addr)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_plaintext_and_tls_share_a_port() {
    let server = start().await;

    let plain = raw_http(
        server.addr,
        "GET /api/v1/ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(plain.starts_with("HTTP/1.1 200"), "{}", plain);
    assert!(plain.ends_with('.'));

    let client = anonymous_tls_client(&server);
    let url = format!("https://localhost:{}/api/v1/ping", server.addr.port());
    let response = client.get(url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), ".");

    server.shutdown.cancel();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_store_requires_client_certificate() {
    let server = start().await;

    let plain = raw_http(
        server.addr,
        "GET /api/v1/store/keys HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(plain.starts_with("HTTP/1.1 401"), "{}", plain);

    let client = anonymous_tls_client(&server);
    let url = format!("https://localhost:{}/api/v1/store/keys", server.addr.port());
    assert_eq!(client.get(url).send().await.unwrap().status(), 401);

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_join_errors_over_http() {
    let server = start().await;
    let transport = HttpJoinTransport::new(Duration::from_secs(5)).unwrap();
    let address = server.addr.to_string();

    let unknown = JoinRequest::new(
        &[9u8; 32],
        &disco_core::X25519StaticSecret::generate().public_key(),
    );
    assert!(matches!(
        transport.join(&address, unknown).await,
        Err(PairError::Unauthorized)
    ));

    let malformed = JoinRequest {
        token: None,
        public_key: "???".to_string(),
    };
    assert!(matches!(
        transport.join(&address, malformed).await,
        Err(PairError::BadRequest(_))
    ));

    server.shutdown.cancel();
}

#[tokio::test]
async fn test_joined_client_reads_and_writes() {
    let server = start().await;
    server.store.set("default", "app/config", b"v1").await.unwrap();

    let issued = issue_invite(
        server.catalog.as_ref(),
        &server.root,
        "carol",
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    let b_catalog = MemoryCatalog::new();
    let b_root = SymmetricKey::generate();
    let transport = HttpJoinTransport::new(Duration::from_secs(5)).unwrap();
    let remote = redeem_invite(
        &transport,
        &b_catalog,
        &b_root,
        "a",
        &server.addr.to_string(),
        &issued.token.to_string(),
    )
    .await
    .unwrap();

    let client = RemoteClient::connect(&remote, &b_root, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(
        client.get("default", "app/config").await.unwrap().as_deref(),
        Some(&b"v1"[..])
    );
    assert_eq!(client.get("default", "missing").await.unwrap(), None);

    client.set("default", "app/new key", b"v2").await.unwrap();
    assert_eq!(
        server.store.get("default", "app/new key").await.unwrap().as_deref(),
        Some(&b"v2"[..])
    );

    let keys = client.list("default", "app/").await.unwrap();
    assert_eq!(keys["default"], vec!["app/config", "app/new key"]);

    // Outside the role's namespace.
    match client.set("other", "k", b"v").await {
        Err(NetError::Remote { status, .. }) => assert_eq!(status, 403),
        other => panic!("unexpected {:?}", other),
    }
    match client.get("*", "k").await {
        Err(NetError::Remote { status, .. }) => assert_eq!(status, 400),
        other => panic!("unexpected {:?}", other),
    }

    client.delete("default", "app/config").await.unwrap();
    match client.delete("default", "app/config").await {
        Err(NetError::Remote { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected {:?}", other),
    }

    server.shutdown.cancel();
    server.handle.await.unwrap().unwrap();
}
