//! One listener, two protocols.
//!
//! Every accepted connection is peeked for a TLS handshake record. TLS
//! connections go through the rustls acceptor; anything else is served as
//! plaintext HTTP. The peeked bytes are replayed to whichever side reads the
//! stream next.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes};
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// Bytes inspected before a connection is classified.
pub const PEEK_LEN: usize = 3;

/// Time a client gets to send its first bytes and finish a TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether `prefix` starts a TLS handshake record (content type 22, major
/// version 3, minor version at most 3).
pub fn is_tls_handshake(prefix: &[u8]) -> bool {
    matches!(prefix, [0x16, 0x03, minor, ..] if *minor <= 0x03)
}

/// Per-connection facts exposed to request handlers as an extension.
#[derive(Debug, Clone)]
pub struct ConnInfo {
    /// Whether the connection is TLS.
    pub tls: bool,
    /// Remote socket address.
    pub peer_addr: SocketAddr,
    /// Leaf client certificate, already verified against the node CA.
    pub client_cert: Option<Arc<CertificateDer<'static>>>,
}

/// A stream whose first bytes were already read and are replayed first.
#[derive(Debug)]
pub struct Rewind<S> {
    prefix: Bytes,
    inner: S,
}

impl<S> Rewind<S> {
    pub fn new(prefix: Bytes, inner: S) -> Self {
        Self { prefix, inner }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Rewind<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.prefix.has_remaining() {
            let n = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Rewind<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// A classified connection.
pub enum HybridStream {
    Plain(Rewind<TcpStream>),
    Tls(Box<TlsStream<Rewind<TcpStream>>>),
}

impl AsyncRead for HybridStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            HybridStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HybridStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HybridStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            HybridStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HybridStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            HybridStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HybridStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            HybridStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HybridStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Read up to `PEEK_LEN` bytes, stopping early only at end of stream.
async fn read_prefix<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<Vec<u8>> {
    let mut prefix = vec![0u8; PEEK_LEN];
    let mut filled = 0;
    while filled < PEEK_LEN {
        let n = stream.read(&mut prefix[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    prefix.truncate(filled);
    Ok(prefix)
}

/// TCP listener that serves TLS and plaintext on the same port.
pub struct HybridListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl HybridListener {
    /// Bind to `addr`, terminating TLS with `tls`.
    pub async fn bind(addr: impl ToSocketAddrs, tls: Arc<rustls::ServerConfig>) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            acceptor: TlsAcceptor::from(tls),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the next raw TCP connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    /// A handle that classifies connections on another task.
    pub fn classifier(&self) -> Classifier {
        Classifier {
            acceptor: self.acceptor.clone(),
        }
    }
}

/// Detects the protocol of accepted connections.
#[derive(Clone)]
pub struct Classifier {
    acceptor: TlsAcceptor,
}

impl Classifier {
    /// Peek at `stream` and complete the TLS handshake if it starts one.
    ///
    /// Returns `None` for connections that close before sending enough bytes
    /// to classify.
    pub async fn classify(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> io::Result<Option<(HybridStream, ConnInfo)>> {
        tokio::time::timeout(HANDSHAKE_TIMEOUT, self.classify_inner(stream, peer_addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))?
    }

    async fn classify_inner(
        &self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> io::Result<Option<(HybridStream, ConnInfo)>> {
        let prefix = read_prefix(&mut stream).await?;
        if prefix.len() < PEEK_LEN {
            tracing::debug!(peer = %peer_addr, "connection closed before classification");
            return Ok(None);
        }

        let tls = is_tls_handshake(&prefix);
        tracing::debug!(peer = %peer_addr, tls, "classified connection");
        let stream = Rewind::new(Bytes::from(prefix), stream);

        if !tls {
            let info = ConnInfo {
                tls: false,
                peer_addr,
                client_cert: None,
            };
            return Ok(Some((HybridStream::Plain(stream), info)));
        }

        let stream = self.acceptor.accept(stream).await?;
        let client_cert = stream
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|cert| Arc::new(cert.clone().into_owned()));
        let info = ConnInfo {
            tls: true,
            peer_addr,
            client_cert,
        };
        Ok(Some((HybridStream::Tls(Box::new(stream)), info)))
    }
}
