//! Transport opening.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use rustls::{RootCertStore, pki_types::ServerName};
use socket2::{SockRef, TcpKeepalive};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    time::timeout,
};

use super::ClientConfig;

/// Byte stream carrying one connection.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Owned transport returned by a [`Connector`].
pub type BoxedTransport = Box<dyn Transport>;

/// Opens transports to the connection server.
///
/// Implementations must be cancellation-safe: dropping a pending `connect()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Open a new transport.
    async fn connect(&self) -> io::Result<BoxedTransport>;
}

/// TLS over TCP with the Mozilla root store.
#[derive(Clone)]
pub struct TlsConnector {
    host: String,
    port: u16,
    keepalive: Option<Duration>,
    connect_timeout: Option<Duration>,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Build a connector for the endpoint in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS configuration cannot be built.
    pub fn new(config: &ClientConfig) -> io::Result<Self> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(io::Error::other)?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            host: config.host().to_owned(),
            port: config.port(),
            keepalive: config.keepalive(),
            connect_timeout: config.connect_timeout(),
            tls: tokio_rustls::TlsConnector::from(Arc::new(tls)),
        })
    }

    fn apply_keepalive(&self, stream: &TcpStream) -> io::Result<()> {
        let Some(interval) = self.keepalive else {
            return Ok(());
        };
        let keepalive = TcpKeepalive::new().with_time(interval);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)
    }

    async fn open(&self) -> io::Result<BoxedTransport> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
        self.apply_keepalive(&tcp)?;
        let server_name = ServerName::try_from(self.host.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let tls = self.tls.connect(server_name, tcp).await?;
        Ok(Box::new(tls))
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(&self) -> io::Result<BoxedTransport> {
        match self.connect_timeout {
            Some(limit) => timeout(limit, self.open())
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?,
            None => self.open().await,
        }
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("keepalive", &self.keepalive)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
