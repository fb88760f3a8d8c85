//! Transport streams.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector trusting the Mozilla root set.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Opens the transport described by `config`.
///
/// # Errors
///
/// - [`Error::Timeout`] if the connect (and handshake) takes longer than
///   `config.connect_timeout`
/// - [`Error::Transport`], [`Error::Tls`] or [`Error::InvalidDnsName`]
pub async fn connect(config: &Config) -> Result<ImapStream> {
    tokio::time::timeout(config.connect_timeout, open(config))
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}

async fn open(config: &Config) -> Result<ImapStream> {
    let addr = format!("{}:{}", config.host, config.port);
    let tcp = TcpStream::connect(&addr).await?;
    tcp.set_nodelay(true)?;
    debug!(%addr, security = ?config.security, "connected");

    match config.security {
        Security::None => Ok(ImapStream::Plain(tcp)),
        Security::Implicit => {
            let server_name = ServerName::try_from(config.host.clone())?;
            let tls = create_tls_connector().connect(server_name, tcp).await?;
            Ok(ImapStream::Tls(Box::new(tls)))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn plain_connect_round_trips_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"* OK hi\r\n").await.unwrap();
        });

        let config = Config::builder("127.0.0.1")
            .security(Security::None)
            .port(port)
            .build();
        let mut stream = connect(&config).await.unwrap();
        assert!(!stream.is_tls());
        let mut buf = [0u8; 9];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"* OK hi\r\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_times_out() {
        // Non-routable address: the SYN goes nowhere.
        let config = Config::builder("10.255.255.1")
            .security(Security::None)
            .connect_timeout(std::time::Duration::from_millis(50))
            .build();
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_) | Error::Transport(_)));
    }
}
