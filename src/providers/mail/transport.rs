//! Socket setup shared by the POP3 and IMAP clients.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use super::{Result, RetrievalError};
use crate::domain::ServerConfig;

/// A byte stream carrying one mail session, plain or TLS.
pub trait MailStream: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> MailStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

/// Opens a TCP connection to the configured server, wrapped in TLS when
/// `use_tls` is set.
pub async fn connect(config: &ServerConfig) -> Result<Box<dyn MailStream>> {
    let tcp_stream = TcpStream::connect(config.address())
        .await
        .map_err(|e| RetrievalError::Connection(format!("TCP connect failed: {}", e)))?;

    if !config.use_tls {
        return Ok(Box::new(tcp_stream));
    }

    let tls_config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| RetrievalError::Connection(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(RootCertStore::from_iter(
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned(),
    ))
    .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| RetrievalError::Connection(format!("invalid server name: {}", e)))?;

    let tls_stream = connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| RetrievalError::Connection(format!("TLS handshake failed: {}", e)))?;

    Ok(Box::new(tls_stream))
}

/// One deadline shared by every phase of a session.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    /// Starts the clock, or returns `None` when no limit is configured.
    pub(crate) fn start(limit: Option<Duration>) -> Option<Self> {
        limit.map(|limit| Self {
            limit,
            at: Instant::now() + limit,
        })
    }
}

/// Runs `work` until the deadline, if there is one.
pub(crate) async fn within<T, F>(deadline: Option<Deadline>, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, work)
            .await
            .map_err(|_| RetrievalError::Timeout(deadline.limit))?,
        None => work.await,
    }
}
