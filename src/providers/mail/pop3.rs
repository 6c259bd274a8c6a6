//! POP3 mailbox pager.
//!
//! POP3 (RFC 1939) exposes a mailbox as messages numbered `1..=N`, oldest
//! first. A page is read by opening a session, asking for `N` with `STAT`,
//! and issuing `RETR` for each index in the page window from highest to
//! lowest. The protocol allows one outstanding command per session, so
//! messages are retrieved one at a time.
//!
//! # Session lifecycle
//!
//! Each [`fetch_page`](MailboxPager::fetch_page) call opens its own session
//! and sends `QUIT` before returning, whether the page succeeded, a message
//! failed to parse, or the session deadline expired.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::parser::parse_message;
use super::transport::{self, within, Deadline, MailStream};
use super::window::PageWindow;
use super::{MailboxPager, Result, RetrievalError};
use crate::domain::{NormalizedMessage, PageRequest, PageResult, Protocol, ServerConfig};

/// Upper bound on the `QUIT` exchange.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Page reader for a POP3 mailbox.
#[derive(Debug, Clone)]
pub struct Pop3Client {
    config: ServerConfig,
    timeout: Option<Duration>,
}

impl Pop3Client {
    /// Creates a client for one account.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            timeout: None,
        }
    }

    /// Sets one deadline covering connect, login, and the page work.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MailboxPager for Pop3Client {
    fn protocol(&self) -> Protocol {
        Protocol::Sequential
    }

    async fn fetch_page(&self, page: &PageRequest) -> Result<PageResult> {
        let deadline = Deadline::start(self.timeout);
        let mut session = within(deadline, async {
            let stream = transport::connect(&self.config).await?;
            Pop3Session::login(stream, &self.config).await
        })
        .await?;
        tracing::debug!(host = %self.config.host, "POP3 session opened");

        let result = within(deadline, session.read_page(page)).await;

        match tokio::time::timeout(CLOSE_TIMEOUT, session.quit()).await {
            Ok(Ok(())) => tracing::debug!(host = %self.config.host, "POP3 session closed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "POP3 QUIT failed"),
            Err(_) => tracing::warn!("POP3 QUIT timed out"),
        }

        result.map(PageResult::messages)
    }
}

/// An authenticated POP3 session.
struct Pop3Session {
    stream: BufReader<Box<dyn MailStream>>,
}

impl Pop3Session {
    /// Reads the greeting and authenticates with `USER`/`PASS`.
    async fn login(stream: Box<dyn MailStream>, config: &ServerConfig) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
        };

        session
            .read_status()
            .await
            .map_err(|e| RetrievalError::Connection(format!("no POP3 greeting: {}", e)))?;
        session
            .command(&format!("USER {}", config.username))
            .await
            .map_err(|e| RetrievalError::Connection(format!("POP3 USER rejected: {}", e)))?;
        session
            .command(&format!("PASS {}", config.secret))
            .await
            .map_err(|e| RetrievalError::Connection(format!("POP3 login failed: {}", e)))?;

        Ok(session)
    }

    /// Retrieves and parses the page window, newest first.
    async fn read_page(&mut self, page: &PageRequest) -> Result<Vec<NormalizedMessage>> {
        let total = self.stat().await?;
        let Some(window) = PageWindow::compute(total, page) else {
            tracing::debug!(total, page = page.page_number, "POP3 page past the end");
            return Ok(Vec::new());
        };
        tracing::debug!(
            total,
            start = window.start(),
            end = window.end(),
            "POP3 page window"
        );

        let mut messages = Vec::with_capacity(window.count());
        for index in window.iter_desc() {
            let raw = self.retr(index).await?;
            let message = parse_message(&raw).map_err(|e| match e {
                RetrievalError::Parse(reason) => {
                    RetrievalError::Parse(format!("message {}: {}", index, reason))
                }
                other => other,
            })?;
            messages.push(message);
        }

        tracing::info!(count = messages.len(), total, "POP3 page retrieved");
        Ok(messages)
    }

    /// Returns the message count reported by `STAT`.
    async fn stat(&mut self) -> Result<u32> {
        let reply = self.command("STAT").await?;
        reply
            .split_whitespace()
            .next()
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| RetrievalError::Protocol(format!("unexpected STAT reply: {}", reply)))
    }

    /// Retrieves message `index` with dot-unstuffing applied.
    async fn retr(&mut self, index: u32) -> Result<Vec<u8>> {
        self.command(&format!("RETR {}", index)).await?;

        let mut body = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = self
                .stream
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| RetrievalError::Protocol(format!("reading message {}: {}", index, e)))?;
            if read == 0 {
                return Err(RetrievalError::Protocol(format!(
                    "connection closed while reading message {}",
                    index
                )));
            }
            if line == b".\r\n" || line == b".\n" {
                return Ok(body);
            }
            let content = if line.starts_with(b"..") {
                &line[1..]
            } else {
                &line[..]
            };
            body.extend_from_slice(content);
        }
    }

    async fn quit(&mut self) -> Result<()> {
        self.command("QUIT").await.map(|_| ())
    }

    /// Sends one command and returns the text after `+OK`.
    async fn command(&mut self, line: &str) -> Result<String> {
        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .map_err(|e| RetrievalError::Protocol(format!("write failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| RetrievalError::Protocol(format!("write failed: {}", e)))?;
        self.read_status().await
    }

    async fn read_status(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .stream
            .read_line(&mut line)
            .await
            .map_err(|e| RetrievalError::Protocol(format!("read failed: {}", e)))?;
        if read == 0 {
            return Err(RetrievalError::Protocol(
                "connection closed by server".to_string(),
            ));
        }

        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("+OK") {
            Ok(rest.trim_start().to_string())
        } else if let Some(rest) = line.strip_prefix("-ERR") {
            Err(RetrievalError::Protocol(format!(
                "server error: {}",
                rest.trim_start()
            )))
        } else {
            Err(RetrievalError::Protocol(format!(
                "unexpected reply: {}",
                line
            )))
        }
    }
}
