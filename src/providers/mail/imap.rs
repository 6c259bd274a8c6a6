//! IMAP mailbox pager.
//!
//! Pages are addressed by message sequence number: the mailbox is opened
//! read-only with `EXAMINE`, its `EXISTS` count gives `N`, and the page
//! window is requested with one `FETCH start:end (UID BODY.PEEK[])`.
//!
//! Bodies arrive as a stream. Each one is handed to its own parse task as
//! soon as it is received, so parsing overlaps with delivery. The page is
//! complete only when every parse task has finished, not when the fetch
//! stream ends. Results are re-sorted by sequence number, newest first.
//! A window message that never receives a body fails the page.
//!
//! # Protocol Details
//!
//! - Uses IMAP4rev1 (RFC 3501) via `async-imap`
//! - `BODY.PEEK[]` leaves `\Seen` flags untouched
//! - `LOGOUT` is issued on every path once the login has succeeded

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinSet;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use super::parser::parse_message;
use super::transport::{self, within, Deadline, MailStream};
use super::window::PageWindow;
use super::{MailboxPager, Result, RetrievalError};
use crate::domain::{NormalizedMessage, PageRequest, PageResult, Protocol, ServerConfig};

/// Upper bound on the `LOGOUT` exchange.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Data items requested for every message in the window.
const FETCH_QUERY: &str = "(UID BODY.PEEK[])";

/// IMAP session over a plain or TLS stream (using tokio-util compat layer).
type ImapSession = async_imap::Session<Compat<Box<dyn MailStream>>>;

/// Page reader for an IMAP mailbox.
#[derive(Debug, Clone)]
pub struct ImapClient {
    config: ServerConfig,
    mailbox: String,
    timeout: Option<Duration>,
}

impl ImapClient {
    /// Creates a client reading `INBOX`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            mailbox: "INBOX".to_string(),
            timeout: None,
        }
    }

    /// Reads a different mailbox.
    pub fn with_mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.mailbox = mailbox.into();
        self
    }

    /// Sets one deadline covering connect, login, and the page work.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn login(&self) -> Result<ImapSession> {
        let stream = transport::connect(&self.config).await?;
        let client = async_imap::Client::new(stream.compat());

        client
            .login(&self.config.username, &self.config.secret)
            .await
            .map_err(|e| RetrievalError::Connection(format!("IMAP login failed: {}", e.0)))
    }

    async fn read_page(
        &self,
        session: &mut ImapSession,
        page: &PageRequest,
    ) -> Result<Vec<NormalizedMessage>> {
        let mailbox = session
            .examine(&self.mailbox)
            .await
            .map_err(|e| RetrievalError::Protocol(format!("EXAMINE failed: {}", e)))?;
        let total = mailbox.exists;

        let Some(window) = PageWindow::compute(total, page) else {
            tracing::debug!(total, page = page.page_number, "IMAP page past the end");
            return Ok(Vec::new());
        };
        tracing::debug!(
            total,
            start = window.start(),
            end = window.end(),
            "IMAP page window"
        );

        let mut tasks = JoinSet::new();
        let mut delivered = BTreeSet::new();
        {
            let stream = session
                .fetch(window.sequence_set(), FETCH_QUERY)
                .await
                .map_err(|e| RetrievalError::Protocol(format!("FETCH failed: {}", e)))?;
            futures::pin_mut!(stream);

            while let Some(item) = stream.next().await {
                let fetch =
                    item.map_err(|e| RetrievalError::Protocol(format!("FETCH failed: {}", e)))?;
                let seq = fetch.message;
                if !window.contains(seq) {
                    tracing::debug!(seq, "Ignoring unsolicited FETCH response");
                    continue;
                }
                // Flag-only updates may arrive for a message in the window.
                let Some(body) = fetch.body() else {
                    tracing::debug!(seq, "FETCH response without a body");
                    continue;
                };
                if !delivered.insert(seq) {
                    tracing::debug!(seq, "Duplicate FETCH body ignored");
                    continue;
                }
                let raw = body.to_vec();
                tasks.spawn_blocking(move || (seq, parse_message(&raw)));
            }
        }

        if let Some(missing) = window.iter_desc().find(|seq| !delivered.contains(seq)) {
            tasks.abort_all();
            tracing::warn!(
                expected = window.count(),
                received = delivered.len(),
                missing,
                "IMAP server returned fewer messages than the window holds"
            );
            return Err(RetrievalError::Protocol(format!(
                "FETCH returned no body for message {}",
                missing
            )));
        }

        let mut parsed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (seq, result) = joined
                .map_err(|e| RetrievalError::Protocol(format!("parse task failed: {}", e)))?;
            match result {
                Ok(message) => parsed.push((seq, message)),
                Err(RetrievalError::Parse(reason)) => {
                    tasks.abort_all();
                    return Err(RetrievalError::Parse(format!(
                        "message {}: {}",
                        seq, reason
                    )));
                }
                Err(other) => {
                    tasks.abort_all();
                    return Err(other);
                }
            }
        }

        parsed.sort_by(|a, b| b.0.cmp(&a.0));
        tracing::info!(count = parsed.len(), total, "IMAP page retrieved");
        Ok(parsed.into_iter().map(|(_, message)| message).collect())
    }
}

#[async_trait]
impl MailboxPager for ImapClient {
    fn protocol(&self) -> Protocol {
        Protocol::Range
    }

    async fn fetch_page(&self, page: &PageRequest) -> Result<PageResult> {
        let deadline = Deadline::start(self.timeout);
        let mut session = within(deadline, self.login()).await?;
        tracing::debug!(host = %self.config.host, mailbox = %self.mailbox, "IMAP session opened");

        let result = within(deadline, self.read_page(&mut session, page)).await;

        match tokio::time::timeout(CLOSE_TIMEOUT, session.logout()).await {
            Ok(Ok(())) => tracing::debug!(host = %self.config.host, "IMAP session closed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "IMAP LOGOUT failed"),
            Err(_) => tracing::warn!("IMAP LOGOUT timed out"),
        }

        result.map(PageResult::messages)
    }
}
