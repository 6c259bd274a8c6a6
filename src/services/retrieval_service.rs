//! Retrieval coordinator.
//!
//! The [`RetrievalService`] validates an inbound [`FetchRequest`], builds the
//! matching pager, and admits POP3 sessions through a bounded FIFO gate. IMAP
//! and Gmail calls run unbounded here; the Gmail pager limits its own
//! per-message fan-out. Nothing is retried.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::config::Settings;
use crate::domain::{ConnectionConfig, FetchRequest, PageRequest, PageResult, Protocol};
use crate::providers::mail::{
    GmailAuthorizer, GmailClient, ImapClient, MailboxPager, Pop3Client, Result, RetrievalError,
};

/// Dispatches page requests to the POP3, IMAP and Gmail pagers.
#[derive(Debug, Clone)]
pub struct RetrievalService {
    settings: Arc<Settings>,
    pop3_permits: Arc<Semaphore>,
    http: reqwest::Client,
}

impl RetrievalService {
    /// Creates a service with its own HTTP client.
    pub fn new(settings: Settings) -> Self {
        Self::with_http_client(settings, reqwest::Client::new())
    }

    /// Creates a service that shares an existing HTTP client.
    pub fn with_http_client(settings: Settings, http: reqwest::Client) -> Self {
        let permits = settings.retrieval.pop3_concurrency.max(1);
        Self {
            settings: Arc::new(settings),
            pop3_permits: Arc::new(Semaphore::new(permits)),
            http,
        }
    }

    /// Returns the active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of POP3 sessions that could start right now.
    pub fn available_pop3_permits(&self) -> usize {
        self.pop3_permits.available_permits()
    }

    /// Validates a request into connection parameters and a page request.
    ///
    /// Runs before any network activity; every failure is
    /// [`RetrievalError::Input`].
    pub fn resolve(&self, request: FetchRequest) -> Result<(ConnectionConfig, PageRequest)> {
        let page = PageRequest::from_params(&request.page_size, &request.page_number)?;

        let config = match request.protocol {
            Protocol::Sequential => ConnectionConfig::Sequential(
                request
                    .credentials
                    .into_server_config(self.settings.pop3.port, self.settings.pop3.use_tls)?,
            ),
            Protocol::Range => ConnectionConfig::Range(
                request
                    .credentials
                    .into_server_config(self.settings.imap.port, self.settings.imap.use_tls)?,
            ),
            Protocol::Cursor => ConnectionConfig::Cursor(request.credentials.into_oauth()?),
        };

        let page = match &config {
            ConnectionConfig::Cursor(_) => page.with_cursor(request.cursor),
            _ => {
                if request.cursor.is_some() {
                    tracing::debug!(protocol = %request.protocol, "Ignoring cursor for index-based protocol");
                }
                page
            }
        };

        Ok((config, page))
    }

    /// Builds the pager for a validated connection.
    pub fn pager(&self, config: ConnectionConfig) -> Box<dyn MailboxPager> {
        let retrieval = &self.settings.retrieval;
        match config {
            ConnectionConfig::Sequential(server) => {
                Box::new(Pop3Client::new(server).with_timeout(retrieval.session_timeout()))
            }
            ConnectionConfig::Range(server) => Box::new(
                ImapClient::new(server)
                    .with_mailbox(self.settings.imap.mailbox.clone())
                    .with_timeout(retrieval.session_timeout()),
            ),
            ConnectionConfig::Cursor(tokens) => Box::new(
                GmailClient::new(self.http.clone(), tokens)
                    .with_api_base(self.settings.gmail.api_base.clone())
                    .with_fetch_concurrency(retrieval.gmail_fetch_concurrency),
            ),
        }
    }

    /// Validates and serves one inbound page request.
    pub async fn fetch_page(&self, request: FetchRequest) -> Result<PageResult> {
        let (config, page) = self.resolve(request)?;
        self.fetch(config, page).await
    }

    /// Serves one page for an already validated connection.
    pub async fn fetch(&self, config: ConnectionConfig, page: PageRequest) -> Result<PageResult> {
        let protocol = config.protocol();
        let span = tracing::info_span!(
            "fetch_page",
            request_id = %uuid::Uuid::new_v4(),
            protocol = %protocol,
            page_size = page.page_size,
            page_number = page.page_number,
        );

        async move {
            // Held until the session has been closed.
            let _permit = match protocol {
                Protocol::Sequential => {
                    let permit = self.pop3_permits.acquire().await.map_err(|_| {
                        RetrievalError::Connection("POP3 admission gate closed".to_string())
                    })?;
                    tracing::debug!("POP3 session admitted");
                    Some(permit)
                }
                Protocol::Range | Protocol::Cursor => None,
            };

            let pager = self.pager(config);
            let result = pager.fetch_page(&page).await;
            match &result {
                Ok(page) => tracing::info!(
                    messages = page.len(),
                    has_more = page.next_cursor.is_some(),
                    "Page served"
                ),
                Err(e) => tracing::warn!(error = %e, kind = ?e.kind(), "Page retrieval failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Builds the Gmail OAuth helper from the configured client.
    pub fn authorizer(&self) -> Result<GmailAuthorizer> {
        GmailAuthorizer::new(self.http.clone(), &self.settings.gmail)
    }
}
