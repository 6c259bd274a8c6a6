//! Gmail API mailbox pager.
//!
//! Gmail pages are cursor-based: `users.messages.list` returns up to
//! `maxResults` message IDs plus an opaque `nextPageToken`. Each listed
//! message is then fetched with `format=raw`, decoded from URL-safe base64,
//! and parsed. Fetches run concurrently up to a fan-out limit; the page keeps
//! the listing order.
//!
//! A client carries the tokens of exactly one request. Token refresh is the
//! caller's job (see [`GmailAuthorizer`](super::GmailAuthorizer)); a rejected
//! access token surfaces as [`RetrievalError::AuthExpired`].

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::parser::parse_message;
use super::{MailboxPager, Result, RetrievalError};
use crate::domain::{NormalizedMessage, OAuthCredentials, PageRequest, PageResult, Protocol};

/// Gmail API base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Default number of message fetches in flight per page.
const DEFAULT_FETCH_CONCURRENCY: usize = 10;

/// URL-safe alphabet, padding optional.
const RAW_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// Gmail API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    raw: Option<String>,
}

/// Page reader for one Gmail account.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    api_base: String,
    credentials: OAuthCredentials,
    fetch_concurrency: usize,
}

impl GmailClient {
    /// Creates a client for one request's tokens on a shared HTTP client.
    pub fn new(http: reqwest::Client, credentials: OAuthCredentials) -> Self {
        Self {
            http,
            api_base: GMAIL_API_BASE.to_string(),
            credentials,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Points the client at a different API base (up to `/users/me`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Limits how many message fetches run at once.
    pub fn with_fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = limit.max(1);
        self
    }

    /// Makes an authenticated GET request to the Gmail API.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.api_base, endpoint);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.credentials.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| RetrievalError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| RetrievalError::Protocol(format!("parse response: {}", e)))
    }

    /// Maps an API error response onto the retrieval taxonomy.
    async fn handle_error(response: reqwest::Response) -> RetrievalError {
        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => RetrievalError::AuthExpired(format!("access token rejected: {}", body)),
            429 => RetrievalError::RateLimited { retry_after_secs },
            _ => RetrievalError::Protocol(format!("API error ({}): {}", status, body)),
        }
    }

    async fn list(&self, page: &PageRequest) -> Result<ListResponse> {
        let max_results = page.page_size.to_string();
        let mut query = vec![("maxResults", max_results.as_str())];
        if let Some(cursor) = page.cursor.as_deref() {
            query.push(("pageToken", cursor));
        }
        self.get("/users/me/messages", &query).await
    }

    async fn fetch_message(&self, id: &str) -> Result<NormalizedMessage> {
        let message: RawMessage = self
            .get(&format!("/users/me/messages/{}", id), &[("format", "raw")])
            .await?;
        let raw = message
            .raw
            .ok_or_else(|| RetrievalError::Protocol(format!("message {} has no raw content", id)))?;

        let bytes = decode_raw(&raw)
            .map_err(|e| RetrievalError::Parse(format!("message {}: {}", id, e)))?;
        parse_message(&bytes).map_err(|e| match e {
            RetrievalError::Parse(reason) => {
                RetrievalError::Parse(format!("message {}: {}", id, reason))
            }
            other => other,
        })
    }
}

/// Decodes Gmail's `raw` field.
fn decode_raw(raw: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    RAW_ENGINE.decode(raw.trim())
}

#[async_trait]
impl MailboxPager for GmailClient {
    fn protocol(&self) -> Protocol {
        Protocol::Cursor
    }

    async fn fetch_page(&self, page: &PageRequest) -> Result<PageResult> {
        let listing = self.list(page).await?;
        if listing.messages.is_empty() {
            tracing::debug!("Gmail listing returned no messages");
            return Ok(PageResult::empty());
        }

        tracing::debug!(
            listed = listing.messages.len(),
            has_more = listing.next_page_token.is_some(),
            "Gmail page listed"
        );

        let next_cursor = listing.next_page_token.filter(|token| !token.is_empty());
        let messages: Vec<NormalizedMessage> =
            stream::iter(listing.messages.into_iter().map(|m| m.id))
                .map(|id| async move { self.fetch_message(&id).await })
                .buffered(self.fetch_concurrency)
                .try_collect()
                .await?;

        tracing::info!(count = messages.len(), "Gmail page retrieved");
        Ok(PageResult {
            messages,
            next_cursor,
        })
    }
}
