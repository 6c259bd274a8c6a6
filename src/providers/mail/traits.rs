//! Mailbox pager trait and retrieval errors.
//!
//! This module defines the [`MailboxPager`] trait, the single page-fetching
//! capability implemented by each protocol client (POP3, IMAP, Gmail API),
//! and the [`RetrievalError`] taxonomy they share.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{PageRequest, PageResult, Protocol, ValidationError};

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can end a page retrieval.
///
/// Every call yields either a full page or exactly one of these; nothing is
/// retried internally.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Malformed page parameters or missing credentials.
    #[error("invalid request: {0}")]
    Input(String),

    /// Session could not be established (unreachable host, TLS, login rejected).
    #[error("connection error: {0}")]
    Connection(String),

    /// Mid-session failure or unexpected server response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A message could not be decoded into a normalized message.
    #[error("parse error: {0}")]
    Parse(String),

    /// OAuth access token was rejected; the caller must refresh and retry.
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// The REST provider throttled the request.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// The session did not finish within the configured deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ValidationError> for RetrievalError {
    fn from(err: ValidationError) -> Self {
        RetrievalError::Input(err.to_string())
    }
}

/// Coarse classification used by the external boundary to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable.
    Input,
    /// The remote mail service failed or was unreachable.
    Upstream,
    /// A message could not be parsed.
    Parse,
    /// Credentials need refreshing.
    Auth,
}

impl RetrievalError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::Input(_) => ErrorKind::Input,
            RetrievalError::Parse(_) => ErrorKind::Parse,
            RetrievalError::AuthExpired(_) => ErrorKind::Auth,
            RetrievalError::Connection(_)
            | RetrievalError::Protocol(_)
            | RetrievalError::RateLimited { .. }
            | RetrievalError::Timeout(_) => ErrorKind::Upstream,
        }
    }

    /// Suggested HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RetrievalError::Input(_) => 400,
            RetrievalError::AuthExpired(_) => 401,
            RetrievalError::Parse(_) => 422,
            RetrievalError::RateLimited { .. } => 429,
            RetrievalError::Connection(_) | RetrievalError::Protocol(_) => 502,
            RetrievalError::Timeout(_) => 504,
        }
    }
}

/// A protocol client that can fetch one page of a mailbox.
///
/// Implementations own their session for the duration of a single call: it is
/// opened at the start of [`fetch_page`](Self::fetch_page) and closed before
/// the call returns, on success and on every error path.
///
/// # Example
///
/// ```ignore
/// use mailpage::domain::PageRequest;
/// use mailpage::providers::mail::MailboxPager;
///
/// async fn newest(pager: &dyn MailboxPager) -> mailpage::providers::mail::Result<()> {
///     let page = pager.fetch_page(&PageRequest::new(20, 1)?).await?;
///     for message in page.messages {
///         println!("{}", message.subject.unwrap_or_default());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MailboxPager: Send + Sync {
    /// Returns the protocol this client speaks.
    fn protocol(&self) -> Protocol;

    /// Fetches one page of fully parsed messages.
    ///
    /// # Errors
    ///
    /// Returns a single [`RetrievalError`] if any step fails; partial pages
    /// are never returned.
    async fn fetch_page(&self, page: &PageRequest) -> Result<PageResult>;
}
