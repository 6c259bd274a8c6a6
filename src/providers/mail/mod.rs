//! Mailbox pager implementations.
//!
//! This module contains the [`MailboxPager`] trait and one implementation per
//! access method:
//!
//! - [`Pop3Client`] - POP3, messages retrieved one at a time by index
//! - [`ImapClient`] - IMAP, one sequence-range fetch per page
//! - [`GmailClient`] - Gmail API, cursor pagination with parallel fetches
//!
//! # Architecture
//!
//! Every client opens its own session (or carries its own tokens) for a
//! single call and returns either a complete page or one [`RetrievalError`].
//! POP3 and IMAP share the newest-first window arithmetic in [`PageWindow`];
//! all three share [`parse_message`].
//!
//! # Example
//!
//! ```ignore
//! use mailpage::domain::{PageRequest, ServerConfig};
//! use mailpage::providers::mail::{ImapClient, MailboxPager};
//!
//! async fn newest_subjects(config: ServerConfig) -> mailpage::providers::mail::Result<Vec<String>> {
//!     let client = ImapClient::new(config);
//!     let page = client.fetch_page(&PageRequest::new(25, 1)?).await?;
//!     Ok(page.messages.into_iter().filter_map(|m| m.subject).collect())
//! }
//! ```

mod gmail;
mod gmail_auth;
mod imap;
mod parser;
mod pop3;
mod traits;
mod transport;
mod window;

pub use gmail::{GmailClient, GMAIL_API_BASE};
pub use gmail_auth::GmailAuthorizer;
pub use imap::ImapClient;
pub use parser::parse_message;
pub use pop3::Pop3Client;
pub use traits::{ErrorKind, MailboxPager, Result, RetrievalError};
pub use transport::{connect, MailStream};
pub use window::PageWindow;
