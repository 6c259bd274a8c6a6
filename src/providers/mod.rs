//! Mail access implementations.
//!
//! - [`mail`] - POP3, IMAP and Gmail API pagers plus the shared message parser

pub mod mail;
