//! mailpage - Paginated mailbox retrieval
//!
//! This crate fetches one page of fully parsed messages at a time from a
//! POP3 server, an IMAP server, or the Gmail API, behind a single
//! pagination contract.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
