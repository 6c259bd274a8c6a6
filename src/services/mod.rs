//! Business services layer.
//!
//! Services sit between the caller and the protocol pagers:
//!
//! ```text
//! Caller (CLI, HTTP boundary)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//!   Pagers (POP3, IMAP, Gmail API)
//! ```
//!
//! - [`RetrievalService`]: validates requests, admits POP3 sessions through a
//!   bounded FIFO gate, and dispatches to the matching pager

mod retrieval_service;

pub use retrieval_service::RetrievalService;
