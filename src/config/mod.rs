//! Configuration and settings management.
//!
//! Settings are stored in the user's config directory as JSON, with
//! environment overrides for the Google OAuth client.

mod settings;

pub use settings::{GmailSettings, ImapSettings, RetrievalSettings, ServerDefaults, Settings};
