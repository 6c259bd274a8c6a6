//! Retrieval settings and configuration types.
//!
//! Settings are read from `settings.json` in the platform config directory
//! (`~/.config/mailpage/settings.json` or the OS equivalent). Every section
//! has defaults, so a missing file or a partial file is fine. The Google
//! OAuth client values may also come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.json";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// POP3 connection defaults.
    pub pop3: ServerDefaults,
    /// IMAP connection defaults.
    pub imap: ImapSettings,
    /// Gmail API and OAuth client configuration.
    pub gmail: GmailSettings,
    /// Concurrency and timeout limits.
    pub retrieval: RetrievalSettings,
}

impl Settings {
    /// Returns the default settings file location, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "panbanda", "mailpage")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Loads settings from the default location and the environment.
    ///
    /// A missing settings file yields the defaults.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::default_path() {
            Some(path) if path.exists() => Self::read_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from an explicit file and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = Self::read_file(path)?;
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Overlays the Google OAuth client values from the environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("GOOGLE_CLIENT_ID") {
            self.gmail.client_id = id;
        }
        if let Some(secret) = var("GOOGLE_CLIENT_SECRET") {
            self.gmail.client_secret = secret;
        }
        if let Some(uri) = var("GOOGLE_REDIRECT_URI") {
            self.gmail.redirect_uri = uri;
        }
    }

    /// Rejects settings that would make retrieval impossible.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.pop3_concurrency == 0 {
            bail!("retrieval.pop3_concurrency must be at least 1");
        }
        if self.retrieval.gmail_fetch_concurrency == 0 {
            bail!("retrieval.gmail_fetch_concurrency must be at least 1");
        }
        if self.pop3.port == 0 || self.imap.port == 0 {
            bail!("default ports must be non-zero");
        }
        if self.imap.mailbox.is_empty() {
            bail!("imap.mailbox must not be empty");
        }
        Ok(())
    }
}

/// Connection defaults for a server protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDefaults {
    /// Port used when the request does not name one.
    pub port: u16,
    /// Whether TLS is used when the request does not say.
    pub use_tls: bool,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self {
            port: 995,
            use_tls: true,
        }
    }
}

/// IMAP connection defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapSettings {
    /// Port used when the request does not name one.
    pub port: u16,
    /// Whether TLS is used when the request does not say.
    pub use_tls: bool,
    /// Mailbox opened for listing.
    pub mailbox: String,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            port: 993,
            use_tls: true,
            mailbox: "INBOX".to_string(),
        }
    }
}

/// Gmail API endpoints and OAuth client registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailSettings {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Userinfo endpoint used to resolve the account address.
    pub userinfo_url: String,
    /// Gmail API base, up to and excluding `/users/me`.
    pub api_base: String,
    /// Scopes requested during authorization.
    pub scopes: Vec<String>,
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".to_string(),
                "https://www.googleapis.com/auth/gmail.send".to_string(),
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
            ],
        }
    }
}

/// Concurrency and deadline limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Maximum simultaneous POP3 sessions; extra requests wait in FIFO order.
    pub pop3_concurrency: usize,
    /// Maximum simultaneous message fetches within one Gmail page.
    pub gmail_fetch_concurrency: usize,
    /// Deadline for the work phase of a POP3/IMAP session, in seconds.
    pub session_timeout_secs: Option<u64>,
}

impl RetrievalSettings {
    /// Returns the session deadline, if one is configured.
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            pop3_concurrency: 5,
            gmail_fetch_concurrency: 10,
            session_timeout_secs: Some(120),
        }
    }
}
