//! Connection parameters for the supported mail access methods.
//!
//! Credentials arrive from the caller in one flat [`Credentials`] record and
//! are resolved into exactly one [`ConnectionConfig`] variant, chosen by the
//! request's [`Protocol`]. Resolution validates every field before any
//! network operation starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Mail access method requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Stateful sequential access (POP3).
    #[serde(alias = "pop3")]
    Sequential,
    /// Stateful range/sequence access (IMAP).
    #[serde(alias = "imap")]
    Range,
    /// Stateless cursor-paginated REST access (Gmail API).
    #[serde(alias = "gmail")]
    Cursor,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Sequential => "sequential",
            Protocol::Range => "range",
            Protocol::Cursor => "cursor",
        };
        f.write_str(name)
    }
}

/// Credentials as supplied by the caller, before protocol-specific validation.
///
/// Which fields are required depends on the protocol: server fields for
/// [`Protocol::Sequential`] and [`Protocol::Range`], OAuth tokens for
/// [`Protocol::Cursor`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    /// Account identifier used to log in.
    #[serde(alias = "user", alias = "accountIdentifier")]
    pub username: String,
    /// Password or app-specific password.
    #[serde(alias = "password")]
    pub secret: String,
    /// Server hostname.
    pub host: String,
    /// Server port; the protocol default applies when absent.
    pub port: Option<u16>,
    /// Whether to wrap the session in TLS; the protocol default applies when absent.
    #[serde(alias = "tls")]
    pub use_encrypted_transport: Option<bool>,
    /// OAuth access token.
    pub access_token: String,
    /// OAuth refresh token.
    pub refresh_token: String,
}

impl Credentials {
    /// Resolves server credentials, filling port and transport from defaults.
    pub fn into_server_config(
        self,
        default_port: u16,
        default_tls: bool,
    ) -> Result<ServerConfig, ValidationError> {
        let config = ServerConfig {
            host: self.host.trim().to_string(),
            port: self.port.unwrap_or(default_port),
            username: self.username,
            secret: self.secret,
            use_tls: self.use_encrypted_transport.unwrap_or(default_tls),
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolves OAuth credentials.
    pub fn into_oauth(self) -> Result<OAuthCredentials, ValidationError> {
        let credentials = OAuthCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        };
        credentials.validate()?;
        Ok(credentials)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_encrypted_transport", &self.use_encrypted_transport)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Server connection parameters for POP3 and IMAP sessions.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login secret.
    pub secret: String,
    /// Whether to use implicit TLS.
    pub use_tls: bool,
}

impl ServerConfig {
    /// Checks that every field needed to open a session is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::missing("host"));
        }
        if self.port == 0 {
            return Err(ValidationError::invalid("port", "must be non-zero"));
        }
        if self.username.is_empty() {
            return Err(ValidationError::missing("username"));
        }
        if self.secret.is_empty() {
            return Err(ValidationError::missing("secret"));
        }
        // Both values are sent inside protocol command lines.
        if has_line_break(&self.username) {
            return Err(ValidationError::invalid(
                "username",
                "must not contain CR, LF, or NUL",
            ));
        }
        if has_line_break(&self.secret) {
            return Err(ValidationError::invalid(
                "secret",
                "must not contain CR, LF, or NUL",
            ));
        }
        Ok(())
    }

    /// Returns `host:port` for socket connection.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n', '\0'])
}

// Keeps the secret out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// OAuth tokens attached to a single Gmail API call.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCredentials {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Long-lived token used by the caller to obtain new access tokens.
    pub refresh_token: String,
}

impl OAuthCredentials {
    /// Checks that both tokens are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.access_token.is_empty() {
            return Err(ValidationError::missing("accessToken"));
        }
        if self.refresh_token.is_empty() {
            return Err(ValidationError::missing("refreshToken"));
        }
        Ok(())
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Validated connection parameters; exactly one variant per request.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// POP3 server session.
    Sequential(ServerConfig),
    /// IMAP server session.
    Range(ServerConfig),
    /// Gmail API tokens.
    Cursor(OAuthCredentials),
}

impl ConnectionConfig {
    /// Returns the protocol this configuration targets.
    pub fn protocol(&self) -> Protocol {
        match self {
            ConnectionConfig::Sequential(_) => Protocol::Sequential,
            ConnectionConfig::Range(_) => Protocol::Range,
            ConnectionConfig::Cursor(_) => Protocol::Cursor,
        }
    }
}

/// Tokens returned by the OAuth exchange, for the caller to store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthTokens {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<String>,
    /// When the access token stops being valid.
    pub expiry: Option<DateTime<Utc>>,
    /// Address of the authenticated account, resolved at code exchange.
    pub account_email: Option<String>,
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .field("account_email", &self.account_email)
            .finish()
    }
}
