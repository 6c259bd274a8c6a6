//! Normalized message types.
//!
//! Every retrieval path (POP3, IMAP, Gmail) hands raw message bytes to the
//! parser and returns these types; raw or partially parsed messages never
//! reach the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully parsed email message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    /// Header values keyed by lowercase header name, in message order.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Decoded subject line.
    pub subject: Option<String>,
    /// Sender addresses.
    pub from: Vec<Address>,
    /// Primary recipient addresses.
    pub to: Vec<Address>,
    /// Carbon copy recipient addresses.
    pub cc: Vec<Address>,
    /// Date header, normalized to UTC.
    pub date: Option<DateTime<Utc>>,
    /// RFC 5322 Message-ID, without angle brackets.
    pub message_id: Option<String>,
    /// First plain text body part.
    pub body_text: Option<String>,
    /// First HTML body part.
    pub body_html: Option<String>,
    /// Attachments in the order they appear in the MIME tree.
    pub attachments: Vec<Attachment>,
}

impl NormalizedMessage {
    /// Returns all values of a header, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the first value of a header, if present.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.header(name).first().map(String::as_str)
    }
}

/// An email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Email address.
    pub email: String,
    /// Display name (e.g., "John Doe").
    pub name: Option<String>,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Creates a new address with email and display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Returns the display representation of this address.
    ///
    /// If a name is present, returns "Name <email>", otherwise just the email.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A file attachment carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Filename from Content-Disposition or Content-Type, if any.
    pub filename: Option<String>,
    /// MIME content type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Size of the decoded content in bytes.
    pub size: u64,
    /// Decoded attachment content.
    #[serde(with = "base64_serde")]
    pub content: Vec<u8>,
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(&s)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
