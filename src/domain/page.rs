//! Pagination request and result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Credentials, NormalizedMessage, Protocol, ValidationError};

/// A validated page request.
///
/// `page_size` and `page_number` are always at least 1. The cursor is only
/// meaningful for [`Protocol::Cursor`] and is treated as an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Maximum number of messages on the page.
    pub page_size: u32,
    /// One-based page number, counted from the newest message.
    pub page_number: u32,
    /// Provider continuation token from a previous page.
    pub cursor: Option<String>,
}

impl PageRequest {
    /// Creates a page request, rejecting zero values.
    pub fn new(page_size: u32, page_number: u32) -> Result<Self, ValidationError> {
        if page_size == 0 {
            return Err(ValidationError::invalid("pageSize", "must be a positive integer"));
        }
        if page_number == 0 {
            return Err(ValidationError::invalid(
                "pageNumber",
                "must be a positive integer",
            ));
        }
        Ok(Self {
            page_size,
            page_number,
            cursor: None,
        })
    }

    /// Attaches a continuation cursor.
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }

    /// Builds a page request from loosely typed parameters.
    ///
    /// Accepts JSON integers or decimal strings (as taken from a URL path).
    /// Floats, negatives, zero, and anything non-numeric are rejected.
    pub fn from_params(page_size: &Value, page_number: &Value) -> Result<Self, ValidationError> {
        let page_size = positive_integer(page_size, "pageSize")?;
        let page_number = positive_integer(page_number, "pageNumber")?;
        Self::new(page_size, page_number)
    }
}

fn positive_integer(value: &Value, field: &'static str) -> Result<u32, ValidationError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n >= 1 => u32::try_from(n)
            .map_err(|_| ValidationError::invalid(field, "is too large")),
        _ => Err(ValidationError::invalid(field, "must be a positive integer")),
    }
}

/// One page of parsed messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Messages on this page; newest first for POP3/IMAP, provider order for Gmail.
    pub messages: Vec<NormalizedMessage>,
    /// Continuation token for the next page (Gmail only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl PageResult {
    /// Creates a result without a continuation token.
    pub fn messages(messages: Vec<NormalizedMessage>) -> Self {
        Self {
            messages,
            next_cursor: None,
        }
    }

    /// Returns an empty page.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of messages on the page.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the page holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A page fetch request as received from the caller.
///
/// Page parameters stay loosely typed here so that malformed values are
/// reported as input errors rather than deserialization failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Which access method to use.
    pub protocol: Protocol,
    /// Requested page size.
    #[serde(alias = "pagination")]
    pub page_size: Value,
    /// Requested page number; defaults to the first page.
    #[serde(default = "first_page", alias = "page")]
    pub page_number: Value,
    /// Protocol-specific credentials.
    #[serde(default)]
    pub credentials: Credentials,
    /// Continuation token (Gmail only).
    #[serde(default, alias = "pageToken")]
    pub cursor: Option<String>,
}

fn first_page() -> Value {
    Value::from(1)
}

/// Error object returned to the caller in place of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable description of the failure.
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body from anything displayable.
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
