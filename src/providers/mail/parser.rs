//! Raw message parsing.
//!
//! Turns RFC 5322 / MIME bytes into a [`NormalizedMessage`]. The header map
//! comes from `mailparse` (which keeps every occurrence in order); the
//! structured fields, bodies, and attachments come from `mail_parser`.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use mail_parser::{Addr, MessageParser, MimeHeaders, PartType};

use super::{Result, RetrievalError};
use crate::domain::{Address, Attachment, NormalizedMessage};

/// Parses a raw message.
///
/// # Errors
///
/// Returns [`RetrievalError::Parse`] if the input is empty, carries no
/// header block, or has a MIME structure that cannot be decoded.
pub fn parse_message(raw: &[u8]) -> Result<NormalizedMessage> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(RetrievalError::Parse("empty message".to_string()));
    }

    let (raw_headers, _) = mailparse::parse_headers(raw)
        .map_err(|e| RetrievalError::Parse(format!("malformed header block: {}", e)))?;
    if raw_headers.is_empty() {
        return Err(RetrievalError::Parse("message has no headers".to_string()));
    }

    let mut headers = std::collections::BTreeMap::<String, Vec<String>>::new();
    for header in &raw_headers {
        headers
            .entry(header.get_key().to_ascii_lowercase())
            .or_default()
            .push(header.get_value());
    }

    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| RetrievalError::Parse("unrecognized MIME structure".to_string()))?;

    let date = message
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0));

    // mail_parser renders plain text as HTML when no HTML part exists; only
    // report HTML the sender actually wrote.
    let body_html = message
        .html_part(0)
        .filter(|part| matches!(part.body, PartType::Html(_)))
        .and_then(|_| message.body_html(0))
        .map(Cow::into_owned);

    let attachments = message
        .attachments()
        .map(|part| {
            let content = part.contents().to_vec();
            Attachment {
                filename: part.attachment_name().map(str::to_string),
                mime_type: part
                    .content_type()
                    .map(|ct| match ct.subtype() {
                        Some(sub) => format!("{}/{}", ct.ctype(), sub),
                        None => ct.ctype().to_string(),
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string())
                    .to_ascii_lowercase(),
                size: content.len() as u64,
                content,
            }
        })
        .collect();

    Ok(NormalizedMessage {
        headers,
        subject: message.subject().map(str::to_string),
        from: addresses(message.from()),
        to: addresses(message.to()),
        cc: addresses(message.cc()),
        date,
        message_id: message.message_id().map(str::to_string),
        body_text: message.body_text(0).map(Cow::into_owned),
        body_html,
        attachments,
    })
}

/// Flattens an address header, including group members.
fn addresses(header: Option<&mail_parser::Address<'_>>) -> Vec<Address> {
    match header {
        Some(mail_parser::Address::List(list)) => list.iter().filter_map(convert_addr).collect(),
        Some(mail_parser::Address::Group(groups)) => groups
            .iter()
            .flat_map(|group| group.addresses.iter())
            .filter_map(convert_addr)
            .collect(),
        None => Vec::new(),
    }
}

fn convert_addr(addr: &Addr<'_>) -> Option<Address> {
    addr.address().map(|email| Address {
        email: email.to_string(),
        name: addr.name().map(str::to_string),
    })
}
