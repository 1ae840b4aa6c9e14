//! Raw message decoding
//!
//! Turns the RFC 5322 bytes returned by the mailbox into a [`DecodedMessage`]:
//! summary headers, the full header list, text bodies decoded from their
//! declared charset, and attachments with sanitized names.

use chrono::{DateTime, FixedOffset, Local};
use mailparse::MailHeaderMap;

use crate::error::{Error, Result};
use crate::types::{Attachment, BodyPart, DecodedMessage, MessageId, MimeKind};
use crate::utils::{build_folder_name, sanitize_attachment_name};

mod mime;

pub use mime::{LeafPart, Leaves, MimePart};

/// Sender used when the `From` header is missing or blank
pub const UNKNOWN_SENDER: &str = "unknown_sender";

/// Subject used when the `Subject` header is missing or blank
pub const NO_SUBJECT: &str = "no_subject";

/// Decode a raw message fetched for `id`
///
/// Fails only when the bytes cannot be parsed as a message at all. Missing
/// headers get defaults and an unparseable date falls back to the current
/// local time.
pub fn decode_message(raw: &[u8], id: &MessageId) -> Result<DecodedMessage> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Decode {
        id: id.clone(),
        reason: e.to_string(),
    })?;

    let header_or = |name: &str, default: &str| {
        parsed
            .headers
            .get_first_value(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };
    let sender = header_or("From", UNKNOWN_SENDER);
    let subject = header_or("Subject", NO_SUBJECT);
    let raw_date = header_or("Date", "");

    let date = parse_date(&raw_date).unwrap_or_else(|| {
        tracing::warn!(message_id = %id, date = %raw_date, "unparseable Date header, using current time");
        Local::now().fixed_offset()
    });

    let headers = parsed
        .headers
        .iter()
        .map(|h| (h.get_key(), h.get_value()))
        .collect();

    let tree = MimePart::from_parsed(&parsed);
    let mut body_parts = Vec::new();
    let mut attachments = Vec::new();

    for leaf in tree.leaves() {
        if leaf.is_attachment {
            if let Some(attachment) = attachment_from(leaf) {
                attachments.push(attachment);
            } else {
                tracing::debug!(message_id = %id, mimetype = %leaf.mimetype, "dropping attachment without name or payload");
            }
        } else if let Some(kind) = MimeKind::from_mimetype(&leaf.mimetype) {
            body_parts.push(BodyPart {
                kind,
                text: decode_text(&leaf.body, leaf.charset.as_deref()),
            });
        }
    }

    Ok(DecodedMessage {
        message_id: id.clone(),
        folder_name: build_folder_name(&date, &sender, id.as_str()),
        sender,
        subject,
        raw_date,
        body_parts,
        attachments,
        headers,
    })
}

/// Parse a `Date` header strictly as RFC 2822, then leniently
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date);
    }
    // the lenient parser yields the epoch for text it cannot read
    mailparse::dateparse(value)
        .ok()
        .filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|utc| utc.fixed_offset())
}

/// Decode text with the declared charset, replacing invalid sequences
fn decode_text(body: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _had_errors) = encoding.decode_without_bom_handling(body);
    text.into_owned()
}

fn attachment_from(leaf: &LeafPart) -> Option<Attachment> {
    let filename = leaf.filename.as_deref()?;
    if leaf.body.is_empty() {
        return None;
    }
    Some(Attachment {
        filename: sanitize_attachment_name(filename),
        data: leaf.body.clone(),
    })
}
