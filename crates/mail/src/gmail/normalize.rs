//! Gmail API response normalization
//!
//! Converts Gmail message resources to [`MessageMetadata`], applying a fixed
//! fallback for every missing field.

use chrono::{DateTime, TimeZone, Utc};

use super::api::{GmailMessage, MessagePayload};
use crate::models::{EmailAddress, HistoryCursor};
use crate::provider::MessageMetadata;

/// Extract metadata from a Gmail message resource
///
/// Fallbacks:
/// - `From` missing: empty address
/// - `Subject` missing: empty string
/// - `Date` missing or unparseable: `internalDate`, then `fetched_at`
/// - snippet missing: empty string
/// - `historyId` missing or not numeric: `None`
pub fn extract_metadata(gmail_msg: &GmailMessage, fetched_at: DateTime<Utc>) -> MessageMetadata {
    let payload = gmail_msg.payload.as_ref();

    let from = extract_from(payload).unwrap_or_default();
    let subject = extract_subject(payload).unwrap_or_default();
    let date = extract_date(payload)
        .or_else(|| parse_internal_date(gmail_msg.internal_date.as_deref()))
        .unwrap_or(fetched_at);
    let snippet = gmail_msg
        .snippet
        .as_deref()
        .map(decode_html_entities)
        .unwrap_or_default();
    let history_cursor = gmail_msg
        .history_id
        .as_deref()
        .and_then(HistoryCursor::parse);

    MessageMetadata {
        from,
        subject,
        date,
        snippet,
        history_cursor,
    }
}

fn extract_from(payload: Option<&MessagePayload>) -> Option<EmailAddress> {
    extract_header(payload?, "From").map(|s| EmailAddress::parse(&s))
}

fn extract_subject(payload: Option<&MessagePayload>) -> Option<String> {
    extract_header(payload?, "Subject")
}

fn extract_date(payload: Option<&MessagePayload>) -> Option<DateTime<Utc>> {
    let raw = extract_header(payload?, "Date")?;
    parse_date_header(&raw)
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Parse an RFC 2822 `Date` header
///
/// Real-world headers often carry a trailing zone comment such as
/// "(UTC)", which chrono rejects, so it is stripped first.
fn parse_date_header(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = match raw.find('(') {
        Some(idx) => raw[..idx].trim(),
        None => raw.trim(),
    };
    DateTime::parse_from_rfc2822(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse Gmail's `internalDate` (milliseconds since epoch)
fn parse_internal_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let millis: i64 = raw?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::Header;

    fn make_message(headers: Vec<(&str, &str)>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            history_id: Some("1234".to_string()),
            snippet: Some("Hello &amp; welcome".to_string()),
            internal_date: Some("1700000000000".to_string()),
            payload: Some(MessagePayload {
                headers: Some(
                    headers
                        .into_iter()
                        .map(|(n, v)| Header {
                            name: n.to_string(),
                            value: v.to_string(),
                        })
                        .collect(),
                ),
                mime_type: Some("text/plain".to_string()),
            }),
        }
    }

    #[test]
    fn test_extract_all_fields() {
        let msg = make_message(vec![
            ("From", "Alice <alice@example.com>"),
            ("Subject", "Quarterly report"),
            ("Date", "Tue, 14 Nov 2023 10:00:00 +0000"),
        ]);

        let meta = extract_metadata(&msg, Utc::now());
        assert_eq!(meta.from.email, "alice@example.com");
        assert_eq!(meta.from.name.as_deref(), Some("Alice"));
        assert_eq!(meta.subject, "Quarterly report");
        assert_eq!(meta.date.to_rfc3339(), "2023-11-14T10:00:00+00:00");
        assert_eq!(meta.snippet, "Hello & welcome");
        assert_eq!(meta.history_cursor, Some(HistoryCursor(1234)));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let msg = make_message(vec![("FROM", "bob@example.com"), ("subject", "hi")]);
        let meta = extract_metadata(&msg, Utc::now());
        assert_eq!(meta.from.email, "bob@example.com");
        assert_eq!(meta.subject, "hi");
    }

    #[test]
    fn test_missing_headers_fall_back() {
        let msg = make_message(vec![]);
        let meta = extract_metadata(&msg, Utc::now());
        assert_eq!(meta.from, EmailAddress::default());
        assert_eq!(meta.subject, "");
        // Falls back to internalDate
        assert_eq!(meta.date.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_date_falls_back_to_fetch_time() {
        let mut msg = make_message(vec![("Date", "not a date")]);
        msg.internal_date = None;
        let fetched_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let meta = extract_metadata(&msg, fetched_at);
        assert_eq!(meta.date, fetched_at);
    }

    #[test]
    fn test_date_header_with_zone_comment() {
        let msg = make_message(vec![("Date", "Tue, 14 Nov 2023 10:00:00 +0000 (UTC)")]);
        let meta = extract_metadata(&msg, Utc::now());
        assert_eq!(meta.date.to_rfc3339(), "2023-11-14T10:00:00+00:00");
    }

    #[test]
    fn test_missing_payload_and_history() {
        let msg = GmailMessage {
            id: "m2".to_string(),
            thread_id: "t2".to_string(),
            history_id: Some("not-a-number".to_string()),
            snippet: None,
            internal_date: None,
            payload: None,
        };
        let fetched_at = Utc::now();

        let meta = extract_metadata(&msg, fetched_at);
        assert_eq!(meta.from.email, "");
        assert_eq!(meta.snippet, "");
        assert_eq!(meta.date, fetched_at);
        assert_eq!(meta.history_cursor, None);
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("Hello &amp; welcome &lt;user&gt;"),
            "Hello & welcome <user>"
        );
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }
}
