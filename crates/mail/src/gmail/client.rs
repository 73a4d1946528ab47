//! Gmail API HTTP client
//!
//! Provides the three reads the sync engine needs from the Gmail API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use chrono::Utc;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::api::{GmailMessage, HistoryResponse, ListMessagesResponse};
use super::extract_metadata;
use crate::models::{HistoryCursor, MessageId, ThreadId};
use crate::provider::{
    HistoryDelta, MailProvider, MessageMetadata, MessageRef, ProviderError, ProviderResult,
};

/// Gmail's per-request ceiling for `maxResults`
const MAX_PAGE_SIZE: usize = 500;

/// Attempts per metadata fetch before giving up
const FETCH_ATTEMPTS: u32 = 3;

/// Gmail API client for reading a mailbox
///
/// Holds an already-valid OAuth access token; obtaining and refreshing it
/// happens outside this crate.
pub struct GmailClient {
    agent: ureq::Agent,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, Self::BASE_URL)
    }

    /// Create a client against a different API root (e.g. a local mock)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        Url::parse(&format!("{}/users/me/{}", self.base_url, path))
            .map_err(|e| ProviderError::Transport(format!("invalid URL: {}", e)))
    }

    /// GET a JSON resource
    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> ProviderResult<T> {
        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &format!("Bearer {}", self.access_token))
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => ProviderError::Status(code),
                other => ProviderError::Transport(other.to_string()),
            })?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// List one page of message IDs
    ///
    /// # Arguments
    /// * `query` - Gmail search query (e.g. `newer_than:30d`)
    /// * `max_results` - Page size (clamped to 1-500)
    /// * `page_token` - Optional page token for pagination
    pub fn list_messages(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> ProviderResult<ListMessagesResponse> {
        let mut url = self.endpoint("messages")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("maxResults", &max_results.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        self.get_json(&url)
    }

    /// Get message metadata (From, Subject, Date headers) by ID
    pub fn get_message(&self, id: &MessageId) -> ProviderResult<GmailMessage> {
        let mut url = self.endpoint(&format!("messages/{}", id.as_str()))?;
        url.query_pairs_mut()
            .append_pair("format", "metadata")
            .append_pair("metadataHeaders", "From")
            .append_pair("metadataHeaders", "Subject")
            .append_pair("metadataHeaders", "Date");

        match self.get_json(&url) {
            Err(ProviderError::Status(404)) => Err(ProviderError::NotFound(id.clone())),
            other => other,
        }
    }

    /// Get a message with exponential backoff retry
    ///
    /// `NotFound` is final and returned immediately.
    fn get_message_with_retry(&self, id: &MessageId) -> ProviderResult<GmailMessage> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.get_message(id) {
                Ok(msg) => return Ok(msg),
                Err(e) if e.is_not_found() || attempt >= FETCH_ATTEMPTS => return Err(e),
                Err(e) => {
                    debug!(
                        "[GMAIL] Fetch of {} failed (attempt {}): {}",
                        id, attempt, e
                    );
                    let jitter = Duration::from_millis(rand_jitter());
                    std::thread::sleep(delay + jitter);
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }

    /// List one page of history since a given history ID
    ///
    /// # Errors
    /// Returns `HistoryExpired` if the history ID is too old (404 from Gmail)
    pub fn list_history(
        &self,
        start: HistoryCursor,
        max_results: usize,
        page_token: Option<&str>,
    ) -> ProviderResult<HistoryResponse> {
        let mut url = self.endpoint("history")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("startHistoryId", &start.to_string());
            pairs.append_pair("historyTypes", "messageAdded");
            pairs.append_pair("maxResults", &max_results.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        match self.get_json(&url) {
            Err(ProviderError::Status(404)) => Err(ProviderError::HistoryExpired),
            other => other,
        }
    }
}

impl MailProvider for GmailClient {
    fn list_recent(&self, window_days: u32, max_results: usize) -> ProviderResult<Vec<MessageRef>> {
        let query = format!("newer_than:{}d", window_days.max(1));
        collect_recent(max_results, |page_size, page_token| {
            self.list_messages(&query, page_size, page_token)
        })
    }

    fn get_metadata(&self, id: &MessageId) -> ProviderResult<MessageMetadata> {
        let message = self.get_message_with_retry(id)?;
        Ok(extract_metadata(&message, Utc::now()))
    }

    fn list_history_since(
        &self,
        cursor: HistoryCursor,
        max_results: usize,
    ) -> ProviderResult<Vec<HistoryDelta>> {
        collect_history(max_results, |page_size, page_token| {
            self.list_history(cursor, page_size, page_token)
        })
    }
}

/// Follow `nextPageToken` until `max_results` message references are
/// collected
///
/// `fetch_page` receives the number of references still wanted and the
/// page token.
fn collect_recent<F>(max_results: usize, mut fetch_page: F) -> ProviderResult<Vec<MessageRef>>
where
    F: FnMut(usize, Option<&str>) -> ProviderResult<ListMessagesResponse>,
{
    let mut refs = Vec::new();
    let mut page_token: Option<String> = None;

    while refs.len() < max_results {
        let response = fetch_page(max_results - refs.len(), page_token.as_deref())?;

        if let Some(messages) = response.messages {
            refs.extend(
                messages
                    .into_iter()
                    .map(|m| MessageRef::new(m.id, m.thread_id)),
            );
        }

        match response.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    refs.truncate(max_results);
    Ok(refs)
}

/// Flatten history pages into deltas, about `max_results` of them
///
/// Every message added by one record shares the record's id as its
/// cursor, so records are never split: the record that reaches
/// `max_results` is kept whole and nothing after it is returned. The
/// result may therefore hold more than `max_results` deltas.
fn collect_history<F>(max_results: usize, mut fetch_page: F) -> ProviderResult<Vec<HistoryDelta>>
where
    F: FnMut(usize, Option<&str>) -> ProviderResult<HistoryResponse>,
{
    let max_results = max_results.max(1);
    let mut deltas = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let response = fetch_page(max_results - deltas.len(), page_token.as_deref())?;

        for record in response.history.unwrap_or_default() {
            let added = record.messages_added.unwrap_or_default();
            if added.is_empty() {
                continue;
            }
            let Some(position) = HistoryCursor::parse(&record.id) else {
                warn!("[GMAIL] Skipping history record with bad id {:?}", record.id);
                continue;
            };

            deltas.extend(added.into_iter().map(|a| HistoryDelta {
                id: MessageId::new(a.message.id),
                thread_id: ThreadId::new(a.message.thread_id),
                history_cursor: position,
            }));

            if deltas.len() >= max_results {
                debug!("[GMAIL] History page limit reached at record {}", position);
                return Ok(deltas);
            }
        }

        match response.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(deltas),
        }
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{HistoryRecord, MessageAdded, MessageRef as ApiMessageRef};

    fn history_page(records: Vec<(&str, Vec<&str>)>, next: Option<&str>) -> HistoryResponse {
        HistoryResponse {
            history: Some(
                records
                    .into_iter()
                    .map(|(id, added)| HistoryRecord {
                        id: id.to_string(),
                        messages_added: Some(
                            added
                                .into_iter()
                                .map(|m| MessageAdded {
                                    message: ApiMessageRef {
                                        id: m.to_string(),
                                        thread_id: format!("t-{}", m),
                                    },
                                })
                                .collect(),
                        ),
                    })
                    .collect(),
            ),
            next_page_token: next.map(str::to_string),
            history_id: None,
        }
    }

    fn delta_pairs(deltas: &[HistoryDelta]) -> Vec<(&str, u64)> {
        deltas
            .iter()
            .map(|d| (d.id.as_str(), d.history_cursor.value()))
            .collect()
    }

    #[test]
    fn test_collect_history_keeps_record_whole() {
        let mut requested = Vec::new();
        let deltas = collect_history(2, |page_size, _| {
            requested.push(page_size);
            Ok(history_page(vec![("107", vec!["a", "b", "c"])], None))
        })
        .unwrap();

        assert_eq!(
            delta_pairs(&deltas),
            vec![("a", 107), ("b", 107), ("c", 107)]
        );
        assert_eq!(requested, vec![2]);
    }

    #[test]
    fn test_collect_history_stops_after_boundary_record() {
        let deltas = collect_history(2, |_, _| {
            Ok(history_page(
                vec![("101", vec!["a"]), ("102", vec!["b", "c"]), ("103", vec!["d"])],
                Some("next"),
            ))
        })
        .unwrap();

        // 103 is left for the next pass, which starts after cursor 102
        assert_eq!(
            delta_pairs(&deltas),
            vec![("a", 101), ("b", 102), ("c", 102)]
        );
    }

    #[test]
    fn test_collect_history_follows_page_tokens() {
        let mut calls: Vec<(usize, Option<String>)> = Vec::new();
        let deltas = collect_history(10, |page_size, token| {
            calls.push((page_size, token.map(str::to_string)));
            Ok(match token {
                None => history_page(vec![("101", vec!["a", "b"]), ("102", vec![])], Some("p2")),
                Some("p2") => history_page(vec![("103", vec!["c"])], Some("p3")),
                _ => history_page(vec![("104", vec!["d"])], None),
            })
        })
        .unwrap();

        assert_eq!(
            delta_pairs(&deltas),
            vec![
                ("a", 101),
                ("b", 101),
                ("c", 103),
                ("d", 104)
            ]
        );
        // Later pages only ask for what is still wanted
        assert_eq!(
            calls,
            vec![(10, None), (8, Some("p2".to_string())), (7, Some("p3".to_string()))]
        );
    }

    #[test]
    fn test_collect_history_skips_bad_record_ids() {
        let deltas = collect_history(10, |_, _| {
            Ok(history_page(vec![("oops", vec!["a"]), ("105", vec!["b"])], None))
        })
        .unwrap();

        assert_eq!(delta_pairs(&deltas), vec![("b", 105)]);
    }

    #[test]
    fn test_collect_history_propagates_expiry() {
        let err = collect_history(10, |_, _| Err(ProviderError::HistoryExpired)).unwrap_err();
        assert!(matches!(err, ProviderError::HistoryExpired));
    }

    #[test]
    fn test_collect_recent_pages_until_max() {
        let mut calls: Vec<(usize, Option<String>)> = Vec::new();
        let refs = collect_recent(3, |page_size, token| {
            calls.push((page_size, token.map(str::to_string)));
            let (ids, next) = match token {
                None => (vec!["m1", "m2"], Some("p2".to_string())),
                _ => (vec!["m3", "m4"], Some("p3".to_string())),
            };
            Ok(ListMessagesResponse {
                messages: Some(
                    ids.into_iter()
                        .map(|id| ApiMessageRef {
                            id: id.to_string(),
                            thread_id: format!("t-{}", id),
                        })
                        .collect(),
                ),
                next_page_token: next,
                result_size_estimate: None,
            })
        })
        .unwrap();

        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
        assert_eq!(calls, vec![(3, None), (1, Some("p2".to_string()))]);
    }

    #[test]
    fn test_collect_recent_empty_mailbox() {
        let refs = collect_recent(5, |_, _| {
            Ok(ListMessagesResponse {
                messages: None,
                next_page_token: None,
                result_size_estimate: Some(0),
            })
        })
        .unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn test_endpoint_building() {
        let client = GmailClient::with_base_url("token", "http://localhost:9999/gmail/v1/");
        let url = client.endpoint("messages").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9999/gmail/v1/users/me/messages");
    }

    #[test]
    fn test_history_response_parsing() {
        let json = r#"{
            "history": [
                {"id": "105", "messagesAdded": [{"message": {"id": "a", "threadId": "ta", "labelIds": ["INBOX"]}}]},
                {"id": "106"},
                {"id": "107", "messagesAdded": [
                    {"message": {"id": "b", "threadId": "tb"}},
                    {"message": {"id": "c", "threadId": "tc"}}
                ]}
            ],
            "historyId": "107"
        }"#;

        let response: HistoryResponse = serde_json::from_str(json).unwrap();
        let history = response.history.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[1].messages_added.is_none());
        assert_eq!(history[2].messages_added.as_ref().unwrap().len(), 2);
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_list_response_parsing() {
        let json = r#"{"messages": [{"id": "m1", "threadId": "t1"}], "nextPageToken": "p2", "resultSizeEstimate": 40}"#;
        let response: ListMessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.messages.unwrap()[0].id, "m1");
        assert_eq!(response.next_page_token.as_deref(), Some("p2"));
    }

    #[test]
    fn test_rand_jitter_range() {
        for _ in 0..20 {
            assert!(rand_jitter() < 100);
        }
    }
}
