//! Paginated message and sent-log queries

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{SentEmail, SyncedMessage};
use crate::storage::{MailStore, MessageFilter};

/// Default page size when the caller doesn't ask for one
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Largest page a caller may request
pub const MAX_PAGE_LIMIT: usize = 100;

/// Page selection as received from a caller
///
/// Both fields are optional and normalized before use: `page` is 1-based
/// (0 is treated as 1) and `limit` is clamped to `1..=MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// One page of results plus the totals needed to render a pager
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    #[serde(rename = "messages")]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    fn new(request: PageRequest, total: usize, items: Vec<T>) -> Self {
        let limit = request.limit();
        Self {
            page: request.page(),
            limit,
            total,
            total_pages: total.div_ceil(limit),
            items,
        }
    }
}

pub type MessagePage = Page<SyncedMessage>;
pub type SentPage = Page<SentEmail>;

/// List stored messages matching `filter`, newest first
pub fn list_messages(
    store: &dyn MailStore,
    filter: &MessageFilter,
    request: PageRequest,
) -> Result<MessagePage> {
    let total = store.count_messages(filter)?;
    let messages = store.list_messages(filter, request.limit(), request.offset())?;
    Ok(Page::new(request, total, messages))
}

/// List the sent log, newest first
pub fn list_sent(store: &dyn MailStore, request: PageRequest) -> Result<SentPage> {
    let total = store.count_sent()?;
    let sent = store.list_sent(request.limit(), request.offset())?;
    Ok(Page::new(request, total, sent))
}
