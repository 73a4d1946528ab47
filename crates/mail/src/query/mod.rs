//! Query API for the HTTP layer
//!
//! Provides paginated views over stored messages and the sent log.

mod messages;

pub use messages::{
    DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MessagePage, Page, PageRequest, SentPage, list_messages,
    list_sent,
};
