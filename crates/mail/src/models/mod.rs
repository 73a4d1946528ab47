//! Domain models for mail entities

mod cursor;
mod message;
mod sent;

pub use cursor::HistoryCursor;
pub use message::{EmailAddress, MessageId, SyncedMessage, SyncedMessageBuilder, ThreadId};
pub use sent::SentEmail;
