//! History cursor tracking for incremental sync

use serde::{Deserialize, Serialize};

/// A provider history position
///
/// The stored maximum marks the highest position known to have been fully
/// processed. No stored cursor means the mailbox was never synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryCursor(pub u64);

impl HistoryCursor {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Parse a provider history token (decimal string)
    pub fn parse(token: &str) -> Option<Self> {
        token.trim().parse().ok().map(Self)
    }
}

impl std::fmt::Display for HistoryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for HistoryCursor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
