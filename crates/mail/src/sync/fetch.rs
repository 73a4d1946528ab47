//! Bounded-parallel metadata fetching

use log::warn;
use rayon::prelude::*;

use crate::models::MessageId;
use crate::provider::{MailProvider, MessageMetadata, ProviderResult};

/// Fetch metadata for `ids` using at most `concurrency` workers
///
/// Results are returned in the same order as `ids`. Individual failures are
/// returned as values; the caller decides what to skip.
pub(crate) fn fetch_metadata(
    provider: &dyn MailProvider,
    ids: &[MessageId],
    concurrency: usize,
) -> Vec<ProviderResult<MessageMetadata>> {
    if concurrency <= 1 || ids.len() <= 1 {
        return fetch_sequential(provider, ids);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.min(ids.len()))
        .thread_name(|i| format!("sync-fetch-{}", i))
        .build();

    match pool {
        Ok(pool) => pool.install(|| ids.par_iter().map(|id| provider.get_metadata(id)).collect()),
        Err(e) => {
            warn!("[SYNC] Could not start fetch pool ({}), fetching sequentially", e);
            fetch_sequential(provider, ids)
        }
    }
}

fn fetch_sequential(
    provider: &dyn MailProvider,
    ids: &[MessageId],
) -> Vec<ProviderResult<MessageMetadata>> {
    ids.iter().map(|id| provider.get_metadata(id)).collect()
}
