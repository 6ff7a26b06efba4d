//! Help-center search answered from the crawl snapshot.

use tracing::{debug, instrument, warn};

use groundwork_shared::{GroundworkError, Passage, Result};
use groundwork_sources::SourceAdapter;
use groundwork_storage::SnapshotStore;

use crate::rank::rank;

/// Rank the cached passages, or fall back to `live` when there are none.
///
/// Cached entries are not link-validated. The only error returned is the
/// store being unreadable while the live fallback also fails.
#[instrument(skip_all, fields(max_results = max_results))]
pub async fn search_cached(
    store: &SnapshotStore,
    live: &dyn SourceAdapter,
    query: &str,
    max_results: usize,
) -> Result<Vec<Passage>> {
    match store.read_passages().await {
        Ok(Some(passages)) if !passages.is_empty() => {
            let cached = passages.len();
            let mut ranked = rank(passages, query);
            ranked.truncate(max_results);
            debug!(cached, count = ranked.len(), "answered from cache");
            Ok(ranked)
        }
        Ok(_) => {
            debug!("cache empty, searching live");
            Ok(live.search(query, max_results).await)
        }
        Err(store_err) => {
            warn!(error = %store_err, "cache unreadable, searching live");
            live.try_search(query, max_results).await.map_err(|live_err| {
                GroundworkError::Storage(format!(
                    "cache unreadable ({store_err}) and live search failed ({live_err})"
                ))
            })
        }
    }
}
