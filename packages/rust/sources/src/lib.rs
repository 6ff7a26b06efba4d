//! Source adapters: one per external knowledge system.
//!
//! This crate provides:
//! - [`SourceAdapter`] — the common search contract
//! - [`PublicDocsAdapter`] — WordPress help center (posts, news, FAQ)
//! - [`InternalPagesAdapter`] — workspace page search with block materialization
//! - [`TicketHistoryAdapter`] — support-ticket search
//!
//! Adapters never let a failure escape [`SourceAdapter::search`]: transport
//! errors, timeouts, and non-success statuses become an empty list plus a
//! warning so one broken source cannot sink a merged response.

mod client;
mod internal_pages;
mod public_docs;
mod tickets;

use async_trait::async_trait;
use groundwork_shared::{Passage, Result, SourceKind};
use tracing::warn;

pub use client::{USER_AGENT, build_client};
pub use internal_pages::{InternalPagesAdapter, page_title};
pub use public_docs::{PostPage, PublicDocsAdapter};
pub use tickets::{TicketCredentials, TicketHistoryAdapter, TicketStatus};

/// Common contract for every knowledge source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Search the source, surfacing failures to the caller.
    ///
    /// Missing credentials are not a failure: the adapter logs and returns
    /// an empty list.
    async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<Passage>>;

    /// Search the source; any failure yields an empty list.
    async fn search(&self, query: &str, max_results: usize) -> Vec<Passage> {
        match self.try_search(query, max_results).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(source = %self.kind(), error = %e, "source search failed");
                Vec::new()
            }
        }
    }
}
