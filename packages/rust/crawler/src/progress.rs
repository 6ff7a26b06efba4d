//! Crawl progress callbacks.

use groundwork_shared::DocCategory;

/// Observer notified as the crawl walks categories and pages.
///
/// Every method defaults to a no-op.
pub trait CrawlProgress: Send + Sync {
    fn category_started(&self, _category: DocCategory) {}

    /// `collected` is the running passage count for the category.
    fn page_fetched(&self, _category: DocCategory, _page: u32, _collected: usize) {}

    fn category_finished(&self, _category: DocCategory, _count: usize) {}
}

/// Reports nothing; for headless runs such as the trigger endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {}
