//! Sequential, paginated crawl of the public help center.
//!
//! Categories are walked one after another, each page by page. A category
//! ends on an out-of-range page (HTTP 400), an empty page, or once the
//! total-pages header says the last page was read. Any other failure aborts
//! the whole crawl so a partial result never replaces a good snapshot.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use groundwork_shared::{
    AppConfig, CacheMetadata, CacheSnapshot, DocCategory, GroundworkError, Passage, Result,
};
use groundwork_sources::PublicDocsAdapter;
use groundwork_storage::SnapshotStore;

use crate::progress::CrawlProgress;

/// Status the collection API answers with past the last page.
const PAGE_OUT_OF_RANGE: u16 = 400;

/// Hard stop for a collection that never signals its end.
const MAX_PAGES_PER_CATEGORY: u32 = 500;

// ---------------------------------------------------------------------------
// CrawlReport
// ---------------------------------------------------------------------------

/// Summary of a crawl that was written to the store.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub passage_count: usize,
    pub counts_by_category: BTreeMap<DocCategory, usize>,
    pub fingerprint: String,
    /// Whether the stored passages differ from the previous snapshot.
    pub changed: bool,
    pub last_updated: DateTime<Utc>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Walks every configured help-center category into a [`CacheSnapshot`].
#[derive(Debug, Clone)]
pub struct Crawler {
    adapter: PublicDocsAdapter,
    per_page: u32,
}

impl Crawler {
    pub fn new(adapter: PublicDocsAdapter, per_page: u32) -> Self {
        Self {
            adapter,
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let adapter = PublicDocsAdapter::new(config.public_docs.clone())?;
        Ok(Self::new(adapter, config.crawl.per_page))
    }

    /// Crawl every category without touching any store.
    #[instrument(skip_all, fields(per_page = self.per_page))]
    pub async fn crawl(&self, progress: &dyn CrawlProgress) -> Result<CacheSnapshot> {
        let mut passages: Vec<Passage> = Vec::new();
        let mut counts_by_category = BTreeMap::new();

        for &category in &self.adapter.config().categories {
            progress.category_started(category);
            let collected = self.crawl_category(category, progress).await?;
            info!(category = %category, count = collected.len(), "category crawled");
            progress.category_finished(category, collected.len());
            counts_by_category.insert(category, collected.len());
            passages.extend(collected);
        }

        let fingerprint = fingerprint(&passages)?;
        let metadata = CacheMetadata {
            last_updated: Utc::now(),
            passage_count: passages.len(),
            counts_by_category,
            fingerprint,
        };
        Ok(CacheSnapshot { passages, metadata })
    }

    async fn crawl_category(
        &self,
        category: DocCategory,
        progress: &dyn CrawlProgress,
    ) -> Result<Vec<Passage>> {
        let mut collected = Vec::new();
        let mut page = 1u32;

        loop {
            let listing = match self.adapter.fetch_page(category, page, self.per_page).await {
                Ok(listing) => listing,
                Err(e) if e.status() == Some(PAGE_OUT_OF_RANGE) => {
                    debug!(category = %category, page, "page out of range, category done");
                    break;
                }
                Err(e) => {
                    warn!(category = %category, page, error = %e, "crawl aborted");
                    return Err(GroundworkError::CrawlAborted {
                        category: category.to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            if listing.records == 0 {
                break;
            }

            collected.extend(listing.passages);
            progress.page_fetched(category, page, collected.len());

            if listing.total_pages.is_some_and(|total| page >= total) {
                break;
            }
            if page >= MAX_PAGES_PER_CATEGORY {
                warn!(category = %category, page, "page limit reached, stopping category");
                break;
            }
            page += 1;
        }

        Ok(collected)
    }

    /// Crawl, then replace the stored snapshot. Nothing is written on failure.
    #[instrument(skip_all)]
    pub async fn crawl_and_store(
        &self,
        store: &SnapshotStore,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlReport> {
        let started = Instant::now();

        let previous = match store.read_metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "could not read previous crawl metadata");
                None
            }
        };

        let snapshot = self.crawl(progress).await?;
        let changed = previous
            .as_ref()
            .is_none_or(|m| m.fingerprint != snapshot.metadata.fingerprint);

        store.write_snapshot(&snapshot).await?;

        let report = CrawlReport {
            passage_count: snapshot.metadata.passage_count,
            counts_by_category: snapshot.metadata.counts_by_category.clone(),
            fingerprint: snapshot.metadata.fingerprint.clone(),
            changed,
            last_updated: snapshot.metadata.last_updated,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            count = report.passage_count,
            changed = report.changed,
            elapsed_ms = report.duration_ms,
            "crawl stored"
        );
        Ok(report)
    }
}

/// SHA-256 over the serialized passage collection.
fn fingerprint(passages: &[Passage]) -> Result<String> {
    let serialized = serde_json::to_vec(passages)
        .map_err(|e| GroundworkError::parse(format!("failed to serialize passages: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use groundwork_shared::{CacheConfig, PublicDocsConfig, SourceKind};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler_for(server: &MockServer) -> Crawler {
        let adapter = PublicDocsAdapter::new(PublicDocsConfig {
            base_url: server.uri(),
            request_timeout_secs: 2,
            ..PublicDocsConfig::default()
        })
        .unwrap();
        Crawler::new(adapter, 100)
    }

    fn records(ids: &[u64]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| {
                    json!({
                        "id": id,
                        "title": {"rendered": format!("Article {id}")},
                        "link": format!("https://help.example.com/{id}"),
                        "content": {"rendered": "<p>body</p>"},
                    })
                })
                .collect(),
        )
    }

    async fn mount_page(server: &MockServer, collection: &str, page: u32, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/wp-json/wp/v2/{collection}")))
            .and(query_param("page", page.to_string()))
            .and(query_param("per_page", "100"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    /// posts: two pages ending by header; news: one page then 400; faq: empty.
    async fn healthy_site(server: &MockServer) {
        mount_page(
            server,
            "posts",
            1,
            ResponseTemplate::new(200)
                .insert_header("X-WP-TotalPages", "2")
                .set_body_json(records(&[1, 2])),
        )
        .await;
        mount_page(
            server,
            "posts",
            2,
            ResponseTemplate::new(200)
                .insert_header("X-WP-TotalPages", "2")
                .set_body_json(records(&[3])),
        )
        .await;
        Mock::given(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(400))
            .expect(0)
            .mount(server)
            .await;

        mount_page(server, "news", 1, ResponseTemplate::new(200).set_body_json(records(&[10]))).await;
        mount_page(
            server,
            "news",
            2,
            ResponseTemplate::new(400).set_body_json(json!({"code": "rest_post_invalid_page_number"})),
        )
        .await;

        mount_page(server, "faq", 1, ResponseTemplate::new(200).set_body_json(json!([]))).await;
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl CrawlProgress for Recorder {
        fn category_started(&self, category: DocCategory) {
            self.events.lock().unwrap().push(format!("start {category}"));
        }
        fn page_fetched(&self, category: DocCategory, page: u32, collected: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{category} p{page} {collected}"));
        }
        fn category_finished(&self, category: DocCategory, count: usize) {
            self.events.lock().unwrap().push(format!("done {category} {count}"));
        }
    }

    #[tokio::test]
    async fn crawl_paginates_every_category() {
        let server = MockServer::start().await;
        healthy_site(&server).await;

        let recorder = Recorder::default();
        let snapshot = crawler_for(&server).crawl(&recorder).await.unwrap();

        let ids: Vec<String> = snapshot
            .passages
            .iter()
            .map(|p| p.id.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "10"]);
        assert!(snapshot.passages.iter().all(|p| p.source == SourceKind::PublicDocs));

        let counts = &snapshot.metadata.counts_by_category;
        assert_eq!(counts[&DocCategory::Posts], 3);
        assert_eq!(counts[&DocCategory::News], 1);
        assert_eq!(counts[&DocCategory::Faq], 0);
        assert_eq!(snapshot.metadata.passage_count, 4);
        assert_eq!(snapshot.metadata.fingerprint.len(), 64);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start posts",
                "posts p1 2",
                "posts p2 3",
                "done posts 3",
                "start news",
                "news p1 1",
                "done news 1",
                "start faq",
                "done faq 0",
            ]
        );
    }

    #[tokio::test]
    async fn crawl_and_store_writes_snapshot_and_tracks_changes() {
        let server = MockServer::start().await;
        healthy_site(&server).await;

        let store = SnapshotStore::in_memory(&CacheConfig::default());
        let crawler = crawler_for(&server);

        let first = crawler.crawl_and_store(&store, &SilentProgress).await.unwrap();
        assert!(first.changed);
        assert_eq!(first.passage_count, 4);

        let stored = store.read_snapshot().await.unwrap().expect("snapshot");
        assert_eq!(stored.passages.len(), 4);
        assert_eq!(stored.metadata.fingerprint, first.fingerprint);

        let second = crawler.crawl_and_store(&store, &SilentProgress).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[tokio::test]
    async fn failure_mid_crawl_leaves_previous_snapshot_untouched() {
        let good = MockServer::start().await;
        healthy_site(&good).await;
        let store = SnapshotStore::in_memory(&CacheConfig::default());
        crawler_for(&good)
            .crawl_and_store(&store, &SilentProgress)
            .await
            .unwrap();
        let before = store.read_snapshot().await.unwrap();

        // Second run: posts succeed, news fails with a non-range error.
        let broken = MockServer::start().await;
        mount_page(&broken, "posts", 1, ResponseTemplate::new(200).set_body_json(records(&[99]))).await;
        mount_page(&broken, "posts", 2, ResponseTemplate::new(400)).await;
        mount_page(&broken, "news", 1, ResponseTemplate::new(500)).await;
        Mock::given(path("/wp-json/wp/v2/faq"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&broken)
            .await;

        let err = crawler_for(&broken)
            .crawl_and_store(&store, &SilentProgress)
            .await
            .unwrap_err();
        match err {
            GroundworkError::CrawlAborted { category, reason } => {
                assert_eq!(category, "news");
                assert!(reason.contains("500"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.read_snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn first_page_out_of_range_is_an_empty_category() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let snapshot = crawler_for(&server).crawl(&SilentProgress).await.unwrap();
        assert!(snapshot.passages.is_empty());
        assert_eq!(snapshot.metadata.counts_by_category.len(), 3);
    }

    #[test]
    fn fingerprint_depends_on_content() {
        let a = Passage::new(SourceKind::PublicDocs, "A", "https://h/a", "x");
        let b = Passage::new(SourceKind::PublicDocs, "B", "https://h/b", "x");
        let fa = fingerprint(std::slice::from_ref(&a)).unwrap();
        assert_eq!(fa, fingerprint(std::slice::from_ref(&a)).unwrap());
        assert_ne!(fa, fingerprint(&[a, b]).unwrap());
    }
}
