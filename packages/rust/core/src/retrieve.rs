//! Retrieval orchestration: fan out, merge, dedup, validate, rank, truncate.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;

use groundwork_shared::{AppConfig, Passage, Query, Result, SourceKind};
use groundwork_sources::{
    InternalPagesAdapter, PublicDocsAdapter, SourceAdapter, TicketHistoryAdapter,
};
use groundwork_storage::SnapshotStore;

use crate::cache::search_cached;
use crate::dedup::dedup_by_locator;
use crate::rank::rank;
use crate::validate::LinkValidator;

/// Entry point turning a [`Query`] into ranked, deduplicated passages.
#[derive(Clone)]
pub struct Retriever {
    adapters: BTreeMap<SourceKind, Arc<dyn SourceAdapter>>,
    store: Option<SnapshotStore>,
    validator: Option<LinkValidator>,
    prefer_cache: bool,
    source_deadline: Duration,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("sources", &self.adapters.keys().collect::<Vec<_>>())
            .field("cache", &self.store.is_some())
            .field("validate", &self.validator.is_some())
            .field("prefer_cache", &self.prefer_cache)
            .field("source_deadline", &self.source_deadline)
            .finish()
    }
}

/// What one source task hands back.
struct SourceOutcome {
    index: usize,
    source: SourceKind,
    passages: Result<Vec<Passage>>,
    elapsed: Duration,
}

impl Retriever {
    /// Empty retriever; every source search is cut off after `source_deadline`.
    pub fn new(source_deadline: Duration) -> Self {
        Self {
            adapters: BTreeMap::new(),
            store: None,
            validator: None,
            prefer_cache: true,
            source_deadline,
        }
    }

    /// Register an adapter under its own [`SourceKind`], replacing any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_validator(mut self, validator: LinkValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Answer help-center queries from the snapshot when a store is attached.
    pub fn prefer_cache(mut self, prefer: bool) -> Self {
        self.prefer_cache = prefer;
        self
    }

    /// All three adapters, the validator and the optional cache, from config.
    pub fn from_config(config: &AppConfig, store: Option<SnapshotStore>) -> Result<Self> {
        let mut retriever = Self::new(Duration::from_secs(config.retrieval.source_deadline_secs))
            .prefer_cache(config.retrieval.prefer_cache)
            .with_adapter(Arc::new(PublicDocsAdapter::new(config.public_docs.clone())?))
            .with_adapter(Arc::new(InternalPagesAdapter::from_config(
                config.internal_pages.clone(),
            )?))
            .with_adapter(Arc::new(TicketHistoryAdapter::from_config(
                config.ticket_history.clone(),
            )?));

        if let Some(validator) = LinkValidator::from_config(&config.validation)? {
            retriever = retriever.with_validator(validator);
        }
        if let Some(store) = store {
            retriever = retriever.with_store(store);
        }
        Ok(retriever)
    }

    /// Sources this retriever can serve.
    pub fn sources(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.adapters.keys().copied()
    }

    /// Run a query across its enabled sources.
    ///
    /// Sources run concurrently, each under the source deadline. A failing
    /// or slow source contributes nothing. An empty result means no grounding
    /// was found. Dropping the future aborts source searches still running.
    #[instrument(
        skip_all,
        fields(request_id = %Uuid::now_v7(), max_results = query.max_results)
    )]
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<Passage>> {
        let started = Instant::now();
        let max_results = query.max_results.max(1);

        let mut tasks = JoinSet::new();
        for (index, source) in query.enabled_sources.iter().copied().enumerate() {
            let Some(adapter) = self.adapters.get(&source).cloned() else {
                debug!(source = %source, "no adapter registered, skipping");
                continue;
            };
            let cache = match source {
                SourceKind::PublicDocs if self.prefer_cache => self.store.clone(),
                _ => None,
            };
            let text = query.text.clone();
            let deadline = self.source_deadline;

            tasks.spawn(
                async move {
                    let started = Instant::now();
                    let search = async {
                        match &cache {
                            Some(store) => {
                                search_cached(store, adapter.as_ref(), &text, max_results).await
                            }
                            None => Ok(adapter.search(&text, max_results).await),
                        }
                    };
                    let passages = match tokio::time::timeout(deadline, search).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(
                                source = %source,
                                deadline_ms = deadline.as_millis() as u64,
                                "source deadline exceeded"
                            );
                            Ok(Vec::new())
                        }
                    };
                    SourceOutcome {
                        index,
                        source,
                        passages,
                        elapsed: started.elapsed(),
                    }
                }
                .in_current_span(),
            );
        }

        let mut collected: Vec<(usize, Vec<Passage>)> = Vec::new();
        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => match outcome.passages {
                    Ok(passages) => {
                        debug!(
                            source = %outcome.source,
                            count = passages.len(),
                            elapsed_ms = outcome.elapsed.as_millis() as u64,
                            "source returned"
                        );
                        collected.push((outcome.index, passages));
                    }
                    Err(e) => {
                        error!(source = %outcome.source, error = %e, "source unavailable");
                        fatal = Some(e);
                    }
                },
                Err(e) => warn!(error = %e, "source task failed"),
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        collected.sort_by_key(|(index, _)| *index);
        let merged: Vec<Passage> = collected.into_iter().flat_map(|(_, p)| p).collect();
        let candidates = merged.len();

        let mut passages = dedup_by_locator(merged);
        if let Some(validator) = &self.validator {
            passages = validator.validate(passages).await;
        }
        let mut passages = rank(passages, &query.text);
        passages.truncate(max_results);

        info!(
            candidates,
            count = passages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use groundwork_shared::{
        CacheConfig, CacheMetadata, CacheSnapshot, DocCategory, GroundworkError, PublicDocsConfig,
    };
    use groundwork_storage::KvStore;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Adapter answering after a delay with fixed passages or an error.
    struct FakeAdapter {
        kind: SourceKind,
        delay: Duration,
        passages: Vec<Passage>,
        fail: bool,
        finished: Arc<AtomicBool>,
    }

    impl FakeAdapter {
        fn new(kind: SourceKind, delay_ms: u64, passages: Vec<Passage>) -> Self {
            Self {
                kind,
                delay: Duration::from_millis(delay_ms),
                passages,
                fail: false,
                finished: Arc::new(AtomicBool::new(false)),
            }
        }

        fn failing(kind: SourceKind, delay_ms: u64) -> Self {
            Self {
                fail: true,
                ..Self::new(kind, delay_ms, Vec::new())
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn try_search(&self, _query: &str, max_results: usize) -> Result<Vec<Passage>> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            if self.fail {
                return Err(GroundworkError::Network("connection reset".into()));
            }
            Ok(self.passages.iter().take(max_results).cloned().collect())
        }
    }

    struct BrokenKv;

    #[async_trait]
    impl KvStore for BrokenKv {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(GroundworkError::Storage("unreachable".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(GroundworkError::Storage("unreachable".into()))
        }
    }

    fn passage(source: SourceKind, title: &str, locator: &str) -> Passage {
        Passage::new(source, title, locator, format!("{title} body"))
    }

    #[tokio::test]
    async fn failing_source_does_not_sink_or_slow_the_response() {
        let retriever = Retriever::new(Duration::from_secs(5))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::PublicDocs,
                100,
                vec![passage(SourceKind::PublicDocs, "Budget guide", "https://h/docs/1")],
            )))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::InternalPages,
                200,
                vec![passage(SourceKind::InternalPages, "Budget runbook", "https://n/1")],
            )))
            .with_adapter(Arc::new(FakeAdapter::failing(SourceKind::TicketHistory, 50)));

        let started = Instant::now();
        let passages = retriever.retrieve(&Query::new("budget")).await.unwrap();
        let elapsed = started.elapsed();

        let sources: Vec<SourceKind> = passages.iter().map(|p| p.source).collect();
        assert_eq!(sources, vec![SourceKind::PublicDocs, SourceKind::InternalPages]);
        assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn slow_source_is_cut_off_at_the_deadline() {
        let retriever = Retriever::new(Duration::from_millis(200))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::InternalPages,
                10,
                vec![passage(SourceKind::InternalPages, "Budget runbook", "https://n/1")],
            )))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::TicketHistory,
                10_000,
                vec![passage(SourceKind::TicketHistory, "Budget ticket", "https://z/1")],
            )));

        let started = Instant::now();
        let passages = retriever.retrieve(&Query::new("budget")).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].source, SourceKind::InternalPages);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn merges_dedups_ranks_and_truncates() {
        let retriever = Retriever::new(Duration::from_secs(5))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::PublicDocs,
                0,
                vec![
                    passage(SourceKind::PublicDocs, "Other topic", "https://h/a"),
                    passage(SourceKind::PublicDocs, "Targeting overview", "https://h/shared"),
                ],
            )))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::InternalPages,
                0,
                vec![
                    {
                        let mut p = passage(SourceKind::InternalPages, "Targeting notes", "https://h/shared");
                        p.excerpt = Some("internal copy".into());
                        p
                    },
                    passage(SourceKind::InternalPages, "Targeting FAQ", "https://n/faq"),
                    passage(SourceKind::InternalPages, "Unrelated", "https://n/x"),
                ],
            )));

        let query = Query::new("targeting").with_max_results(5);
        let passages = retriever.retrieve(&query).await.unwrap();

        let titles: Vec<&str> = passages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Targeting overview", "Targeting FAQ"]);

        let query = Query::new("targeting").with_max_results(1);
        assert_eq!(retriever.retrieve(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_sources_are_not_called() {
        let tickets = FakeAdapter::new(SourceKind::TicketHistory, 0, Vec::new());
        let called = tickets.finished.clone();
        let retriever = Retriever::new(Duration::from_secs(1)).with_adapter(Arc::new(tickets));

        let query = Query::new("budget").with_sources([SourceKind::PublicDocs]);
        assert!(retriever.retrieve(&query).await.unwrap().is_empty());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropping_the_request_aborts_source_tasks() {
        let slow = FakeAdapter::new(SourceKind::InternalPages, 300, Vec::new());
        let finished = slow.finished.clone();
        let retriever = Retriever::new(Duration::from_secs(5)).with_adapter(Arc::new(slow));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), retriever.retrieve(&Query::new("x"))).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unreadable_cache_with_dead_live_source_is_an_error() {
        let retriever = Retriever::new(Duration::from_secs(5))
            .with_store(SnapshotStore::new(Arc::new(BrokenKv), &CacheConfig::default()))
            .with_adapter(Arc::new(FakeAdapter::failing(SourceKind::PublicDocs, 0)))
            .with_adapter(Arc::new(FakeAdapter::new(
                SourceKind::InternalPages,
                0,
                vec![passage(SourceKind::InternalPages, "Budget", "https://n/1")],
            )));

        assert!(retriever.retrieve(&Query::new("budget")).await.is_err());

        // Without cache preference the same failure is just an empty source.
        let live_only = retriever.clone().prefer_cache(false);
        assert_eq!(live_only.retrieve(&Query::new("budget")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn help_center_results_are_validated_end_to_end() {
        let server = MockServer::start().await;
        let record = |id: u64, title: &str| {
            json!({
                "id": id,
                "title": {"rendered": title},
                "link": format!("{}/articles/{id}", server.uri()),
                "content": {"rendered": "<p>about budgets</p>"},
            })
        };
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                record(1, "Budget setup"),
                record(2, "Budget moved"),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/articles/1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/articles/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = PublicDocsAdapter::new(PublicDocsConfig {
            base_url: server.uri(),
            categories: vec![DocCategory::Posts],
            ..PublicDocsConfig::default()
        })
        .unwrap();
        let retriever = Retriever::new(Duration::from_secs(5))
            .with_adapter(Arc::new(adapter))
            .with_validator(LinkValidator::new(Duration::from_secs(3)).unwrap());

        let passages = retriever.retrieve(&Query::new("budget")).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].title, "Budget setup");
    }

    fn posts_adapter(server: &MockServer) -> PublicDocsAdapter {
        PublicDocsAdapter::new(PublicDocsConfig {
            base_url: server.uri(),
            categories: vec![DocCategory::Posts],
            ..PublicDocsConfig::default()
        })
        .unwrap()
    }

    async fn seeded_store(passages: Vec<Passage>) -> SnapshotStore {
        let store = SnapshotStore::in_memory(&CacheConfig::default());
        let metadata = CacheMetadata {
            last_updated: Utc::now(),
            passage_count: passages.len(),
            counts_by_category: Default::default(),
            fingerprint: String::new(),
        };
        store
            .write_snapshot(&CacheSnapshot { passages, metadata })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn help_center_answers_from_snapshot_and_validates_cached_links() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&api)
            .await;

        let site = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/articles/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&site)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/articles/2"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&site)
            .await;

        let link = |id: u64| format!("{}/articles/{id}", site.uri());
        let store = seeded_store(vec![
            passage(SourceKind::PublicDocs, "Budget setup", &link(1)),
            passage(SourceKind::PublicDocs, "Budget moved", &link(2)),
            passage(SourceKind::PublicDocs, "Unrelated", &link(3)),
        ])
        .await;

        let retriever = Retriever::new(Duration::from_secs(5))
            .with_adapter(Arc::new(posts_adapter(&api)))
            .with_store(store)
            .with_validator(LinkValidator::new(Duration::from_secs(3)).unwrap());

        let query = Query::new("budget").with_sources([SourceKind::PublicDocs]);
        let passages = retriever.retrieve(&query).await.unwrap();

        let titles: Vec<&str> = passages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Budget setup"]);
    }

    #[tokio::test]
    async fn live_help_center_is_used_when_cache_is_not_preferred() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 9,
                "title": {"rendered": "Live budget"},
                "link": "https://help.example.com/articles/9",
            }])))
            .expect(1)
            .mount(&api)
            .await;

        let store = seeded_store(vec![passage(
            SourceKind::PublicDocs,
            "Cached budget",
            "https://help.example.com/articles/1",
        )])
        .await;

        let retriever = Retriever::new(Duration::from_secs(5))
            .with_adapter(Arc::new(posts_adapter(&api)))
            .with_store(store)
            .prefer_cache(false);

        let query = Query::new("budget").with_sources([SourceKind::PublicDocs]);
        let passages = retriever.retrieve(&query).await.unwrap();

        let titles: Vec<&str> = passages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Live budget"]);
    }
}
