//! Public help-center adapter over the WordPress REST API.
//!
//! Each content sub-type is its own collection (`/wp-json/wp/v2/posts`,
//! `/news`, `/faq`) accepting `search`, `page`, and `per_page` parameters.
//! Rendered title/content/excerpt fields carry markup and go through the
//! normalizer before they become passages.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use groundwork_shared::{
    DocCategory, GroundworkError, Passage, PassageId, PublicDocsConfig, Result, SourceKind,
};
use groundwork_text::normalize;

use crate::SourceAdapter;
use crate::client::{build_client, check_status, decode_records, read_json};

/// WordPress caps `per_page` at 100.
const MAX_PER_PAGE: usize = 100;

/// Response header carrying the number of pages in a collection.
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

/// One WordPress record; a missing `title` makes the record undecodable.
#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    title: Rendered,
    link: String,
    #[serde(default)]
    content: Option<Rendered>,
    #[serde(default)]
    excerpt: Option<Rendered>,
}

/// One page of a collection listing.
#[derive(Debug, Clone)]
pub struct PostPage {
    /// Records that mapped to passages.
    pub passages: Vec<Passage>,
    /// Records in the response before mapping (malformed ones included).
    pub records: usize,
    /// Value of the total-pages header, when present and numeric.
    pub total_pages: Option<u32>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Searches and pages through the public help center.
#[derive(Debug, Clone)]
pub struct PublicDocsAdapter {
    client: Client,
    base: Url,
    config: PublicDocsConfig,
}

impl PublicDocsAdapter {
    /// Build an adapter from its config section.
    pub fn new(config: PublicDocsConfig) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.request_timeout_secs))?;
        let base = parse_base(&config.base_url)?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    pub fn config(&self) -> &PublicDocsConfig {
        &self.config
    }

    /// Fetch one listing page of a collection (no search filter).
    ///
    /// Used by the crawler; an out-of-range page surfaces as
    /// [`GroundworkError::Http`] with status 400.
    #[instrument(skip(self), fields(category = %category))]
    pub async fn fetch_page(
        &self,
        category: DocCategory,
        page: u32,
        per_page: u32,
    ) -> Result<PostPage> {
        let mut url = self.collection_url(category)?;
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let response = check_status(
            self.client
                .get(url.as_str())
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await,
            url.as_str(),
        )?;

        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let records: Vec<Value> = read_json(response, url.as_str()).await?;
        let count = records.len();
        let passages = self.map_records(records, category);

        debug!(page, records = count, mapped = passages.len(), "fetched listing page");

        Ok(PostPage {
            passages,
            records: count,
            total_pages,
        })
    }

    /// Fetch a single general article by id. `Ok(None)` when it does not exist.
    pub async fn get_post(&self, id: u64) -> Result<Option<Passage>> {
        let url = self.api_url(&format!("{}/{id}", DocCategory::Posts.collection()))?;

        let result = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await;

        if let Ok(response) = &result {
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
        }

        let response = check_status(result, url.as_str())?;
        let post: WpPost = read_json(response, url.as_str()).await?;
        Ok(self.map_post(post, DocCategory::Posts))
    }

    /// Search one collection by substring.
    #[instrument(skip(self, query), fields(category = %category))]
    async fn search_category(
        &self,
        category: DocCategory,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<Passage>> {
        let mut url = self.collection_url(category)?;
        url.query_pairs_mut()
            .append_pair("search", query)
            .append_pair("per_page", &per_page.to_string());

        let response = check_status(
            self.client
                .get(url.as_str())
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await,
            url.as_str(),
        )?;

        let records: Vec<Value> = read_json(response, url.as_str()).await?;
        debug!(records = records.len(), "help center search returned");
        Ok(self.map_records(records, category))
    }

    fn collection_url(&self, category: DocCategory) -> Result<Url> {
        self.api_url(category.collection())
    }

    fn api_url(&self, resource: &str) -> Result<Url> {
        self.base
            .join(&format!("wp-json/wp/v2/{resource}"))
            .map_err(|e| GroundworkError::config(format!("invalid help center URL: {e}")))
    }

    fn map_records(&self, records: Vec<Value>, category: DocCategory) -> Vec<Passage> {
        decode_records::<WpPost>(records, category.collection())
            .into_iter()
            .filter_map(|post| self.map_post(post, category))
            .collect()
    }

    fn map_post(&self, post: WpPost, category: DocCategory) -> Option<Passage> {
        let title = normalize(&post.title.rendered, None);
        if title.is_empty() || post.link.trim().is_empty() {
            debug!(id = post.id, "skipping record without title or link");
            return None;
        }

        let body = post
            .content
            .map(|c| normalize(&c.rendered, Some(self.config.body_max_chars)))
            .unwrap_or_default();
        let excerpt = post
            .excerpt
            .map(|e| normalize(&e.rendered, Some(self.config.excerpt_max_chars)))
            .filter(|e| !e.is_empty());

        let mut passage = Passage::new(SourceKind::PublicDocs, title, post.link.trim(), body);
        passage.id = Some(PassageId::Numeric(post.id));
        passage.excerpt = excerpt;
        passage.category = Some(category);
        Some(passage)
    }
}

#[async_trait]
impl SourceAdapter for PublicDocsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::PublicDocs
    }

    /// Search every configured collection concurrently, `max_results` each.
    ///
    /// A failing collection is logged and skipped; the call only fails when
    /// every collection failed.
    #[instrument(skip_all, fields(source = "public_docs"))]
    async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<Passage>> {
        let per_page = max_results.clamp(1, MAX_PER_PAGE);

        let searches = self.config.categories.iter().map(|&category| async move {
            (category, self.search_category(category, query, per_page).await)
        });

        let mut passages = Vec::new();
        let mut succeeded = 0usize;
        let mut last_error = None;

        for (category, result) in join_all(searches).await {
            match result {
                Ok(found) => {
                    succeeded += 1;
                    passages.extend(found);
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "help center collection search failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(passages),
        }
    }
}

/// Parse the configured origin, forcing a trailing slash so joins append.
fn parse_base(raw: &str) -> Result<Url> {
    let mut base = Url::parse(raw)
        .map_err(|e| GroundworkError::config(format!("invalid public_docs.base_url '{raw}': {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> PublicDocsAdapter {
        PublicDocsAdapter::new(PublicDocsConfig {
            base_url: server.uri(),
            request_timeout_secs: 1,
            ..PublicDocsConfig::default()
        })
        .unwrap()
    }

    fn wp_post(server: &MockServer, id: u64, title: &str) -> Value {
        json!({
            "id": id,
            "title": {"rendered": title},
            "link": format!("{}/articles/{id}", server.uri()),
            "content": {"rendered": format!("<p>{title} &amp; more details</p>")},
            "excerpt": {"rendered": "<p>Short&nbsp;summary</p>"},
        })
    }

    #[test]
    fn collection_urls_respect_base_path() {
        let adapter = PublicDocsAdapter::new(PublicDocsConfig {
            base_url: "https://help.example.com/support".into(),
            ..PublicDocsConfig::default()
        })
        .unwrap();
        assert_eq!(
            adapter.collection_url(DocCategory::Faq).unwrap().as_str(),
            "https://help.example.com/support/wp-json/wp/v2/faq"
        );
    }

    #[tokio::test]
    async fn searches_every_collection_and_maps_records() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("search", "targeting"))
            .and(query_param("per_page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                wp_post(&server, 1, "Targeting <em>basics</em>"),
                {"id": 2, "link": "https://help.example.com/untitled"},
                {"id": 3, "title": {"rendered": ""}, "link": "https://help.example.com/empty"},
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/news"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                wp_post(&server, 10, "Targeting update"),
            ])))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/faq"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let passages = adapter.try_search("targeting", 3).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].title, "Targeting basics");
        assert_eq!(passages[0].body, "Targeting basics & more details");
        assert_eq!(passages[0].excerpt.as_deref(), Some("Short summary"));
        assert_eq!(passages[0].category, Some(DocCategory::Posts));
        assert_eq!(passages[0].id, Some(PassageId::Numeric(1)));
        assert_eq!(passages[1].category, Some(DocCategory::News));
        assert!(passages.iter().all(|p| p.source == SourceKind::PublicDocs));
    }

    #[tokio::test]
    async fn failing_collection_does_not_abort_search() {
        let server = MockServer::start().await;

        Mock::given(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/wp-json/wp/v2/news"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(path("/wp-json/wp/v2/faq"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([wp_post(&server, 7, "FAQ entry")])),
            )
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let passages = adapter.search("entry", 5).await;
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].title, "FAQ entry");
    }

    #[tokio::test]
    async fn all_collections_failing_is_an_error_but_search_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let err = adapter.try_search("anything", 3).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(adapter.search("anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn slow_collection_times_out_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let start = std::time::Instant::now();
        assert!(adapter.search("slow", 3).await.is_empty());
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn fetch_page_reads_total_pages_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/faq"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-TotalPages", "4")
                    .set_body_json(json!([wp_post(&server, 5, "Billing FAQ"), {"id": 6}])),
            )
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let page = adapter.fetch_page(DocCategory::Faq, 2, 100).await.unwrap();
        assert_eq!(page.total_pages, Some(4));
        assert_eq!(page.records, 2);
        assert_eq!(page.passages.len(), 1);
        assert_eq!(page.passages[0].category, Some(DocCategory::Faq));
    }

    #[tokio::test]
    async fn get_post_distinguishes_missing_from_failure() {
        let server = MockServer::start().await;
        Mock::given(path("/wp-json/wp/v2/posts/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wp_post(&server, 11, "Login help")))
            .mount(&server)
            .await;
        Mock::given(path("/wp-json/wp/v2/posts/12"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/wp-json/wp/v2/posts/13"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server);
        let found = adapter.get_post(11).await.unwrap().expect("post 11");
        assert_eq!(found.title, "Login help");
        assert!(adapter.get_post(12).await.unwrap().is_none());
        assert!(adapter.get_post(13).await.is_err());
    }
}
