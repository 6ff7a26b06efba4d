//! Internal workspace adapter.
//!
//! A search call returns page stubs only. Each candidate's body is
//! materialized by listing its top-level blocks (and, while the page is
//! still short, one level of children), then candidates are ranked locally
//! with the same term-containment scorer the rest of the pipeline uses.

mod blocks;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use groundwork_shared::{
    GroundworkError, InternalPagesConfig, Passage, PassageId, Result, SourceKind, resolve_secret,
};
use groundwork_text::{collapse_whitespace, relevance, truncate_chars};

use crate::SourceAdapter;
use crate::client::{build_client, check_status, decode_records, read_json};
use blocks::{Block, PropertyValue};

/// Title used when a page has no usable title property.
const UNTITLED: &str = "Untitled";

/// Blocks requested for a page's top level.
const TOP_LEVEL_PAGE_SIZE: u32 = 100;

/// Blocks requested per expanded child list.
const CHILD_PAGE_SIZE: u32 = 20;

/// Prefix for lines that come from child blocks.
const CHILD_INDENT: &str = "  ";

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PageRecord {
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    last_edited_time: Option<DateTime<Utc>>,
    #[serde(default)]
    properties: Map<String, Value>,
}

/// Title of a page: the text of its title-typed property, or `"Untitled"`.
pub fn page_title(properties: &Map<String, Value>) -> String {
    properties
        .values()
        .map(|raw| PropertyValue::decode(raw.clone()))
        .find(PropertyValue::is_title)
        .map(|title| collapse_whitespace(&title.text()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Searches internal workspace pages.
#[derive(Debug, Clone)]
pub struct InternalPagesAdapter {
    client: Client,
    api_base: Url,
    api_key: Option<String>,
    config: InternalPagesConfig,
}

impl InternalPagesAdapter {
    /// Build an adapter with an explicit integration token.
    ///
    /// `None` is accepted: every search then returns an empty list.
    pub fn new(config: InternalPagesConfig, api_key: Option<String>) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.request_timeout_secs))?;
        let api_base = parse_api_base(&config.api_base)?;
        Ok(Self {
            client,
            api_base,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config,
        })
    }

    /// Build an adapter reading the token from the configured env var.
    pub fn from_config(config: InternalPagesConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.api_key_env);
        Self::new(config, api_key)
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| GroundworkError::config(format!("invalid internal pages URL: {e}")))
    }

    fn authorized(&self, request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        request
            .bearer_auth(api_key)
            .header("Notion-Version", &self.config.api_version)
    }

    /// Ask the search endpoint for page candidates.
    async fn search_pages(&self, api_key: &str, query: &str, page_size: usize) -> Result<Vec<PageRecord>> {
        let url = self.endpoint("search")?;
        let body = json!({
            "query": query,
            "filter": {"property": "object", "value": "page"},
            "page_size": page_size,
        });

        let response = check_status(
            self.authorized(self.client.post(url.as_str()), api_key)
                .json(&body)
                .send()
                .await,
            url.as_str(),
        )?;

        let listing: Listing = read_json(response, url.as_str()).await?;
        Ok(decode_records(listing.results, "page"))
    }

    async fn block_children(&self, api_key: &str, block_id: &str, page_size: u32) -> Result<Vec<Block>> {
        let mut url = self.endpoint(&format!("blocks/{block_id}/children"))?;
        url.query_pairs_mut()
            .append_pair("page_size", &page_size.to_string());

        let response = check_status(
            self.authorized(self.client.get(url.as_str()), api_key)
                .send()
                .await,
            url.as_str(),
        )?;

        let listing: Listing = read_json(response, url.as_str()).await?;
        Ok(decode_records(listing.results, "block"))
    }

    /// Flatten a page's blocks into newline-joined text.
    ///
    /// Children of a block are expanded (indented, first page only) while the
    /// text gathered so far is shorter than `child_text_ceiling` characters.
    async fn page_text(&self, api_key: &str, page_id: &str) -> Result<String> {
        let blocks = self
            .block_children(api_key, page_id, TOP_LEVEL_PAGE_SIZE)
            .await?;

        let mut lines: Vec<String> = Vec::new();
        let mut length = 0usize;

        for block in blocks {
            let text = block.text();
            if !text.is_empty() {
                push_line(&mut lines, &mut length, text);
            }

            if !block.has_children || length >= self.config.child_text_ceiling {
                continue;
            }

            match self.block_children(api_key, &block.id, CHILD_PAGE_SIZE).await {
                Ok(children) => {
                    for child in children {
                        let text = child.text();
                        if !text.is_empty() {
                            push_line(&mut lines, &mut length, format!("{CHILD_INDENT}{text}"));
                        }
                    }
                }
                Err(e) => debug!(block = %block.id, error = %e, "skipping child blocks"),
            }
        }

        Ok(lines.join("\n"))
    }

    /// Turn a page stub into a passage; a page without a URL is dropped.
    async fn materialize(&self, api_key: &str, page: PageRecord) -> Option<Passage> {
        if page.url.trim().is_empty() {
            debug!(page = %page.id, "skipping page without url");
            return None;
        }

        let body = match self.page_text(api_key, &page.id).await {
            Ok(text) => truncate_chars(&text, self.config.body_max_chars).to_string(),
            Err(e) => {
                warn!(page = %page.id, error = %e, "failed to load page blocks");
                String::new()
            }
        };

        let mut passage = Passage::new(
            SourceKind::InternalPages,
            page_title(&page.properties),
            page.url.trim(),
            body,
        );
        passage.id = Some(PassageId::Text(page.id));
        passage.last_modified = page.last_edited_time;
        Some(passage)
    }
}

#[async_trait]
impl SourceAdapter for InternalPagesAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::InternalPages
    }

    /// Over-fetch candidates, materialize them concurrently, keep the best
    /// `max_results` with a positive score (newer pages win ties).
    #[instrument(skip_all, fields(source = "internal_pages"))]
    async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<Passage>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(env = %self.config.api_key_env, "internal pages token not configured, skipping");
            return Ok(Vec::new());
        };

        let max_results = max_results.max(1);
        let page_size = max_results
            .saturating_mul(self.config.overfetch_factor.max(1))
            .min(self.config.max_candidates.max(1));

        let pages = self.search_pages(api_key, query, page_size).await?;
        debug!(candidates = pages.len(), "internal pages search returned");

        let candidates: Vec<Passage> = join_all(
            pages
                .into_iter()
                .map(|page| self.materialize(api_key, page)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let terms = relevance::query_terms(query);
        let mut scored: Vec<(u32, Passage)> = candidates
            .into_iter()
            .map(|p| (relevance::score(&terms, &p.title, &p.body), p))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .cmp(a_score)
                .then_with(|| b.last_modified.cmp(&a.last_modified))
        });

        Ok(scored
            .into_iter()
            .take(max_results)
            .map(|(_, passage)| passage)
            .collect())
    }
}

/// Append a line, tracking the joined length in characters.
fn push_line(lines: &mut Vec<String>, length: &mut usize, line: String) {
    if !lines.is_empty() {
        *length += 1;
    }
    *length += line.chars().count();
    lines.push(line);
}

fn parse_api_base(raw: &str) -> Result<Url> {
    let mut base = Url::parse(raw).map_err(|e| {
        GroundworkError::config(format!("invalid internal_pages.api_base '{raw}': {e}"))
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}
