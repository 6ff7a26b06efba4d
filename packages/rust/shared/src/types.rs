//! Core domain types for groundwork retrieval.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GroundworkError;

/// Result count used when the caller does not ask for one.
pub const DEFAULT_MAX_RESULTS: usize = 3;

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// The knowledge source a passage was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Public WordPress-backed help center.
    PublicDocs,
    /// Internal workspace pages.
    InternalPages,
    /// Historical support tickets.
    TicketHistory,
}

impl SourceKind {
    /// Every source, in presentation order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::PublicDocs,
        SourceKind::InternalPages,
        SourceKind::TicketHistory,
    ];

    /// Stable identifier used in config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicDocs => "public_docs",
            Self::InternalPages => "internal_pages",
            Self::TicketHistory => "ticket_history",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = GroundworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "public_docs" | "public" | "helpcenter" => Ok(Self::PublicDocs),
            "internal_pages" | "internal" | "notion" => Ok(Self::InternalPages),
            "ticket_history" | "tickets" | "zendesk" => Ok(Self::TicketHistory),
            other => Err(GroundworkError::validation(format!(
                "unknown source '{other}' (expected public_docs, internal_pages or ticket_history)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DocCategory
// ---------------------------------------------------------------------------

/// Content sub-type inside the public help center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocCategory {
    /// General articles.
    Posts,
    /// Announcements.
    News,
    /// Frequently asked questions.
    Faq,
}

impl DocCategory {
    /// All categories in crawl order.
    pub const ALL: [DocCategory; 3] = [DocCategory::Posts, DocCategory::News, DocCategory::Faq];

    /// REST collection name (`/wp-json/wp/v2/<collection>`).
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::News => "news",
            Self::Faq => "faq",
        }
    }
}

impl fmt::Display for DocCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

// ---------------------------------------------------------------------------
// Passage
// ---------------------------------------------------------------------------

/// Source-local identifier: numeric for WordPress/ticket records, opaque for pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassageId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A normalized, source-tagged unit of retrieved text with a citation locator.
///
/// `locator` is the deduplication key: two passages with the same locator
/// are the same logical document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PassageId>,
    /// Plain-text heading.
    pub title: String,
    /// Canonical absolute URL, surfaced to the end user as the citation.
    pub locator: String,
    /// Plain-text content, already truncated by the adapter.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub source: SourceKind,
    /// Help-center sub-type; crawl bookkeeping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocCategory>,
    /// Internal pages only; used for recency tie-breaking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Ticket history only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_status: Option<String>,
    /// Ticket history only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Passage {
    /// Create a passage with the required fields; optional fields start empty.
    pub fn new(
        source: SourceKind,
        title: impl Into<String>,
        locator: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            locator: locator.into(),
            body: body.into(),
            excerpt: None,
            source,
            category: None,
            last_modified: None,
            ticket_status: None,
            created_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// A retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Free-form query text.
    pub text: String,
    /// Maximum passages to return (always ≥ 1).
    pub max_results: usize,
    /// Sources to consult.
    pub enabled_sources: Vec<SourceKind>,
}

impl Query {
    /// Query against every source with the default result count.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: DEFAULT_MAX_RESULTS,
            enabled_sources: SourceKind::ALL.to_vec(),
        }
    }

    /// Set the result count; zero is raised to one.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Restrict the query to the given sources (duplicates are ignored).
    pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceKind>) -> Self {
        self.enabled_sources.clear();
        for source in sources {
            if !self.enabled_sources.contains(&source) {
                self.enabled_sources.push(source);
            }
        }
        self
    }

    pub fn is_enabled(&self, source: SourceKind) -> bool {
        self.enabled_sources.contains(&source)
    }
}

// ---------------------------------------------------------------------------
// CacheSnapshot
// ---------------------------------------------------------------------------

/// Bookkeeping written next to the cached passages after each crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the crawl that produced the snapshot finished.
    pub last_updated: DateTime<Utc>,
    /// Total passages in the snapshot.
    pub passage_count: usize,
    /// Passages per help-center category.
    #[serde(default)]
    pub counts_by_category: BTreeMap<DocCategory, usize>,
    /// SHA-256 of the serialized passage collection.
    #[serde(default)]
    pub fingerprint: String,
}

/// The full cached result of one crawl of the public help center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Passages in crawl discovery order.
    pub passages: Vec<Passage>,
    pub metadata: CacheMetadata,
}
