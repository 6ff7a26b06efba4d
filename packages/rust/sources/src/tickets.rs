//! Support-ticket history adapter.
//!
//! Uses the ticket system's unified search endpoint restricted to
//! `type:ticket`, ordered by the service's own relevance. Authentication is
//! HTTP Basic with an API token (`{email}/token` as the user name).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use groundwork_shared::{
    GroundworkError, Passage, PassageId, Result, SourceKind, TicketHistoryConfig, resolve_secret,
};
use groundwork_text::normalize;

use crate::SourceAdapter;
use crate::client::{build_client, check_status, decode_records, read_json};

/// Title used for tickets without a subject.
const NO_SUBJECT: &str = "(件名なし)";

/// Search endpoint page-size ceiling.
const MAX_PER_PAGE: usize = 100;

/// Account email plus API token.
#[derive(Clone)]
pub struct TicketCredentials {
    pub email: String,
    pub api_token: String,
}

impl TicketCredentials {
    /// Read both halves from the configured env vars; `None` unless both are set.
    pub fn from_env(config: &TicketHistoryConfig) -> Option<Self> {
        Some(Self {
            email: resolve_secret(&config.email_env)?,
            api_token: resolve_secret(&config.token_env)?,
        })
    }
}

impl fmt::Debug for TicketCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketCredentials")
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Lifecycle state of a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Hold,
    Solved,
    Closed,
    /// A state this crate does not know; shown verbatim.
    Other(String),
}

impl TicketStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "open" => Self::Open,
            "pending" => Self::Pending,
            "hold" => Self::Hold,
            "solved" => Self::Solved,
            "closed" => Self::Closed,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Localized label attached to passages.
    pub fn label(&self) -> &str {
        match self {
            Self::New => "新規",
            Self::Open => "対応中",
            Self::Pending => "保留中",
            Self::Hold => "保留",
            Self::Solved => "解決済み",
            Self::Closed => "終了",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TicketRecord {
    id: u64,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Searches historical support tickets.
#[derive(Debug, Clone)]
pub struct TicketHistoryAdapter {
    client: Client,
    base_url: String,
    credentials: Option<TicketCredentials>,
    config: TicketHistoryConfig,
}

impl TicketHistoryAdapter {
    pub fn new(config: TicketHistoryConfig, credentials: Option<TicketCredentials>) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GroundworkError::config(format!(
                "invalid ticket_history.base_url '{}'",
                config.base_url
            )));
        }
        let client = build_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            client,
            base_url,
            credentials,
            config,
        })
    }

    pub fn from_config(config: TicketHistoryConfig) -> Result<Self> {
        let credentials = TicketCredentials::from_env(&config);
        Self::new(config, credentials)
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Agent-facing URL of a ticket.
    pub fn ticket_url(&self, id: u64) -> String {
        format!("{}/agent/tickets/{id}", self.base_url)
    }

    fn map_ticket(&self, ticket: TicketRecord) -> Passage {
        let title = ticket
            .subject
            .as_deref()
            .map(|s| normalize(s, None))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUBJECT.to_string());
        let body = ticket
            .description
            .as_deref()
            .map(|d| normalize(d, Some(self.config.body_max_chars)))
            .unwrap_or_default();

        let mut passage = Passage::new(SourceKind::TicketHistory, title, self.ticket_url(ticket.id), body);
        passage.id = Some(PassageId::Numeric(ticket.id));
        passage.ticket_status = ticket
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| TicketStatus::parse(s).label().to_string());
        passage.created_at = ticket.created_at;
        passage
    }
}

#[async_trait]
impl SourceAdapter for TicketHistoryAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::TicketHistory
    }

    #[instrument(skip_all, fields(source = "ticket_history"))]
    async fn try_search(&self, query: &str, max_results: usize) -> Result<Vec<Passage>> {
        let Some(credentials) = &self.credentials else {
            warn!(
                email_env = %self.config.email_env,
                token_env = %self.config.token_env,
                "ticket credentials not configured, skipping"
            );
            return Ok(Vec::new());
        };

        let url = format!("{}/api/v2/search.json", self.base_url);
        let per_page = max_results.clamp(1, MAX_PER_PAGE);

        let response = check_status(
            self.client
                .get(&url)
                .query(&[
                    ("query", format!("type:ticket {query}")),
                    ("sort_by", "relevance".to_string()),
                    ("per_page", per_page.to_string()),
                ])
                .basic_auth(format!("{}/token", credentials.email), Some(&credentials.api_token))
                .send()
                .await,
            &url,
        )?;

        let listing: SearchResponse = read_json(response, &url).await?;
        let tickets: Vec<TicketRecord> = decode_records(listing.results, "ticket");
        debug!(tickets = tickets.len(), "ticket search returned");

        Ok(tickets
            .into_iter()
            .take(per_page)
            .map(|ticket| self.map_ticket(ticket))
            .collect())
    }
}
