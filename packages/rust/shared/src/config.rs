//! Application configuration for groundwork.
//!
//! User config lives at `~/.groundwork/groundwork.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the file: each source names the
//! environment variable that holds its secret.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GroundworkError, Result};
use crate::types::{DEFAULT_MAX_RESULTS, DocCategory, SourceKind};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "groundwork.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".groundwork";

// ---------------------------------------------------------------------------
// Config structs (matching groundwork.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub public_docs: PublicDocsConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub internal_pages: InternalPagesConfig,

    #[serde(default)]
    pub ticket_history: TicketHistoryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub crawl: CrawlSettings,

    #[serde(default)]
    pub server: ServerConfig,
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages returned when the caller does not specify a count.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Sources consulted by default.
    #[serde(default = "default_enabled_sources")]
    pub enabled_sources: Vec<SourceKind>,

    /// Answer help-center queries from the crawl cache when it is populated.
    #[serde(default = "default_true")]
    pub prefer_cache: bool,

    /// Deadline for one source's whole search, in seconds.
    #[serde(default = "default_source_deadline")]
    pub source_deadline_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            enabled_sources: default_enabled_sources(),
            prefer_cache: true,
            source_deadline_secs: default_source_deadline(),
        }
    }
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}
fn default_enabled_sources() -> Vec<SourceKind> {
    SourceKind::ALL.to_vec()
}
fn default_true() -> bool {
    true
}
fn default_source_deadline() -> u64 {
    20
}

/// `[public_docs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDocsConfig {
    /// Help center origin; the REST API lives under `/wp-json/wp/v2/`.
    #[serde(default = "default_public_docs_url")]
    pub base_url: String,

    /// Collections searched and crawled.
    #[serde(default = "default_categories")]
    pub categories: Vec<DocCategory>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_public_body_max")]
    pub body_max_chars: usize,

    #[serde(default = "default_excerpt_max")]
    pub excerpt_max_chars: usize,
}

impl Default for PublicDocsConfig {
    fn default() -> Self {
        Self {
            base_url: default_public_docs_url(),
            categories: default_categories(),
            request_timeout_secs: default_request_timeout(),
            body_max_chars: default_public_body_max(),
            excerpt_max_chars: default_excerpt_max(),
        }
    }
}

fn default_public_docs_url() -> String {
    "https://help-ads.smartnews.com".into()
}
fn default_categories() -> Vec<DocCategory> {
    DocCategory::ALL.to_vec()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_public_body_max() -> usize {
    2000
}
fn default_excerpt_max() -> usize {
    300
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Check help-center locators before citing them.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_validation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_validation_timeout(),
        }
    }
}

fn default_validation_timeout() -> u64 {
    3
}

/// `[internal_pages]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalPagesConfig {
    #[serde(default = "default_internal_api_base")]
    pub api_base: String,

    /// Name of the env var holding the integration token.
    #[serde(default = "default_internal_key_env")]
    pub api_key_env: String,

    /// Value sent in the `Notion-Version` header.
    #[serde(default = "default_internal_api_version")]
    pub api_version: String,

    /// Candidates requested per wanted result.
    #[serde(default = "default_overfetch")]
    pub overfetch_factor: usize,

    /// Upper bound on candidates per search.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Child blocks are only fetched while the page text is shorter than this.
    #[serde(default = "default_child_ceiling")]
    pub child_text_ceiling: usize,

    #[serde(default = "default_internal_body_max")]
    pub body_max_chars: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for InternalPagesConfig {
    fn default() -> Self {
        Self {
            api_base: default_internal_api_base(),
            api_key_env: default_internal_key_env(),
            api_version: default_internal_api_version(),
            overfetch_factor: default_overfetch(),
            max_candidates: default_max_candidates(),
            child_text_ceiling: default_child_ceiling(),
            body_max_chars: default_internal_body_max(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_internal_api_base() -> String {
    "https://api.notion.com/v1".into()
}
fn default_internal_key_env() -> String {
    "NOTION_API_KEY".into()
}
fn default_internal_api_version() -> String {
    "2022-06-28".into()
}
fn default_overfetch() -> usize {
    3
}
fn default_max_candidates() -> usize {
    20
}
fn default_child_ceiling() -> usize {
    1500
}
fn default_internal_body_max() -> usize {
    2500
}

/// `[ticket_history]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketHistoryConfig {
    /// Ticket system origin (`https://<subdomain>.zendesk.com`).
    #[serde(default = "default_ticket_url")]
    pub base_url: String,

    #[serde(default = "default_ticket_email_env")]
    pub email_env: String,

    #[serde(default = "default_ticket_token_env")]
    pub token_env: String,

    #[serde(default = "default_public_body_max")]
    pub body_max_chars: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TicketHistoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_ticket_url(),
            email_env: default_ticket_email_env(),
            token_env: default_ticket_token_env(),
            body_max_chars: default_public_body_max(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_ticket_url() -> String {
    "https://smartnews-ads.zendesk.com".into()
}
fn default_ticket_email_env() -> String {
    "ZENDESK_EMAIL".into()
}
fn default_ticket_token_env() -> String {
    "ZENDESK_API_TOKEN".into()
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// libSQL database file backing the key/value store.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_passages_key")]
    pub passages_key: String,

    #[serde(default = "default_metadata_key")]
    pub metadata_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            passages_key: default_passages_key(),
            metadata_key: default_metadata_key(),
        }
    }
}

impl CacheConfig {
    /// `db_path` with a leading `~/` expanded to the home directory.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match self.db_path.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    GroundworkError::config("could not determine home directory")
                })?;
                Ok(home.join(rest))
            }
            None => Ok(PathBuf::from(&self.db_path)),
        }
    }
}

fn default_db_path() -> String {
    "~/.groundwork/cache.db".into()
}
fn default_passages_key() -> String {
    "helpcenter:articles".into()
}
fn default_metadata_key() -> String {
    "helpcenter:metadata".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Records requested per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Env var holding the shared secret for the crawl trigger.
    #[serde(default = "default_trigger_secret_env")]
    pub trigger_secret_env: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            trigger_secret_env: default_trigger_secret_env(),
        }
    }
}

fn default_per_page() -> u32 {
    100
}
fn default_trigger_secret_env() -> String {
    "CRON_SECRET".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3100".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.groundwork/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| GroundworkError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.groundwork/groundwork.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GroundworkError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        GroundworkError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GroundworkError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GroundworkError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GroundworkError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the named env var; unset or blank counts as absent.
pub fn resolve_secret(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}
