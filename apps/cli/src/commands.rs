//! CLI command definitions, routing, and tracing setup.

use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use groundwork_core::{Citation, GroundingContext, Retriever};
use groundwork_crawler::{CrawlProgress, Crawler};
use groundwork_shared::{
    AppConfig, DocCategory, GroundworkError, Query, RetrievalConfig, SourceKind, init_config,
    load_config,
};
use groundwork_storage::SnapshotStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// groundwork: grounded retrieval over help center, internal pages and tickets.
#[derive(Parser)]
#[command(
    name = "groundwork",
    version,
    about = "Retrieve grounding passages from support knowledge sources and maintain the help-center cache.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Retrieve passages for a query.
    Search {
        /// Free-form query text.
        query: String,

        /// Maximum passages to return (defaults to `[retrieval].max_results`).
        #[arg(short = 'n', long)]
        max_results: Option<usize>,

        /// Sources to consult, comma-separated (public_docs, internal_pages, ticket_history).
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<SourceKind>,

        /// Query the help center live even when a snapshot exists.
        #[arg(long)]
        no_cache: bool,

        /// Print the grounding context instead of a result list.
        #[arg(long, conflicts_with = "json")]
        context: bool,

        /// Print citations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Crawl the help center and replace the cached snapshot.
    Crawl,

    /// Inspect the snapshot cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Serve retrieval and the crawl trigger over HTTP.
    Serve {
        /// Address to bind (defaults to `[server].bind`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show metadata of the last successful crawl.
    Status,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "groundwork=info",
        1 => "groundwork=debug",
        _ => "groundwork=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search {
            query,
            max_results,
            sources,
            no_cache,
            context,
            json,
        } => {
            let output = if json {
                Output::Json
            } else if context {
                Output::Context
            } else {
                Output::List
            };
            cmd_search(&query, max_results, sources, no_cache, output).await
        }
        Command::Crawl => cmd_crawl().await,
        Command::Cache { action } => match action {
            CacheAction::Status => cmd_cache_status().await,
        },
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Build a [`Query`], filling unset options from `[retrieval]`.
pub(crate) fn build_query(
    retrieval: &RetrievalConfig,
    text: &str,
    max_results: Option<usize>,
    sources: Vec<SourceKind>,
) -> groundwork_shared::Result<Query> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GroundworkError::validation("query must not be empty"));
    }
    let sources = if sources.is_empty() {
        retrieval.enabled_sources.clone()
    } else {
        sources
    };
    Ok(Query::new(text)
        .with_max_results(max_results.unwrap_or(retrieval.max_results))
        .with_sources(sources))
}

/// Open the snapshot cache for reading; `None` when it does not exist yet.
async fn open_cache_readonly(config: &AppConfig) -> Option<SnapshotStore> {
    match SnapshotStore::open_readonly(&config.cache).await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "snapshot cache unavailable, help center will be searched live");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

enum Output {
    List,
    Context,
    Json,
}

async fn cmd_search(
    text: &str,
    max_results: Option<usize>,
    sources: Vec<SourceKind>,
    no_cache: bool,
    output: Output,
) -> Result<()> {
    let config = load_config()?;
    let query = build_query(&config.retrieval, text, max_results, sources)?;

    let store = if no_cache || !config.retrieval.prefer_cache {
        None
    } else {
        open_cache_readonly(&config).await
    };
    let retriever = Retriever::from_config(&config, store)?;

    info!(
        query = %query.text,
        max_results = query.max_results,
        sources = ?query.enabled_sources,
        "searching"
    );
    let passages = retriever.retrieve(&query).await?;

    match output {
        Output::Json => {
            let citations: Vec<Citation> = passages.iter().map(Citation::from).collect();
            println!("{}", serde_json::to_string_pretty(&citations)?);
        }
        Output::Context => {
            println!("{}", GroundingContext::new(&passages).render());
        }
        Output::List => {
            if passages.is_empty() {
                println!("No grounding found.");
                return Ok(());
            }
            println!();
            for (i, passage) in passages.iter().enumerate() {
                println!("  {}. [{}] {}", i + 1, passage.source, passage.title);
                println!("     {}", passage.locator);
            }
            println!();
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl CrawlProgress for CliProgress {
    fn category_started(&self, category: DocCategory) {
        self.spinner.set_message(format!("Crawling {category}"));
    }

    fn page_fetched(&self, category: DocCategory, page: u32, collected: usize) {
        self.spinner
            .set_message(format!("Crawling {category} [page {page}, {collected} articles]"));
    }

    fn category_finished(&self, category: DocCategory, count: usize) {
        self.spinner.println(format!("  {category}: {count}"));
    }
}

async fn cmd_crawl() -> Result<()> {
    let config = load_config()?;
    let store = SnapshotStore::open(&config.cache).await?;
    let crawler = Crawler::from_config(&config)?;

    info!(base_url = %config.public_docs.base_url, "starting crawl");

    let progress = CliProgress::new();
    let result = crawler.crawl_and_store(&store, &progress).await;
    progress.finish();
    let report = result?;

    println!();
    println!("  Snapshot stored.");
    println!("  Articles: {}", report.passage_count);
    println!("  Changed:  {}", if report.changed { "yes" } else { "no" });
    println!("  Time:     {:.1}s", report.duration_ms as f64 / 1000.0);
    println!();

    Ok(())
}

async fn cmd_cache_status() -> Result<()> {
    let config = load_config()?;
    let path = config.cache.resolved_db_path()?;

    let Some(store) = open_cache_readonly(&config).await else {
        println!("No cache database at {}", path.display());
        return Ok(());
    };

    match store.read_metadata().await? {
        None => println!("No snapshot yet. Run `groundwork crawl`."),
        Some(metadata) => {
            println!();
            println!("  Database:     {}", path.display());
            println!("  Last updated: {}", metadata.last_updated.to_rfc3339());
            println!("  Articles:     {}", metadata.passage_count);
            for (category, count) in &metadata.counts_by_category {
                println!("    {:<6} {count}", category.collection());
            }
            println!("  Fingerprint:  {}", metadata.fingerprint);
            println!();
        }
    }
    Ok(())
}

async fn cmd_serve(bind: Option<String>) -> Result<()> {
    let config = load_config()?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let state = crate::server::AppState::from_config(&config).await?;
    crate::server::serve(state, &bind)
        .await
        .map_err(|e| eyre!("server failed on {bind}: {e}"))
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
