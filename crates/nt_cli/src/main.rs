use clap::{ArgAction, Parser, Subcommand};
use nt_core::{AnalysisOutcome, AnalysisReport, AnalyzeRequest, Error, Persistence, QuotaStatus, Result, SystemClock};
use nt_inference::{create_registry, ClassificationOrchestrator, InferenceConfig, OrchestratorConfig, ProviderKind};
use nt_pipeline::{PipelineConfig, SentimentPipeline, UsageLedger};
use nt_search::{GoogleSearchProvider, PartialFailurePolicy, SearchConfig, SearchGateway};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod args;
mod logging;

use args::{parse_offset, HumanDuration};

#[derive(Parser, Debug)]
#[command(author, version, about = "Entity sentiment from web search results", long_about = None)]
pub struct Cli {
    /// Persistence backend: memory or sqlite
    #[arg(long, env = "NT_STORAGE", default_value = "memory", global = true)]
    storage: String,
    /// SQLite database file
    #[arg(long, env = "NT_DATABASE", global = true)]
    database: Option<PathBuf>,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    google_api_key: Option<String>,
    #[arg(long, env = "GOOGLE_CSE_ID", global = true)]
    google_cse_id: Option<String>,
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_MODEL", global = true)]
    gemini_model: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_MODEL", global = true)]
    openai_model: Option<String>,
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true, global = true)]
    deepseek_api_key: Option<String>,
    #[arg(long, env = "DEEPSEEK_MODEL", global = true)]
    deepseek_model: Option<String>,
    /// Ollama endpoint with the model as path, e.g. http://localhost:11434/gemma3:12b
    #[arg(long, env = "OLLAMA_URL", global = true)]
    ollama_url: Option<String>,
    /// Classification providers in priority order. Available: gemini, openai, deepseek, ollama, dummy
    #[arg(long, env = "NT_PROVIDERS", value_delimiter = ',', default_value = "gemini,deepseek", global = true)]
    providers: Vec<String>,

    #[arg(long, env = "NT_DAILY_LIMIT", default_value_t = 50, global = true)]
    daily_limit: u32,
    /// Offset of the quota day, e.g. +02:00
    #[arg(long, env = "NT_UTC_OFFSET", default_value = "UTC", value_parser = parse_offset, global = true)]
    utc_offset: chrono::FixedOffset,

    #[arg(long, default_value_t = 3, global = true)]
    search_attempts: u32,
    /// Base delay of the linear search backoff (e.g. 500ms, 1s)
    #[arg(long, default_value = "1s", global = true)]
    search_backoff: HumanDuration,
    #[arg(long, default_value = "15s", global = true)]
    search_timeout: HumanDuration,
    /// abort or degrade when a search query fails for good
    #[arg(long, default_value = "abort", global = true)]
    partial_failure: PartialFailurePolicy,

    #[arg(long, default_value_t = 5, global = true)]
    batch_size: usize,
    #[arg(long, default_value = "1s", global = true)]
    batch_delay: HumanDuration,
    #[arg(long, default_value = "30s", global = true)]
    provider_timeout: HumanDuration,

    #[arg(long, default_value = "1h", global = true)]
    cache_ttl: HumanDuration,
    #[arg(long, default_value_t = 256, global = true)]
    cache_capacity: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search an entity and classify what the web says about it
    Analyze {
        entity: String,
        /// Country code used to restrict the search, e.g. us
        #[arg(long)]
        country: Option<String>,
        /// Provider to try first
        #[arg(long)]
        provider: Option<String>,
        #[arg(long, default_value = "cli")]
        user: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "NT_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
    /// Show today's usage for a user
    Usage { user: String },
}

impl Cli {
    fn search_config(&self) -> SearchConfig {
        SearchConfig {
            max_attempts: self.search_attempts,
            base_delay: self.search_backoff.0,
            request_timeout: self.search_timeout.0,
            partial_failure: self.partial_failure,
            ..SearchConfig::default()
        }
    }

    fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            gemini_api_key: self.gemini_api_key.clone(),
            gemini_model: self.gemini_model.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            deepseek_api_key: self.deepseek_api_key.clone(),
            deepseek_model: self.deepseek_model.clone(),
            ollama_url: self.ollama_url.clone(),
            request_timeout: self.provider_timeout.0,
        }
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            daily_limit: self.daily_limit,
            cache_ttl: self.cache_ttl.0,
            cache_capacity: self.cache_capacity,
            utc_offset: self.utc_offset,
        }
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("{} is required", name)))
}

fn build_pipeline(cli: &Cli, storage: Arc<dyn Persistence>) -> Result<SentimentPipeline> {
    let search_config = cli.search_config();
    let google = GoogleSearchProvider::new(
        required(&cli.google_api_key, "GOOGLE_API_KEY")?,
        required(&cli.google_cse_id, "GOOGLE_CSE_ID")?,
        &search_config,
    )?;
    let gateway = SearchGateway::new(Arc::new(google), &search_config);

    let order = cli
        .providers
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| ProviderKind::from_str(p))
        .collect::<Result<Vec<_>>>()?;
    let registry = create_registry(&order, &cli.inference_config())?;
    info!("🧠 Classification providers: {}", registry.names().join(", "));

    let orchestrator = ClassificationOrchestrator::new(OrchestratorConfig {
        batch_size: cli.batch_size,
        inter_batch_delay: cli.batch_delay.0,
        item_timeout: cli.provider_timeout.0,
    });

    Ok(SentimentPipeline::new(
        gateway,
        registry,
        orchestrator,
        storage,
        Arc::new(SystemClock),
        &cli.pipeline_config(),
    ))
}

fn print_quota(status: &QuotaStatus) {
    println!(
        "Usage: {}/{} calls today ({}), resets at {}",
        status.current,
        status.limit,
        if status.allowed { "available" } else { "exhausted" },
        status.reset_at.to_rfc3339()
    );
}

fn print_report(report: &AnalysisReport) {
    let summary = &report.summary;
    println!("{}", report.entity_name);
    println!(
        "Overall: {} ({} articles: {}% positive, {}% negative, {}% neutral)",
        summary.overall_sentiment, summary.total, summary.positive_pct, summary.negative_pct, summary.neutral_pct
    );
    for article in &report.articles {
        println!();
        println!("[{}] {}", article.sentiment, article.result.title);
        println!("    {}", article.link());
        println!("    {}", article.reasoning);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let storage = nt_storage::create_storage(&cli.storage, cli.database.as_deref()).await?;
    info!("💾 Storage initialized (using {})", cli.storage);

    match &cli.command {
        Commands::Analyze {
            entity,
            country,
            provider,
            user,
            json,
        } => {
            let pipeline = build_pipeline(&cli, storage)?;
            let request = AnalyzeRequest {
                entity_name: entity.clone(),
                country_filter: country.clone(),
                provider_preference: provider.clone(),
            };

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling");
                    trigger.cancel();
                }
            });

            match pipeline.analyze(user, &request, &cancel).await? {
                AnalysisOutcome::Completed(report) if *json => println!("{}", serde_json::to_string_pretty(&report)?),
                AnalysisOutcome::Completed(report) => print_report(&report),
                AnalysisOutcome::RateLimited(status) if *json => println!("{}", serde_json::to_string_pretty(&status)?),
                AnalysisOutcome::RateLimited(status) => {
                    println!("Daily limit reached.");
                    print_quota(&status);
                }
            }
        }
        Commands::Serve { addr } => {
            let pipeline = build_pipeline(&cli, storage)?;
            nt_web::serve(nt_web::AppState::new(Arc::new(pipeline)), *addr).await?;
        }
        Commands::Usage { user } => {
            let ledger = UsageLedger::new(storage, Arc::new(SystemClock), cli.daily_limit, cli.utc_offset);
            print_quota(&ledger.peek(user).await?);
        }
    }

    Ok(())
}
