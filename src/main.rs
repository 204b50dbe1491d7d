//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run
//! the two-phase pipeline. No business logic here.

use board_watch::adapters::ai::{AnthropicAdapter, MockGenerationAdapter, OpenAiAdapter};
use board_watch::adapters::persistence::{
    DisabledStore, FsDocumentStore, JsonExtractCache, SqliteStore,
};
use board_watch::domain::DocumentKind;
use board_watch::ports::{DocumentStore, ExtractCachePort, GenerationPort, PersistencePort};
use board_watch::shared::config::{AppConfig, Provider};
use board_watch::shared::prompts;
use board_watch::usecases::{
    ConsolidationService, ExtractionOptions, ExtractionService, GatewayStep, HistoryBuilder,
    LlmGateway,
};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    if let Ok(path) = &env_loaded {
        info!(path = %path.display(), "loaded .env");
    }

    let cfg = AppConfig::load().unwrap_or_default();
    let data_dir = PathBuf::from(cfg.data_dir_or_default());
    info!(path = %data_dir.display(), "data directory");

    let cache: Arc<dyn ExtractCachePort> =
        Arc::new(JsonExtractCache::new(data_dir.join("extracts")));
    if cfg.clear_cache() {
        cache
            .clear_all()
            .await
            .map_err(|e| anyhow::anyhow!("clear cache: {}", e))?;
    }

    // --- Documents ---
    let docs = FsDocumentStore::new(&data_dir);
    let lookback = Some(cfg.lookback_days_or_default());
    let transcripts = docs
        .list(DocumentKind::Transcript, lookback)
        .await
        .map_err(|e| anyhow::anyhow!("load transcripts: {}", e))?;
    let agendas = docs
        .list(DocumentKind::Agenda, lookback)
        .await
        .map_err(|e| anyhow::anyhow!("load agendas: {}", e))?;
    let minutes = docs
        .list(DocumentKind::Minutes, lookback)
        .await
        .map_err(|e| anyhow::anyhow!("load minutes: {}", e))?;
    // Budget documents are reference material for every run; no window.
    let budget_docs = docs
        .list(DocumentKind::Budget, None)
        .await
        .map_err(|e| anyhow::anyhow!("load budget docs: {}", e))?;

    if transcripts.is_empty() && minutes.is_empty() {
        anyhow::bail!(
            "no transcripts or minutes found under {} (last {} days)",
            data_dir.display(),
            cfg.lookback_days_or_default()
        );
    }
    info!(
        transcripts = transcripts.len(),
        agendas = agendas.len(),
        minutes = minutes.len(),
        budget_docs = budget_docs.len(),
        "documents loaded"
    );

    // --- Persistence ---
    let store: Arc<dyn PersistencePort> = match &cfg.db_path {
        Some(path) => Arc::new(
            SqliteStore::connect(path)
                .await
                .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
        ),
        None => {
            info!("BOARD_WATCH_DB_PATH not set, persistence disabled");
            Arc::new(DisabledStore)
        }
    };

    // --- Gateway ---
    let gateway = Arc::new(build_gateway(&cfg));

    // --- Prompts ---
    let context = prompts::load_context(cfg.context_file.as_deref());
    let extract_system = prompts::with_context(
        &context,
        &prompts::load_prompt(cfg.extract_prompt_file.as_deref(), prompts::EXTRACT_PROMPT),
    );
    let newsletter_system = prompts::with_context(
        &context,
        &prompts::load_prompt(
            cfg.newsletter_prompt_file.as_deref(),
            prompts::NEWSLETTER_PROMPT,
        ),
    );

    // --- Phase 1 ---
    let extraction = ExtractionService::new(
        Arc::clone(&gateway),
        Arc::clone(&cache),
        Arc::clone(&store),
        ExtractionOptions {
            prefer_cache: cfg.retry_failed(),
            pacing: cfg.extract_delay(),
            system_prompt: extract_system,
            max_tokens: 8000,
            votes_dir: Some(data_dir.join("votes")),
        },
    );
    let batch = if cfg.digest_only() {
        info!("digest-only run: rebuilding from cache");
        extraction
            .from_cache(&transcripts, &minutes)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        extraction
            .run(&transcripts, &agendas, &minutes)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?
    };

    // --- Historical context ---
    let historical = HistoryBuilder::new(Arc::clone(&store))
        .build()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    // --- Phase 2 ---
    let consolidation = ConsolidationService::new(
        gateway,
        store,
        data_dir.join("drafts"),
        newsletter_system,
        cfg.digest_delay(),
        8000,
    );
    let digest = consolidation
        .run(&batch, &budget_docs, historical.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("\n{}\n\n{}", digest.title, digest.markdown);
    Ok(())
}

/// Build the retry/fallback chain from configuration. When the primary
/// provider has no API key, a mock adapter stands in so the pipeline stays
/// runnable end to end without credentials.
fn build_gateway(cfg: &AppConfig) -> LlmGateway {
    let anthropic: Option<Arc<dyn GenerationPort>> = cfg
        .anthropic_api_key()
        .map(|key| Arc::new(AnthropicAdapter::new(key)) as Arc<dyn GenerationPort>);
    let openai: Option<Arc<dyn GenerationPort>> = cfg
        .openai_api_key()
        .map(|key| Arc::new(OpenAiAdapter::new(key)) as Arc<dyn GenerationPort>);

    let mut steps = Vec::new();
    for (provider, model) in cfg.fallback_chain() {
        let port = match provider {
            Provider::Anthropic => anthropic.clone(),
            Provider::OpenAi => openai.clone(),
        };
        if let Some(port) = port {
            steps.push(GatewayStep::new(
                format!("{}/{}", provider.as_str(), model),
                model,
                port,
            ));
        }
    }

    if steps.is_empty() {
        warn!("no provider API key set, using mock generation adapter");
        steps.push(GatewayStep::new(
            "mock/mock-model",
            "mock-model",
            Arc::new(MockGenerationAdapter::new()) as Arc<dyn GenerationPort>,
        ));
    }

    LlmGateway::new(steps, cfg.max_retries_or_default(), cfg.backoff_or_default())
}
