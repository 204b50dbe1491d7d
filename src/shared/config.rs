//! Application configuration. Provider credentials, paths, pacing knobs.

use serde::Deserialize;
use std::time::Duration;

/// Seconds between extraction calls, per provider.
pub const ANTHROPIC_EXTRACT_DELAY_SECS: u64 = 30;
pub const OPENAI_EXTRACT_DELAY_SECS: u64 = 60;
/// Seconds before the consolidation call, per provider. Longer than the
/// extraction delay because the Phase 1 burst precedes it.
pub const ANTHROPIC_DIGEST_DELAY_SECS: u64 = 120;
pub const OPENAI_DIGEST_DELAY_SECS: u64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Root of the document collections. Read from BOARD_WATCH_DATA_DIR.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// SQLite database path. Persistence is disabled when unset.
    /// Read from BOARD_WATCH_DB_PATH.
    #[serde(default)]
    pub db_path: Option<String>,

    /// Primary provider: "anthropic" (default) or "openai".
    /// Read from BOARD_WATCH_PROVIDER.
    #[serde(default)]
    pub provider: Option<String>,

    /// Model override for the primary provider. Read from BOARD_WATCH_MODEL.
    #[serde(default)]
    pub model: Option<String>,

    /// Document lookback window in days (default 14).
    /// Read from BOARD_WATCH_LOOKBACK_DAYS.
    #[serde(default)]
    pub lookback_days: Option<i64>,

    /// Retries per gateway step (default 3). Read from BOARD_WATCH_MAX_RETRIES.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Base backoff in seconds, doubled per retry (default 30).
    /// Read from BOARD_WATCH_BACKOFF_BASE_SECS.
    #[serde(default)]
    pub backoff_base_secs: Option<u64>,

    /// Override for the delay between Phase 1 calls.
    /// Read from BOARD_WATCH_EXTRACT_DELAY_SECS.
    #[serde(default)]
    pub extract_delay_secs: Option<u64>,

    /// Override for the delay before the Phase 2 call.
    /// Read from BOARD_WATCH_DIGEST_DELAY_SECS.
    #[serde(default)]
    pub digest_delay_secs: Option<u64>,

    /// Reuse cached extracts and only re-call the model for uncached
    /// documents. Read from BOARD_WATCH_RETRY_FAILED.
    #[serde(default)]
    pub retry_failed: Option<bool>,

    /// Rebuild the newsletter from cache only, no extraction calls.
    /// Read from BOARD_WATCH_DIGEST_ONLY.
    #[serde(default)]
    pub digest_only: Option<bool>,

    /// Drop every cache entry before running. Read from BOARD_WATCH_CLEAR_CACHE.
    #[serde(default)]
    pub clear_cache: Option<bool>,

    /// Optional project-context file prepended to both system prompts.
    /// Read from BOARD_WATCH_CONTEXT_FILE.
    #[serde(default)]
    pub context_file: Option<String>,

    /// Optional file replacing the built-in extraction prompt.
    /// Read from BOARD_WATCH_EXTRACT_PROMPT_FILE.
    #[serde(default)]
    pub extract_prompt_file: Option<String>,

    /// Optional file replacing the built-in newsletter prompt.
    /// Read from BOARD_WATCH_NEWSLETTER_PROMPT_FILE.
    #[serde(default)]
    pub newsletter_prompt_file: Option<String>,

    anthropic_api_key: Option<String>,
    openai_api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        // try_parsing so numeric and boolean variables deserialize into the
        // typed Option fields instead of failing as strings.
        c = c.add_source(config::Environment::with_prefix("BOARD_WATCH").try_parsing(true));
        if let Ok(path) = std::env::var("BOARD_WATCH_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // Provider keys are read unprefixed: the conventional variable names
        // ANTHROPIC_API_KEY / OPENAI_API_KEY work as-is in .env.
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            cfg.anthropic_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            cfg.openai_api_key = Some(key);
        }
        Ok(cfg)
    }

    pub fn data_dir_or_default(&self) -> String {
        self.data_dir.clone().unwrap_or_else(|| "data".to_string())
    }

    pub fn lookback_days_or_default(&self) -> i64 {
        self.lookback_days.unwrap_or(14)
    }

    pub fn max_retries_or_default(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn backoff_or_default(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs.unwrap_or(30))
    }

    pub fn retry_failed(&self) -> bool {
        self.retry_failed.unwrap_or(false)
    }

    pub fn digest_only(&self) -> bool {
        self.digest_only.unwrap_or(false)
    }

    pub fn clear_cache(&self) -> bool {
        self.clear_cache.unwrap_or(false)
    }

    pub fn anthropic_api_key(&self) -> Option<String> {
        self.anthropic_api_key.clone()
    }

    pub fn openai_api_key(&self) -> Option<String> {
        self.openai_api_key.clone()
    }

    /// Returns true if the persistence backend is configured (db path set).
    pub fn is_persistence_configured(&self) -> bool {
        self.db_path.is_some()
    }

    pub fn provider_or_default(&self) -> Provider {
        match self.provider.as_deref().map(str::to_lowercase).as_deref() {
            Some("openai") => Provider::OpenAi,
            _ => Provider::Anthropic,
        }
    }

    pub fn model_or_default(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider_or_default() {
            Provider::Anthropic => "claude-sonnet-4-5".to_string(),
            Provider::OpenAi => "gpt-4o".to_string(),
        }
    }

    /// Delay between extraction calls: explicit override, or the primary
    /// provider's default.
    pub fn extract_delay(&self) -> Duration {
        let secs = self.extract_delay_secs.unwrap_or(match self.provider_or_default() {
            Provider::Anthropic => ANTHROPIC_EXTRACT_DELAY_SECS,
            Provider::OpenAi => OPENAI_EXTRACT_DELAY_SECS,
        });
        Duration::from_secs(secs)
    }

    /// Delay before the consolidation call: explicit override, or the
    /// primary provider's default.
    pub fn digest_delay(&self) -> Duration {
        let secs = self.digest_delay_secs.unwrap_or(match self.provider_or_default() {
            Provider::Anthropic => ANTHROPIC_DIGEST_DELAY_SECS,
            Provider::OpenAi => OPENAI_DIGEST_DELAY_SECS,
        });
        Duration::from_secs(secs)
    }

    /// Ordered (provider, model) fallback chain, primary first. The
    /// anthropic chain degrades to a cheaper claude model, then crosses to
    /// OpenAI when a key for it exists; the openai chain has no fallback.
    pub fn fallback_chain(&self) -> Vec<(Provider, String)> {
        let mut chain = vec![(self.provider_or_default(), self.model_or_default())];
        if self.provider_or_default() == Provider::Anthropic {
            chain.push((Provider::Anthropic, "claude-haiku-4-5".to_string()));
            if self.openai_api_key().is_some() {
                chain.push((Provider::OpenAi, "gpt-4o".to_string()));
            }
        }
        chain
    }
}
