//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Digest, DissentFact, Document, DocumentKind, DomainError, ExtractionRecord, GenerationError,
    MeetingRecord, Official, SpendingFact, SpendingRecord, VoteRecord,
};
use chrono::NaiveDate;

/// Document loader. Supplies dated text documents from a collection.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents of one kind, ordered lexicographically by filename
    /// (date-prefixed, so chronological). When `lookback_days` is given,
    /// documents older than the window are dropped; documents without a
    /// valid date prefix are included unfiltered.
    async fn list(
        &self,
        kind: DocumentKind,
        lookback_days: Option<i64>,
    ) -> Result<Vec<Document>, DomainError>;
}

/// One text-generation provider. The gateway composes several of these into
/// a retry/fallback chain; adapters classify their own failures as transient
/// or permanent.
#[async_trait::async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// Extraction cache. A performance/resilience optimization, never a
/// correctness requirement: `load` and `save` degrade instead of failing.
#[async_trait::async_trait]
pub trait ExtractCachePort: Send + Sync {
    /// Load the cached extraction for a source filename. Missing or corrupt
    /// entries both come back as `None` (corruption is logged).
    async fn load(&self, source: &str) -> Option<ExtractionRecord>;

    /// Persist an extraction. Failures are logged and swallowed; the
    /// pipeline proceeds even if every save fails.
    async fn save(&self, record: &ExtractionRecord);

    /// Drop every cache entry (explicit invalidation; entries never expire
    /// on their own).
    async fn clear_all(&self) -> Result<(), DomainError>;
}

/// Persistence backend for meetings, votes, spending, and officials.
///
/// When unconfigured, every write is a no-op returning the disabled sentinel
/// (`None` / `0`) and every query returns empty, so callers check
/// `is_enabled()` once and never catch errors to discover availability.
#[async_trait::async_trait]
pub trait PersistencePort: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Insert or update a meeting keyed by (date, body). Returns the row id,
    /// or `None` when disabled.
    async fn upsert_meeting(&self, meeting: &MeetingRecord) -> Result<Option<i64>, DomainError>;

    /// Replace all votes for a meeting (delete old rows, insert new ones).
    /// Returns the number of rows written.
    async fn replace_votes(
        &self,
        meeting_id: i64,
        votes: &[VoteRecord],
    ) -> Result<usize, DomainError>;

    /// Replace all spending items for a meeting, tagged with a fiscal year.
    async fn replace_spending(
        &self,
        meeting_id: i64,
        items: &[SpendingRecord],
        fiscal_year: i32,
    ) -> Result<usize, DomainError>;

    async fn upsert_official(&self, official: &Official) -> Result<(), DomainError>;

    /// Insert or update the digest row keyed by week-of date.
    async fn upsert_digest(
        &self,
        digest: &Digest,
        week_of: NaiveDate,
        meeting_ids: &[i64],
    ) -> Result<Option<i64>, DomainError>;

    /// Spending rows within the lookback window, for vendor/project totals.
    async fn recent_spending(&self, lookback_days: i64)
        -> Result<Vec<SpendingFact>, DomainError>;

    /// Non-unanimous votes within the lookback window, for dissent totals.
    async fn recent_dissent(&self, lookback_days: i64) -> Result<Vec<DissentFact>, DomainError>;
}
