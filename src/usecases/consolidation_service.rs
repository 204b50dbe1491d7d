//! Phase 2: consolidate the week's extracts into one newsletter.
//!
//! Builds a single prompt from budget context, historical aggregates, the
//! structured vote and spending records, and the per-meeting notes, then
//! makes exactly one gateway call. Unlike Phase 1 there is no skip-and-
//! continue: if this call fails, the run fails.

use crate::domain::{Digest, Document, DomainError, SpendingRecord, VoteRecord};
use crate::ports::PersistencePort;
use crate::usecases::extraction_service::ExtractionBatch;
use crate::usecases::gateway::LlmGateway;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Character budget for each budget document in the prompt.
const BUDGET_DOC_BUDGET: usize = 10_000;

pub struct ConsolidationService {
    gateway: Arc<LlmGateway>,
    store: Arc<dyn PersistencePort>,
    drafts_dir: PathBuf,
    system_prompt: String,
    /// Delay before the consolidation call when Phase 1 made several calls
    /// just beforehand.
    pacing: Duration,
    max_tokens: u32,
}

impl ConsolidationService {
    pub fn new(
        gateway: Arc<LlmGateway>,
        store: Arc<dyn PersistencePort>,
        drafts_dir: PathBuf,
        system_prompt: String,
        pacing: Duration,
        max_tokens: u32,
    ) -> Self {
        Self {
            gateway,
            store,
            drafts_dir,
            system_prompt,
            pacing,
            max_tokens,
        }
    }

    pub async fn run(
        &self,
        batch: &ExtractionBatch,
        budget_docs: &[Document],
        historical: Option<&str>,
    ) -> Result<Digest, DomainError> {
        // Pace only when Phase 1 actually spent rate budget just before us;
        // a cache-only rebuild made no calls and can proceed immediately.
        if batch.gateway_calls > 0 && batch.extracts.len() > 1 && !self.pacing.is_zero() {
            info!(delay_secs = self.pacing.as_secs(), "pacing before consolidation call");
            tokio::time::sleep(self.pacing).await;
        }

        let prompt = build_newsletter_prompt(batch, budget_docs, historical);
        let markdown = self
            .gateway
            .call(&self.system_prompt, &prompt, self.max_tokens)
            .await?;

        let week_of = week_of(batch);
        let digest = Digest {
            title: format!("Board Watch Weekly: Week of {}", week_of.format("%B %-d, %Y")),
            markdown,
            sources: batch.extracts.iter().map(|e| e.source.clone()).collect(),
            generated_at: Utc::now(),
        };

        self.write_draft(&digest).await;
        if self.store.is_enabled() {
            if let Err(err) = self
                .store
                .upsert_digest(&digest, week_of, &batch.meeting_ids)
                .await
            {
                warn!(%err, "failed to persist newsletter");
            }
        }

        info!(title = %digest.title, sources = digest.sources.len(), "consolidation complete");
        Ok(digest)
    }

    async fn write_draft(&self, digest: &Digest) {
        let path = self.drafts_dir.join(format!(
            "analysis_{}_weekly_digest.md",
            digest.generated_at.format("%Y%m%d_%H%M%S")
        ));
        let content = format!(
            "<!-- Generated: {} -->\n<!-- Sources: {} -->\n\n{}",
            digest.generated_at.to_rfc3339(),
            digest.sources.join(", "),
            digest.markdown
        );
        let result = async {
            tokio::fs::create_dir_all(&self.drafts_dir).await?;
            tokio::fs::write(&path, content).await
        }
        .await;
        match result {
            Ok(()) => info!(path = %path.display(), "wrote newsletter draft"),
            Err(err) => warn!(path = %path.display(), %err, "failed to write draft"),
        }
    }
}

/// Earliest dated source in the batch, falling back to today.
fn week_of(batch: &ExtractionBatch) -> NaiveDate {
    batch
        .extracts
        .iter()
        .filter_map(|e| crate::domain::date_prefix(&e.source))
        .filter_map(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok())
        .min()
        .unwrap_or_else(|| Utc::now().date_naive())
}

fn build_newsletter_prompt(
    batch: &ExtractionBatch,
    budget_docs: &[Document],
    historical: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if !budget_docs.is_empty() {
        prompt.push_str("## Budget Context\n");
        for doc in budget_docs {
            prompt.push_str(&format!("\n### {}\n", doc.filename));
            prompt.push_str(truncate_chars(&doc.content, BUDGET_DOC_BUDGET));
            if doc.content.chars().count() > BUDGET_DOC_BUDGET {
                prompt.push_str("\n[Budget document truncated]\n");
            }
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    if let Some(historical) = historical {
        prompt.push_str(historical);
        prompt.push('\n');
    }

    if !batch.votes.is_empty() {
        prompt.push_str(&format_votes_section(&batch.votes));
        prompt.push('\n');
    }
    if !batch.spending.is_empty() {
        prompt.push_str(&format_spending_section(&batch.spending));
        prompt.push('\n');
    }

    prompt.push_str("## This Week's Meeting Notes\n");
    for extract in &batch.extracts {
        prompt.push_str(&format!("\n### {}\n{}\n", extract.source, extract.notes));
    }
    prompt.push_str("\nGenerate the newsletter now based on the meeting notes above.\n");
    prompt
}

/// Votes section: non-unanimous votes get full detail, unanimous votes are
/// listed compactly since their names carry no signal.
fn format_votes_section(votes: &[VoteRecord]) -> String {
    let mut out = String::from("## Votes Taken This Week\n");

    let split: Vec<&VoteRecord> = votes.iter().filter(|v| !v.unanimous).collect();
    let unanimous: Vec<&VoteRecord> = votes.iter().filter(|v| v.unanimous).collect();

    if !split.is_empty() {
        out.push_str("\n### Split Votes\n");
        for vote in split {
            out.push_str(&format!("- **{}** ({}): {}\n", vote.motion, vote.meeting, vote.result));
            if !vote.no.is_empty() {
                out.push_str(&format!("  - Opposed: {}\n", vote.no.join(", ")));
            }
            if !vote.abstain.is_empty() {
                out.push_str(&format!("  - Abstained: {}\n", vote.abstain.join(", ")));
            }
            if !vote.context.is_empty() {
                out.push_str(&format!("  - Context: {}\n", vote.context));
            }
        }
    }

    if !unanimous.is_empty() {
        out.push_str(&format!("\n### Unanimous Votes ({} total)\n", unanimous.len()));
        for vote in unanimous {
            out.push_str(&format!("- {} ({})\n", vote.motion, vote.result));
        }
    }
    out
}

/// Spending section, largest amount first.
fn format_spending_section(spending: &[SpendingRecord]) -> String {
    let mut sorted: Vec<&SpendingRecord> = spending.iter().collect();
    sorted.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = String::from("## Spending Identified This Week\n");
    for item in sorted {
        out.push_str(&format!(
            "- {} to {} ({}): {}",
            format_usd(item.amount),
            item.vendor,
            item.category.as_str(),
            item.description
        ));
        if let Some(project) = &item.project {
            out.push_str(&format!(" [project: {}]", project));
        }
        out.push('\n');
    }
    out
}

/// Dollar formatting with thousands separators, cents kept only when present.
pub(crate) fn format_usd(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = cents / 100;
    let frac = (cents % 100).abs();

    let mut digits = whole.abs().to_string();
    let mut grouped = String::new();
    while digits.len() > 3 {
        let split = digits.len() - 3;
        grouped = format!(",{}{}", &digits[split..], grouped);
        digits.truncate(split);
    }
    grouped = format!("{}{}", digits, grouped);

    let sign = if whole < 0 { "-" } else { "" };
    if frac == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{frac:02}")
    }
}

fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
