//! Phase 1: per-document extraction.
//!
//! For each transcript (and each standalone minutes document with no
//! transcript covering the same date), build a prompt from the document plus
//! any same-date agendas and minutes, call the generation gateway, parse the
//! fenced vote/spending logs out of the response, cache the result, and
//! persist it. A failed document is logged and skipped; the batch fails only
//! when nothing at all was extracted.

use crate::adapters::ai::{parse_spending, parse_votes};
use crate::domain::{
    date_prefix, Document, DomainError, ExtractionRecord, MeetingRecord, Official, SourceName,
    SpendingRecord, VoteRecord,
};
use crate::ports::{ExtractCachePort, PersistencePort};
use crate::usecases::gateway::LlmGateway;
use chrono::{Datelike, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Character budget for the document being extracted.
const PRIMARY_BUDGET: usize = 50_000;
/// Character budget for each supporting agenda/minutes document.
const AUX_BUDGET: usize = 15_000;

pub struct ExtractionOptions {
    /// Reuse cached extracts instead of re-calling the model.
    pub prefer_cache: bool,
    /// Delay before each gateway call after the first.
    pub pacing: Duration,
    pub system_prompt: String,
    pub max_tokens: u32,
    /// When set, a JSON snapshot of all extracted votes is written here.
    pub votes_dir: Option<PathBuf>,
}

/// Notes for one meeting, carried into Phase 2.
#[derive(Debug, Clone)]
pub struct MeetingExtract {
    pub source: String,
    pub notes: String,
}

/// Everything Phase 1 produced across the batch.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub extracts: Vec<MeetingExtract>,
    pub votes: Vec<VoteRecord>,
    pub spending: Vec<SpendingRecord>,
    pub meeting_ids: Vec<i64>,
    pub gateway_calls: usize,
}

pub struct ExtractionService {
    gateway: Arc<LlmGateway>,
    cache: Arc<dyn ExtractCachePort>,
    store: Arc<dyn PersistencePort>,
    opts: ExtractionOptions,
}

impl ExtractionService {
    pub fn new(
        gateway: Arc<LlmGateway>,
        cache: Arc<dyn ExtractCachePort>,
        store: Arc<dyn PersistencePort>,
        opts: ExtractionOptions,
    ) -> Self {
        Self {
            gateway,
            cache,
            store,
            opts,
        }
    }

    /// Run Phase 1 over the loaded documents. Transcripts are primary;
    /// minutes without a same-date transcript are extracted standalone.
    pub async fn run(
        &self,
        transcripts: &[Document],
        agendas: &[Document],
        minutes: &[Document],
    ) -> Result<ExtractionBatch, DomainError> {
        let mut batch = ExtractionBatch::default();

        for doc in transcripts {
            let prompt = build_extract_prompt(doc, agendas, minutes);
            self.process_document(doc, prompt, &mut batch).await;
        }

        for doc in standalone_minutes(transcripts, minutes) {
            info!(source = %doc.filename, "extracting standalone minutes");
            let prompt = build_minutes_prompt(doc, agendas);
            self.process_document(doc, prompt, &mut batch).await;
        }

        if batch.extracts.is_empty() {
            return Err(DomainError::Pipeline(
                "no documents were successfully extracted".to_string(),
            ));
        }

        self.write_vote_snapshot(&batch.votes).await;
        info!(
            extracts = batch.extracts.len(),
            votes = batch.votes.len(),
            spending = batch.spending.len(),
            gateway_calls = batch.gateway_calls,
            "extraction phase complete"
        );
        Ok(batch)
    }

    /// Rebuild a batch purely from cache, for digest-only runs. No gateway
    /// calls, no persistence writes. Covers the same document set `run`
    /// would: transcripts plus standalone minutes.
    pub async fn from_cache(
        &self,
        transcripts: &[Document],
        minutes: &[Document],
    ) -> Result<ExtractionBatch, DomainError> {
        let mut batch = ExtractionBatch::default();
        let primaries = transcripts
            .iter()
            .chain(standalone_minutes(transcripts, minutes));
        for doc in primaries {
            match self.cache.load(&doc.filename).await {
                Some(record) => self.collect(record, &mut batch),
                None => warn!(source = %doc.filename, "no cached extract, skipping"),
            }
        }
        if batch.extracts.is_empty() {
            return Err(DomainError::Pipeline(
                "no cached extracts available for digest-only run".to_string(),
            ));
        }
        self.write_vote_snapshot(&batch.votes).await;
        Ok(batch)
    }

    async fn process_document(&self, doc: &Document, prompt: String, batch: &mut ExtractionBatch) {
        if self.opts.prefer_cache {
            if let Some(record) = self.cache.load(&doc.filename).await {
                self.collect(record, batch);
                return;
            }
        }

        if batch.gateway_calls > 0 && !self.opts.pacing.is_zero() {
            info!(delay_secs = self.opts.pacing.as_secs(), "pacing before next call");
            tokio::time::sleep(self.opts.pacing).await;
        }

        batch.gateway_calls += 1;
        let output = match self
            .gateway
            .call(&self.opts.system_prompt, &prompt, self.opts.max_tokens)
            .await
        {
            Ok(output) => output,
            Err(err) => {
                error!(source = %doc.filename, %err, "extraction failed, skipping document");
                return;
            }
        };

        let votes = parse_votes(&output, &doc.filename);
        let spending = parse_spending(&output, &doc.filename);
        let record = ExtractionRecord::new(doc.filename.clone(), output, votes, spending);
        self.cache.save(&record).await;

        if let Some(id) = self.persist_extract(doc, &record).await {
            batch.meeting_ids.push(id);
        }
        self.collect(record, batch);
    }

    fn collect(&self, record: ExtractionRecord, batch: &mut ExtractionBatch) {
        batch.votes.extend(record.votes);
        batch.spending.extend(record.spending);
        batch.extracts.push(MeetingExtract {
            source: record.source,
            notes: record.notes,
        });
    }

    /// Persist one extract: meeting row, votes, spending, officials. Any
    /// failure here is logged and swallowed; persistence problems must not
    /// cost us a completed (and paid-for) extraction.
    async fn persist_extract(&self, doc: &Document, record: &ExtractionRecord) -> Option<i64> {
        if !self.store.is_enabled() {
            return None;
        }
        let name = SourceName::parse(&doc.filename);
        let Some(date) = name.date else {
            warn!(source = %doc.filename, "no date prefix, skipping persistence");
            return None;
        };

        let meeting = MeetingRecord {
            date,
            body: name.body.clone(),
            source_filename: doc.filename.clone(),
            source_type: doc.kind,
            source_url: source_url_header(&doc.content),
            extract_text: record.notes.clone(),
        };

        let meeting_id = match self.store.upsert_meeting(&meeting).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(err) => {
                warn!(source = %doc.filename, %err, "failed to persist meeting");
                return None;
            }
        };

        if let Err(err) = self.store.replace_votes(meeting_id, &record.votes).await {
            warn!(meeting_id, %err, "failed to persist votes");
        }
        if let Err(err) = self
            .store
            .replace_spending(meeting_id, &record.spending, date.year())
            .await
        {
            warn!(meeting_id, %err, "failed to persist spending");
        }
        for official in officials_from_votes(&record.votes, &name.body) {
            if let Err(err) = self.store.upsert_official(&official).await {
                warn!(name = %official.name, %err, "failed to persist official");
            }
        }

        Some(meeting_id)
    }

    async fn write_vote_snapshot(&self, votes: &[VoteRecord]) {
        let Some(dir) = &self.opts.votes_dir else {
            return;
        };
        if votes.is_empty() {
            return;
        }
        // Date plus time, so reruns within one day keep distinct snapshots.
        let path = dir.join(format!(
            "votes_{}.json",
            Utc::now().format("%Y-%m-%d_%H%M%S")
        ));
        let json = match serde_json::to_string_pretty(votes) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, "failed to serialize vote snapshot");
                return;
            }
        };
        if let Err(err) = write_snapshot(dir, &path, &json).await {
            warn!(path = %path.display(), %err, "failed to write vote snapshot");
        } else {
            info!(path = %path.display(), count = votes.len(), "wrote vote snapshot");
        }
    }
}

async fn write_snapshot(
    dir: &std::path::Path,
    path: &std::path::Path,
    json: &str,
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let temp = path.with_extension("json.tmp");
    let mut f = tokio::fs::File::create(&temp).await?;
    f.write_all(json.as_bytes()).await?;
    f.sync_all().await?;
    drop(f);
    tokio::fs::rename(&temp, path).await
}

/// A `URL:` header near the top of a document records where the artifact was
/// originally fetched from. Only the first ten lines are scanned so a URL
/// mentioned mid-transcript is never mistaken for provenance.
fn source_url_header(content: &str) -> Option<String> {
    content
        .lines()
        .take(10)
        .find_map(|line| line.strip_prefix("URL:"))
        .map(|rest| rest.trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Minutes whose date prefix is not covered by any transcript. Comparison is
/// case-insensitive on the whole prefix (dates are digits, but be safe).
fn standalone_minutes<'a>(
    transcripts: &[Document],
    minutes: &'a [Document],
) -> Vec<&'a Document> {
    let covered: BTreeSet<String> = transcripts
        .iter()
        .filter_map(|t| date_prefix(&t.filename))
        .map(|p| p.to_lowercase())
        .collect();

    minutes
        .iter()
        .filter(|m| match date_prefix(&m.filename) {
            Some(prefix) => !covered.contains(&prefix.to_lowercase()),
            None => true,
        })
        .collect()
}

/// Supporting documents sharing the primary document's date prefix.
fn matching_by_date<'a>(primary: &Document, pool: &'a [Document]) -> Vec<&'a Document> {
    let Some(prefix) = date_prefix(&primary.filename) else {
        return Vec::new();
    };
    pool.iter()
        .filter(|d| date_prefix(&d.filename) == Some(prefix))
        .collect()
}

/// Char-boundary-safe prefix of at most `budget` characters.
fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn push_section(prompt: &mut String, header: &str, docs: &[&Document], marker: &str) {
    if docs.is_empty() {
        return;
    }
    prompt.push_str(header);
    prompt.push('\n');
    for doc in docs {
        prompt.push_str(&format!("\n### {}\n", doc.filename));
        prompt.push_str(truncate_chars(&doc.content, AUX_BUDGET));
        if doc.content.chars().count() > AUX_BUDGET {
            prompt.push_str(&format!("\n{marker}\n"));
        }
        prompt.push('\n');
    }
    prompt.push('\n');
}

fn push_primary(prompt: &mut String, header: &str, doc: &Document, marker: &str) {
    prompt.push_str(header);
    prompt.push('\n');
    prompt.push_str(&format!("\n### {}\n", doc.filename));
    prompt.push_str(truncate_chars(&doc.content, PRIMARY_BUDGET));
    if doc.content.chars().count() > PRIMARY_BUDGET {
        prompt.push_str(&format!("\n{marker}\n"));
    }
    prompt.push('\n');
}

/// Prompt for a transcript: same-date agendas and minutes first as context,
/// then the transcript itself.
fn build_extract_prompt(transcript: &Document, agendas: &[Document], minutes: &[Document]) -> String {
    let mut prompt = String::new();
    push_section(
        &mut prompt,
        "## Relevant Agendas",
        &matching_by_date(transcript, agendas),
        "[Agenda truncated]",
    );
    push_section(
        &mut prompt,
        "## Relevant Minutes",
        &matching_by_date(transcript, minutes),
        "[Minutes truncated]",
    );
    push_primary(
        &mut prompt,
        "## Meeting Transcript",
        transcript,
        "[Transcript truncated for length]",
    );
    prompt
}

/// Prompt for standalone minutes: same-date agendas as context, then the
/// minutes as the primary document.
fn build_minutes_prompt(minutes_doc: &Document, agendas: &[Document]) -> String {
    let mut prompt = String::new();
    push_section(
        &mut prompt,
        "## Relevant Agendas",
        &matching_by_date(minutes_doc, agendas),
        "[Agenda truncated]",
    );
    push_primary(
        &mut prompt,
        "## Meeting Minutes",
        minutes_doc,
        "[Minutes truncated for length]",
    );
    prompt
}

/// Distinct vote participants, attributed to the meeting body.
fn officials_from_votes(votes: &[VoteRecord], body: &str) -> Vec<Official> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for vote in votes {
        for name in vote.yes.iter().chain(&vote.no).chain(&vote.abstain) {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                names.insert(trimmed);
            }
        }
    }
    names
        .into_iter()
        .map(|name| Official {
            name: name.to_string(),
            body: body.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockGenerationAdapter;
    use crate::adapters::persistence::{DisabledStore, JsonExtractCache};
    use crate::domain::DocumentKind;
    use crate::usecases::gateway::GatewayStep;

    fn doc(kind: DocumentKind, name: &str, content: &str) -> Document {
        Document {
            filename: name.to_string(),
            content: content.to_string(),
            kind,
        }
    }

    fn service(
        mock: Arc<MockGenerationAdapter>,
        cache_dir: &std::path::Path,
        prefer_cache: bool,
    ) -> ExtractionService {
        let gateway = Arc::new(LlmGateway::new(
            vec![GatewayStep::new("mock", "mock-model", mock)],
            3,
            Duration::ZERO,
        ));
        ExtractionService::new(
            gateway,
            Arc::new(JsonExtractCache::new(cache_dir)),
            Arc::new(DisabledStore),
            ExtractionOptions {
                prefer_cache,
                pacing: Duration::ZERO,
                system_prompt: "extract".to_string(),
                max_tokens: 4000,
                votes_dir: None,
            },
        )
    }

    #[tokio::test]
    async fn extracts_each_transcript_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());
        let svc = service(mock.clone(), tmp.path(), false);

        let transcripts = vec![
            doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "a"),
            doc(DocumentKind::Transcript, "2026-01-07_SchoolBoard.txt", "b"),
        ];
        let batch = svc.run(&transcripts, &[], &[]).await.unwrap();

        assert_eq!(mock.call_count(), 2);
        assert_eq!(batch.extracts.len(), 2);
        assert_eq!(batch.votes.len(), 2);
        assert_eq!(batch.spending.len(), 2);
        assert_eq!(batch.votes[0].source, "2026-01-05_Municipality.txt");
    }

    #[tokio::test]
    async fn cached_documents_skip_the_gateway() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());

        let transcripts = vec![doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "a")];
        let first = service(mock.clone(), tmp.path(), false);
        first.run(&transcripts, &[], &[]).await.unwrap();
        assert_eq!(mock.call_count(), 1);

        let second = service(mock.clone(), tmp.path(), true);
        let batch = second.run(&transcripts, &[], &[]).await.unwrap();
        assert_eq!(mock.call_count(), 1);
        assert_eq!(batch.gateway_calls, 0);
        assert_eq!(batch.extracts.len(), 1);
    }

    #[tokio::test]
    async fn minutes_with_matching_transcript_date_are_not_reprocessed() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());
        let svc = service(mock.clone(), tmp.path(), false);

        let transcripts = vec![doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "a")];
        let minutes = vec![
            doc(DocumentKind::Minutes, "2026-01-05_minutes.txt", "same date"),
            doc(DocumentKind::Minutes, "2026-01-08_minutes.txt", "standalone"),
        ];
        let batch = svc.run(&transcripts, &[], &minutes).await.unwrap();

        // One call for the transcript, one for the standalone minutes only.
        assert_eq!(mock.call_count(), 2);
        let sources: Vec<&str> = batch.extracts.iter().map(|e| e.source.as_str()).collect();
        assert!(sources.contains(&"2026-01-08_minutes.txt"));
        assert!(!sources.contains(&"2026-01-05_minutes.txt"));
    }

    #[tokio::test]
    async fn from_cache_rebuilds_without_gateway_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());
        let transcripts = vec![doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "a")];

        let svc = service(mock.clone(), tmp.path(), false);
        svc.run(&transcripts, &[], &[]).await.unwrap();
        let calls_after_run = mock.call_count();

        let batch = svc.from_cache(&transcripts, &[]).await.unwrap();
        assert_eq!(mock.call_count(), calls_after_run);
        assert_eq!(batch.extracts.len(), 1);
        assert_eq!(batch.votes.len(), 1);

        // Nothing cached for an unseen document set.
        let unseen = vec![doc(DocumentKind::Transcript, "2026-02-01_Municipality.txt", "b")];
        assert!(svc.from_cache(&unseen, &[]).await.is_err());
    }

    #[tokio::test]
    async fn cache_only_rebuild_writes_timestamped_vote_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());
        let transcripts = vec![doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "a")];

        // Populate the cache without a snapshot directory configured.
        service(mock.clone(), tmp.path(), false)
            .run(&transcripts, &[], &[])
            .await
            .unwrap();

        let votes_dir = tmp.path().join("votes");
        let gateway = Arc::new(LlmGateway::new(
            vec![GatewayStep::new("mock", "mock-model", mock)],
            3,
            Duration::ZERO,
        ));
        let svc = ExtractionService::new(
            gateway,
            Arc::new(JsonExtractCache::new(tmp.path())),
            Arc::new(DisabledStore),
            ExtractionOptions {
                prefer_cache: true,
                pacing: Duration::ZERO,
                system_prompt: "extract".to_string(),
                max_tokens: 4000,
                votes_dir: Some(votes_dir.clone()),
            },
        );
        svc.from_cache(&transcripts, &[]).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(&votes_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        // votes_YYYY-MM-DD_HHMMSS.json
        assert!(names[0].starts_with("votes_"));
        assert!(names[0].ends_with(".json"));
        assert_eq!(names[0].len(), "votes_2026-01-05_120000.json".len());
    }

    #[tokio::test]
    async fn empty_batch_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGenerationAdapter::new());
        let svc = service(mock, tmp.path(), false);
        assert!(svc.run(&[], &[], &[]).await.is_err());
    }

    #[test]
    fn prompt_orders_agendas_minutes_transcript() {
        let transcript = doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "T");
        let agendas = vec![doc(DocumentKind::Agenda, "2026-01-05_agenda.txt", "A")];
        let minutes = vec![doc(DocumentKind::Minutes, "2026-01-05_minutes.txt", "M")];

        let prompt = build_extract_prompt(&transcript, &agendas, &minutes);
        let a = prompt.find("## Relevant Agendas").unwrap();
        let m = prompt.find("## Relevant Minutes").unwrap();
        let t = prompt.find("## Meeting Transcript").unwrap();
        assert!(a < m && m < t);
    }

    #[test]
    fn prompt_skips_unrelated_dates() {
        let transcript = doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", "T");
        let agendas = vec![doc(DocumentKind::Agenda, "2026-01-12_agenda.txt", "A")];
        let prompt = build_extract_prompt(&transcript, &agendas, &[]);
        assert!(!prompt.contains("## Relevant Agendas"));
    }

    #[test]
    fn long_transcript_is_truncated_with_marker() {
        let long = "x".repeat(PRIMARY_BUDGET + 100);
        let transcript = doc(DocumentKind::Transcript, "2026-01-05_Municipality.txt", &long);
        let prompt = build_extract_prompt(&transcript, &[], &[]);
        assert!(prompt.contains("[Transcript truncated for length]"));
        assert!(prompt.len() < long.len() + 200);
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn url_header_is_read_from_top_of_document() {
        assert_eq!(
            source_url_header("URL: https://example.org/v/abc\n\nTranscript..."),
            Some("https://example.org/v/abc".to_string())
        );
        assert_eq!(source_url_header("Transcript with no header"), None);
        let buried = format!("{}URL: https://late.example.org\n", "line\n".repeat(12));
        assert_eq!(source_url_header(&buried), None);
    }

    #[test]
    fn officials_are_deduplicated_across_votes() {
        let mut v1 = VoteRecord {
            meeting: String::new(),
            motion: String::new(),
            result: String::new(),
            unanimous: false,
            yes: vec!["Jones".to_string(), "Smith".to_string()],
            no: vec!["Lee".to_string()],
            abstain: vec![],
            context: String::new(),
            source: String::new(),
        };
        let mut v2 = v1.clone();
        v2.yes = vec!["Smith".to_string()];
        v2.no = vec![" ".to_string()];
        v1.abstain = vec!["Lee".to_string()];

        let officials = officials_from_votes(&[v1, v2], "City Commission");
        let names: Vec<&str> = officials.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Jones", "Lee", "Smith"]);
        assert!(officials.iter().all(|o| o.body == "City Commission"));
    }
}
