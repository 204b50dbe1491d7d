//! JSON-file extraction cache.
//!
//! One file per source document under the cache directory. Saves use the
//! write-temp-then-rename pattern so a crash mid-write never leaves a
//! half-written entry; a corrupt entry degrades to a cache miss.

use crate::domain::{DomainError, ExtractionRecord};
use crate::ports::ExtractCachePort;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub struct JsonExtractCache {
    cache_dir: PathBuf,
}

impl JsonExtractCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    /// Storage-safe key: path separators flattened, extension stripped.
    /// Differently-named sources that collide after this transform are
    /// assumed not to occur.
    fn entry_path(&self, source: &str) -> PathBuf {
        let safe = source.replace('/', "_");
        let stem = safe.rsplit_once('.').map_or(safe.as_str(), |(s, _)| s);
        self.cache_dir.join(format!("{stem}.json"))
    }

    async fn write_atomic(&self, path: &Path, json: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;
        let temp_path = path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path).await?;
        f.write_all(json.as_bytes()).await?;
        f.sync_all().await?;
        drop(f);
        fs::rename(&temp_path, path).await
    }
}

#[async_trait::async_trait]
impl ExtractCachePort for JsonExtractCache {
    async fn load(&self, source: &str) -> Option<ExtractionRecord> {
        let path = self.entry_path(source);
        let raw = fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str::<ExtractionRecord>(&raw) {
            Ok(record) => {
                info!(source, "loaded cached extract");
                Some(record)
            }
            Err(err) => {
                warn!(source, %err, "corrupt cache entry, treating as absent");
                None
            }
        }
    }

    async fn save(&self, record: &ExtractionRecord) {
        let path = self.entry_path(&record.source);
        let json = match serde_json::to_string_pretty(record) {
            Ok(json) => json,
            Err(err) => {
                warn!(source = %record.source, %err, "failed to serialize cache entry");
                return;
            }
        };
        if let Err(err) = self.write_atomic(&path, &json).await {
            warn!(source = %record.source, %err, "failed to save cache entry");
        }
    }

    async fn clear_all(&self) -> Result<(), DomainError> {
        if !self.cache_dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.cache_dir)
            .await
            .map_err(|e| DomainError::Cache(format!("clear cache: {}", e)))?;
        info!(path = %self.cache_dir.display(), "cleared extraction cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VoteRecord;

    fn sample_record() -> ExtractionRecord {
        let votes = vec![VoteRecord {
            meeting: "Commission Meeting".to_string(),
            motion: "Approve minutes".to_string(),
            result: "Passed 5-0".to_string(),
            unanimous: true,
            yes: Vec::new(),
            no: Vec::new(),
            abstain: Vec::new(),
            context: String::new(),
            source: "2026-01-05_meetingA.txt".to_string(),
        }];
        ExtractionRecord::new(
            "2026-01-05_meetingA.txt".to_string(),
            "extracted notes".to_string(),
            votes,
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = JsonExtractCache::new(tmp.path().join("extracts"));
        let record = sample_record();
        cache.save(&record).await;

        let loaded = cache.load("2026-01-05_meetingA.txt").await.unwrap();
        assert_eq!(loaded.notes, record.notes);
        assert_eq!(loaded.votes.len(), 1);
        assert_eq!(loaded.votes[0].motion, "Approve minutes");
        assert!(loaded.spending.is_empty());
    }

    #[tokio::test]
    async fn missing_entry_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = JsonExtractCache::new(tmp.path().join("extracts"));
        assert!(cache.load("2026-01-05_nothing.txt").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("extracts");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("2026-01-05_meetingA.json"), "{not json")
            .await
            .unwrap();

        let cache = JsonExtractCache::new(&dir);
        assert!(cache.load("2026-01-05_meetingA.txt").await.is_none());
    }

    #[tokio::test]
    async fn clear_all_removes_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = JsonExtractCache::new(tmp.path().join("extracts"));
        cache.save(&sample_record()).await;
        assert!(cache.load("2026-01-05_meetingA.txt").await.is_some());

        cache.clear_all().await.unwrap();
        assert!(cache.load("2026-01-05_meetingA.txt").await.is_none());
        // Clearing an already-empty cache is fine too.
        cache.clear_all().await.unwrap();
    }
}
