//! Filesystem document store.
//!
//! Loads `*.txt` meeting artifacts from per-kind subdirectories of the data
//! directory, in lexicographic (therefore chronological) filename order.

use crate::domain::{date_prefix, Document, DocumentKind, DomainError};
use crate::ports::DocumentStore;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct FsDocumentStore {
    data_dir: PathBuf,
}

impl FsDocumentStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    fn dir_for(&self, kind: DocumentKind) -> PathBuf {
        let sub = match kind {
            DocumentKind::Transcript => "transcripts",
            DocumentKind::Minutes => "minutes",
            DocumentKind::Agenda => "agendas",
            DocumentKind::Budget => "budget",
        };
        self.data_dir.join(sub)
    }
}

/// Keep files inside the lookback window. Files without a valid date prefix
/// are included unfiltered; only a readable date can exclude a file.
fn within_window(filename: &str, cutoff: Option<NaiveDate>) -> bool {
    let Some(cutoff) = cutoff else {
        return true;
    };
    match date_prefix(filename).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()) {
        Some(date) => date >= cutoff,
        None => true,
    }
}

#[async_trait::async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list(
        &self,
        kind: DocumentKind,
        lookback_days: Option<i64>,
    ) -> Result<Vec<Document>, DomainError> {
        let dir = self.dir_for(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let cutoff =
            lookback_days.map(|days| Utc::now().date_naive() - chrono::Duration::days(days));

        let mut names: Vec<String> = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| DomainError::Loader(format!("read_dir {}: {}", dir.display(), e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::Loader(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".txt") && within_window(&name, cutoff) {
                names.push(name);
            }
        }
        names.sort();

        let mut documents = Vec::with_capacity(names.len());
        for name in names {
            let content = fs::read_to_string(dir.join(&name))
                .await
                .map_err(|e| DomainError::Loader(format!("read {}: {}", name, e)))?;
            documents.push(Document {
                filename: name,
                content,
                kind,
            });
        }

        debug!(kind = kind.as_str(), count = documents.len(), "loaded documents");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_doc(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).await.unwrap();
        fs::write(dir.join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn missing_directory_yields_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(tmp.path());
        let docs = store.list(DocumentKind::Transcript, None).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn lists_txt_files_in_lexicographic_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("transcripts");
        write_doc(&dir, "2026-01-10_b.txt", "second").await;
        write_doc(&dir, "2026-01-05_a.txt", "first").await;
        write_doc(&dir, "notes.md", "ignored").await;

        let store = FsDocumentStore::new(tmp.path());
        let docs = store.list(DocumentKind::Transcript, None).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].filename, "2026-01-05_a.txt");
        assert_eq!(docs[1].filename, "2026-01-10_b.txt");
        assert_eq!(docs[0].content, "first");
    }

    #[tokio::test]
    async fn lookback_window_drops_old_dated_files_keeps_undated() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("minutes");
        let recent = Utc::now().date_naive();
        let old = recent - chrono::Duration::days(60);
        write_doc(&dir, &format!("{}_current.txt", recent.format("%Y-%m-%d")), "new").await;
        write_doc(&dir, &format!("{}_stale.txt", old.format("%Y-%m-%d")), "old").await;
        write_doc(&dir, "undated_notes.txt", "kept").await;

        let store = FsDocumentStore::new(tmp.path());
        let docs = store.list(DocumentKind::Minutes, Some(14)).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.ends_with("_current.txt")));
        assert!(names.contains(&"undated_notes.txt"));
    }
}
