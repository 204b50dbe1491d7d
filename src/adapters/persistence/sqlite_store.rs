//! SQLite-backed persistence via libsql. Implements `PersistencePort`.
//!
//! One database file holds meetings, votes, spending items, officials, and
//! digests. Meetings are keyed by (meeting_date, body); votes and spending
//! use delete-then-insert per meeting so re-running extraction never
//! duplicates rows. Vote name lists are stored as JSON text columns.
//!
//! `DisabledStore` is the no-op twin used when no database path is
//! configured: writes return the disabled sentinel, queries return empty.

use crate::domain::{
    Digest, DissentFact, DomainError, MeetingRecord, Official, SpendingFact, SpendingRecord,
    VoteRecord,
};
use crate::ports::PersistencePort;
use chrono::{NaiveDate, Utc};
use libsql::{params, Database};
use std::path::Path;
use tracing::info;

const MEETINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS meetings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meeting_date TEXT NOT NULL,
    body TEXT NOT NULL,
    source_filename TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_url TEXT,
    extract_text TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE (meeting_date, body)
)"#;

const VOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meeting_id INTEGER NOT NULL REFERENCES meetings(id),
    motion TEXT NOT NULL DEFAULT '',
    result TEXT NOT NULL DEFAULT '',
    unanimous INTEGER NOT NULL DEFAULT 1,
    yes_names TEXT NOT NULL DEFAULT '[]',
    no_names TEXT NOT NULL DEFAULT '[]',
    abstain_names TEXT NOT NULL DEFAULT '[]',
    context TEXT NOT NULL DEFAULT ''
)"#;

const SPENDING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS spending_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meeting_id INTEGER NOT NULL REFERENCES meetings(id),
    vendor TEXT NOT NULL DEFAULT 'N/A',
    amount REAL NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT 'routine',
    project TEXT,
    budget_line TEXT,
    contract_term TEXT,
    fiscal_year INTEGER NOT NULL
)"#;

const OFFICIALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS officials (
    name TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (name, body)
)"#;

const NEWSLETTERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS newsletters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    week_of TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    markdown_content TEXT NOT NULL,
    meeting_ids TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
)"#;

const VOTES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_votes_meeting ON votes (meeting_id)";
const SPENDING_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_spending_meeting ON spending_items (meeting_id)";

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Connect to (or create) the database file and ensure the schema
    /// exists. Call once at startup; the returned store is safe to share
    /// via Arc.
    pub async fn connect(db_path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DomainError::Persistence(e.to_string()))?;
        }
        let path_str = path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        // WAL mode enables concurrent readers + one writer. PRAGMA returns
        // a row, so consume it via query (execute fails when rows come back).
        let mut wal_rows = conn
            .query("PRAGMA journal_mode=WAL", ())
            .await
            .map_err(|e| DomainError::Persistence(format!("WAL pragma failed: {}", e)))?;
        while wal_rows
            .next()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?
            .is_some()
        {}

        for statement in [
            MEETINGS_TABLE,
            VOTES_TABLE,
            SPENDING_TABLE,
            OFFICIALS_TABLE,
            NEWSLETTERS_TABLE,
            VOTES_INDEX,
            SPENDING_INDEX,
        ] {
            conn.execute(statement, ())
                .await
                .map_err(|e| DomainError::Persistence(e.to_string()))?;
        }

        info!(path = %path.display(), "SQLite store connected");
        Ok(Self { db })
    }

    fn connect_conn(&self) -> Result<libsql::Connection, DomainError> {
        self.db
            .connect()
            .map_err(|e| DomainError::Persistence(e.to_string()))
    }

    fn names_to_json(names: &[String]) -> String {
        serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string())
    }

    fn json_to_names(raw: &str) -> Vec<String> {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn cutoff(lookback_days: i64) -> String {
        (Utc::now().date_naive() - chrono::Duration::days(lookback_days))
            .format("%Y-%m-%d")
            .to_string()
    }
}

#[async_trait::async_trait]
impl PersistencePort for SqliteStore {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn upsert_meeting(&self, meeting: &MeetingRecord) -> Result<Option<i64>, DomainError> {
        let conn = self.connect_conn()?;
        let now = Utc::now().to_rfc3339();
        let mut rows = conn
            .query(
                r#"
                INSERT INTO meetings
                    (meeting_date, body, source_filename, source_type, source_url, extract_text, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT (meeting_date, body) DO UPDATE SET
                    source_filename = excluded.source_filename,
                    source_type = excluded.source_type,
                    source_url = excluded.source_url,
                    extract_text = excluded.extract_text,
                    updated_at = excluded.updated_at
                RETURNING id
                "#,
                params![
                    meeting.date.format("%Y-%m-%d").to_string(),
                    meeting.body.as_str(),
                    meeting.source_filename.as_str(),
                    meeting.source_type.as_str(),
                    meeting.source_url.clone(),
                    meeting.extract_text.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        let id = match row {
            Some(row) => {
                let id: i64 = row.get(0).map_err(|e| DomainError::Persistence(e.to_string()))?;
                Some(id)
            }
            None => None,
        };
        info!(date = %meeting.date, body = %meeting.body, ?id, "upserted meeting");
        Ok(id)
    }

    async fn replace_votes(
        &self,
        meeting_id: i64,
        votes: &[VoteRecord],
    ) -> Result<usize, DomainError> {
        let conn = self.connect_conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        tx.execute("DELETE FROM votes WHERE meeting_id = ?1", params![meeting_id])
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        for v in votes {
            tx.execute(
                r#"
                INSERT INTO votes
                    (meeting_id, motion, result, unanimous, yes_names, no_names, abstain_names, context)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    meeting_id,
                    v.motion.as_str(),
                    v.result.as_str(),
                    v.unanimous as i64,
                    Self::names_to_json(&v.yes),
                    Self::names_to_json(&v.no),
                    Self::names_to_json(&v.abstain),
                    v.context.as_str(),
                ],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        info!(meeting_id, count = votes.len(), "replaced votes");
        Ok(votes.len())
    }

    async fn replace_spending(
        &self,
        meeting_id: i64,
        items: &[SpendingRecord],
        fiscal_year: i32,
    ) -> Result<usize, DomainError> {
        let conn = self.connect_conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        tx.execute(
            "DELETE FROM spending_items WHERE meeting_id = ?1",
            params![meeting_id],
        )
        .await
        .map_err(|e| DomainError::Persistence(e.to_string()))?;
        for s in items {
            tx.execute(
                r#"
                INSERT INTO spending_items
                    (meeting_id, vendor, amount, description, category, project, budget_line, contract_term, fiscal_year)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    meeting_id,
                    s.vendor.as_str(),
                    s.amount,
                    s.description.as_str(),
                    s.category.as_str(),
                    s.project.clone(),
                    s.budget_line.clone(),
                    s.contract_term.map(|t| t.as_str()),
                    fiscal_year as i64,
                ],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        info!(meeting_id, count = items.len(), fiscal_year, "replaced spending items");
        Ok(items.len())
    }

    async fn upsert_official(&self, official: &Official) -> Result<(), DomainError> {
        let conn = self.connect_conn()?;
        conn.execute(
            r#"
            INSERT INTO officials (name, body) VALUES (?1, ?2)
            ON CONFLICT (name, body) DO NOTHING
            "#,
            params![official.name.as_str(), official.body.as_str()],
        )
        .await
        .map_err(|e| DomainError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn upsert_digest(
        &self,
        digest: &Digest,
        week_of: NaiveDate,
        meeting_ids: &[i64],
    ) -> Result<Option<i64>, DomainError> {
        let conn = self.connect_conn()?;
        let ids_json = serde_json::to_string(meeting_ids).unwrap_or_else(|_| "[]".to_string());
        let mut rows = conn
            .query(
                r#"
                INSERT INTO newsletters (week_of, title, markdown_content, meeting_ids, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (week_of) DO UPDATE SET
                    title = excluded.title,
                    markdown_content = excluded.markdown_content,
                    meeting_ids = excluded.meeting_ids,
                    created_at = excluded.created_at
                RETURNING id
                "#,
                params![
                    week_of.format("%Y-%m-%d").to_string(),
                    digest.title.as_str(),
                    digest.markdown.as_str(),
                    ids_json,
                    digest.generated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;
        match row {
            Some(row) => {
                let id: i64 = row.get(0).map_err(|e| DomainError::Persistence(e.to_string()))?;
                info!(week_of = %week_of, id, "upserted digest");
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    async fn recent_spending(
        &self,
        lookback_days: i64,
    ) -> Result<Vec<SpendingFact>, DomainError> {
        let conn = self.connect_conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT s.vendor, s.amount, s.project
                FROM spending_items s
                JOIN meetings m ON m.id = s.meeting_id
                WHERE m.meeting_date >= ?1
                ORDER BY s.amount DESC
                "#,
                params![Self::cutoff(lookback_days)],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        let mut facts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?
        {
            facts.push(SpendingFact {
                vendor: row.get::<String>(0).unwrap_or_else(|_| "Unknown".to_string()),
                amount: row.get::<f64>(1).unwrap_or_default(),
                project: row.get::<Option<String>>(2).ok().flatten(),
            });
        }
        Ok(facts)
    }

    async fn recent_dissent(&self, lookback_days: i64) -> Result<Vec<DissentFact>, DomainError> {
        let conn = self.connect_conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT v.motion, v.no_names, v.abstain_names
                FROM votes v
                JOIN meetings m ON m.id = v.meeting_id
                WHERE v.unanimous = 0 AND m.meeting_date >= ?1
                ORDER BY m.meeting_date DESC
                LIMIT 100
                "#,
                params![Self::cutoff(lookback_days)],
            )
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        let mut facts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Persistence(e.to_string()))?
        {
            facts.push(DissentFact {
                motion: row.get::<String>(0).unwrap_or_default(),
                no_names: Self::json_to_names(&row.get::<String>(1).unwrap_or_default()),
                abstain_names: Self::json_to_names(&row.get::<String>(2).unwrap_or_default()),
            });
        }
        Ok(facts)
    }
}

/// No-op persistence used when no database path is configured. Writes
/// return the disabled sentinel; queries return empty.
pub struct DisabledStore;

#[async_trait::async_trait]
impl PersistencePort for DisabledStore {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn upsert_meeting(&self, _meeting: &MeetingRecord) -> Result<Option<i64>, DomainError> {
        Ok(None)
    }

    async fn replace_votes(
        &self,
        _meeting_id: i64,
        _votes: &[VoteRecord],
    ) -> Result<usize, DomainError> {
        Ok(0)
    }

    async fn replace_spending(
        &self,
        _meeting_id: i64,
        _items: &[SpendingRecord],
        _fiscal_year: i32,
    ) -> Result<usize, DomainError> {
        Ok(0)
    }

    async fn upsert_official(&self, _official: &Official) -> Result<(), DomainError> {
        Ok(())
    }

    async fn upsert_digest(
        &self,
        _digest: &Digest,
        _week_of: NaiveDate,
        _meeting_ids: &[i64],
    ) -> Result<Option<i64>, DomainError> {
        Ok(None)
    }

    async fn recent_spending(
        &self,
        _lookback_days: i64,
    ) -> Result<Vec<SpendingFact>, DomainError> {
        Ok(Vec::new())
    }

    async fn recent_dissent(&self, _lookback_days: i64) -> Result<Vec<DissentFact>, DomainError> {
        Ok(Vec::new())
    }
}
