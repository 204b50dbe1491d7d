//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/storage types here; these are mapped from adapters. The vote and
//! spending records mirror the line-delimited JSON the generation service is
//! instructed to emit, so serde defaults are deliberately lenient: the model
//! does not guarantee strict schema adherence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A raw meeting artifact loaded from a collection. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    /// Conventionally date-prefixed (`YYYY-MM-DD_...`), unique per collection.
    pub filename: String,
    pub content: String,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Transcript,
    Minutes,
    Agenda,
    Budget,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Transcript => "transcript",
            DocumentKind::Minutes => "minutes",
            DocumentKind::Agenda => "agenda",
            DocumentKind::Budget => "budget",
        }
    }
}

/// One formal vote taken during a meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(default = "unknown_meeting")]
    pub meeting: String,
    #[serde(default)]
    pub motion: String,
    #[serde(default)]
    pub result: String,
    #[serde(default = "default_true")]
    pub unanimous: bool,
    #[serde(default)]
    pub yes: Vec<String>,
    #[serde(default)]
    pub no: Vec<String>,
    #[serde(default)]
    pub abstain: Vec<String>,
    #[serde(default)]
    pub context: String,
    /// Filename of the document this vote was extracted from. Tagged by the
    /// parser, not emitted by the model.
    #[serde(default)]
    pub source: String,
}

fn unknown_meeting() -> String {
    "Unknown".to_string()
}

fn default_true() -> bool {
    true
}

/// One appropriation, contract award, or expenditure mentioned in a meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingRecord {
    #[serde(default = "na_vendor")]
    pub vendor: String,
    /// Finite, non-negative. A line whose amount cannot be read as such is
    /// rejected whole by the parser rather than silently zeroed.
    #[serde(default, deserialize_with = "de_amount")]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "de_category")]
    pub category: SpendingCategory,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub budget_line: Option<String>,
    #[serde(default, deserialize_with = "de_contract_term")]
    pub contract_term: Option<ContractTerm>,
    #[serde(default)]
    pub source: String,
}

fn na_vendor() -> String {
    "N/A".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingCategory {
    Contract,
    ChangeOrder,
    Consultant,
    Capital,
    #[default]
    Routine,
}

impl SpendingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendingCategory::Contract => "contract",
            SpendingCategory::ChangeOrder => "change_order",
            SpendingCategory::Consultant => "consultant",
            SpendingCategory::Capital => "capital",
            SpendingCategory::Routine => "routine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractTerm {
    BaseYear,
    Renewal1,
    Renewal2,
    Renewal3,
}

impl ContractTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractTerm::BaseYear => "base_year",
            ContractTerm::Renewal1 => "renewal_1",
            ContractTerm::Renewal2 => "renewal_2",
            ContractTerm::Renewal3 => "renewal_3",
        }
    }
}

/// Accept a JSON number or a numeric string; reject anything that does not
/// read as a finite non-negative amount so the surrounding line is skipped.
fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Num(f64),
        Text(String),
    }

    let value = match RawAmount::deserialize(deserializer)? {
        RawAmount::Num(n) => n,
        RawAmount::Text(s) => s
            .trim()
            .replace(['$', ','], "")
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom("amount is not numeric"))?,
    };
    if !value.is_finite() || value < 0.0 {
        return Err(serde::de::Error::custom(
            "amount must be a finite non-negative number",
        ));
    }
    Ok(value)
}

/// Unknown category strings fall back to `routine` instead of discarding the
/// line. The category label is advisory, the amount is the signal.
fn de_category<'de, D>(deserializer: D) -> Result<SpendingCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(match raw.trim().to_lowercase().as_str() {
        "contract" => SpendingCategory::Contract,
        "change_order" => SpendingCategory::ChangeOrder,
        "consultant" => SpendingCategory::Consultant,
        "capital" => SpendingCategory::Capital,
        _ => SpendingCategory::Routine,
    })
}

/// Unknown contract-term strings map to `None` rather than an error.
fn de_contract_term<'de, D>(deserializer: D) -> Result<Option<ContractTerm>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(match raw.trim().to_lowercase().as_str() {
        "base_year" => Some(ContractTerm::BaseYear),
        "renewal_1" => Some(ContractTerm::Renewal1),
        "renewal_2" => Some(ContractTerm::Renewal2),
        "renewal_3" => Some(ContractTerm::Renewal3),
        _ => None,
    })
}

/// The cached result of one Phase 1 extraction. A reloaded record is a full
/// substitute for re-calling the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub source: String,
    pub notes: String,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
    #[serde(default)]
    pub spending: Vec<SpendingRecord>,
    pub cached_at: DateTime<Utc>,
}

impl ExtractionRecord {
    pub fn new(
        source: String,
        notes: String,
        votes: Vec<VoteRecord>,
        spending: Vec<SpendingRecord>,
    ) -> Self {
        Self {
            source,
            notes,
            votes,
            spending,
            cached_at: Utc::now(),
        }
    }
}

/// An elected or appointed official, derived from vote participant names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Official {
    pub name: String,
    pub body: String,
}

/// A meeting row for the persistence backend, keyed by (date, body).
#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub date: NaiveDate,
    pub body: String,
    pub source_filename: String,
    pub source_type: DocumentKind,
    pub source_url: Option<String>,
    pub extract_text: String,
}

/// The final consolidated newsletter. One per Phase 2 run, immutable.
#[derive(Debug, Clone)]
pub struct Digest {
    pub title: String,
    pub markdown: String,
    pub sources: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// One persisted spending row projected for historical aggregation.
#[derive(Debug, Clone)]
pub struct SpendingFact {
    pub vendor: String,
    pub amount: f64,
    pub project: Option<String>,
}

/// One persisted non-unanimous vote projected for dissent aggregation.
#[derive(Debug, Clone)]
pub struct DissentFact {
    pub motion: String,
    pub no_names: Vec<String>,
    pub abstain_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_record_defaults_fill_missing_fields() {
        let v: VoteRecord =
            serde_json::from_str(r#"{"motion": "Approve minutes", "result": "Passed 5-0"}"#)
                .unwrap();
        assert_eq!(v.meeting, "Unknown");
        assert!(v.unanimous);
        assert!(v.yes.is_empty() && v.no.is_empty() && v.abstain.is_empty());
        assert_eq!(v.context, "");
    }

    #[test]
    fn spending_amount_accepts_numeric_string() {
        let s: SpendingRecord =
            serde_json::from_str(r#"{"vendor": "Acme", "amount": "1,500.50"}"#).unwrap();
        assert_eq!(s.amount, 1500.5);
        assert_eq!(s.category, SpendingCategory::Routine);
    }

    #[test]
    fn spending_amount_rejects_garbage() {
        let result =
            serde_json::from_str::<SpendingRecord>(r#"{"vendor": "Acme", "amount": "bad"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn spending_amount_rejects_negative() {
        let result =
            serde_json::from_str::<SpendingRecord>(r#"{"vendor": "Acme", "amount": -5.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_category_falls_back_to_routine() {
        let s: SpendingRecord = serde_json::from_str(
            r#"{"vendor": "Acme", "amount": 10.0, "category": "Mystery", "contract_term": "forever"}"#,
        )
        .unwrap();
        assert_eq!(s.category, SpendingCategory::Routine);
        assert_eq!(s.contract_term, None);
    }

    #[test]
    fn contract_term_parses_known_values() {
        let s: SpendingRecord = serde_json::from_str(
            r#"{"vendor": "Acme", "amount": 10.0, "category": "contract", "contract_term": "renewal_1"}"#,
        )
        .unwrap();
        assert_eq!(s.category, SpendingCategory::Contract);
        assert_eq!(s.contract_term, Some(ContractTerm::Renewal1));
    }
}
