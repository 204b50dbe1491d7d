//! Structured log parsing from free-text model output.
//!
//! Phase 1 responses embed machine-readable records as fenced blocks tagged
//! `vote-log` / `spending-log`, one JSON object per line (not a JSON array).
//! Lines are parsed independently so a single malformed line never discards
//! the rest of the block. No schema validation happens here beyond what the
//! record types themselves enforce; shape defensiveness belongs to the
//! consumers.

use crate::domain::{SpendingRecord, VoteRecord};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::warn;

static VOTE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```vote-log\s*\n(.*?)```").expect("valid vote-log pattern"));
static SPENDING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```spending-log\s*\n(.*?)```").expect("valid spending-log pattern")
});

/// Extract vote records from the first `vote-log` fenced block.
///
/// An absent block or an empty block body yields an empty list, never an
/// error. Every returned record is tagged with `source`.
pub fn parse_votes(llm_output: &str, source: &str) -> Vec<VoteRecord> {
    let mut votes: Vec<VoteRecord> = parse_block(&VOTE_BLOCK, llm_output, source, "vote-log");
    for v in &mut votes {
        v.source = source.to_string();
    }
    votes
}

/// Extract spending records from the first `spending-log` fenced block.
pub fn parse_spending(llm_output: &str, source: &str) -> Vec<SpendingRecord> {
    let mut items: Vec<SpendingRecord> =
        parse_block(&SPENDING_BLOCK, llm_output, source, "spending-log");
    for s in &mut items {
        s.source = source.to_string();
    }
    items
}

fn parse_block<T: DeserializeOwned>(
    pattern: &Regex,
    llm_output: &str,
    source: &str,
    tag: &str,
) -> Vec<T> {
    let Some(captures) = pattern.captures(llm_output) else {
        return Vec::new();
    };
    let Some(block) = captures.get(1) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for line in block.as_str().trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                let preview: String = line.chars().take(80).collect();
                warn!(source, tag, %err, preview, "skipping malformed log line");
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOTE_OUTPUT: &str = r#"Some extracted notes here.

```vote-log
{"meeting": "Commission Meeting", "motion": "Approve minutes", "result": "Passed 5-0", "unanimous": true, "yes": [], "no": [], "abstain": [], "context": ""}
{"meeting": "Commission Meeting", "motion": "Ordinance 715", "result": "Passed 4-1", "unanimous": false, "yes": ["Jones", "Lee", "Garcia", "Patel"], "no": ["Smith"], "abstain": [], "context": "Smith cited enforcement cost concerns"}
```

Trailing prose.
"#;

    #[test]
    fn parses_votes_in_order() {
        let votes = parse_votes(VOTE_OUTPUT, "2026-01-28_meeting.txt");
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].motion, "Approve minutes");
        assert!(votes[0].unanimous);
        assert_eq!(votes[1].no, vec!["Smith"]);
        assert!(!votes[1].unanimous);
        assert!(votes.iter().all(|v| v.source == "2026-01-28_meeting.txt"));
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let output = "```vote-log\n\
            {\"motion\": \"First\", \"unanimous\": true}\n\
            {not valid json at all\n\
            {\"motion\": \"Third\", \"unanimous\": true}\n\
            ```";
        let votes = parse_votes(output, "test.txt");
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].motion, "First");
        assert_eq!(votes[1].motion, "Third");
    }

    #[test]
    fn absent_block_yields_empty_list() {
        assert!(parse_votes("No structured output here.", "test.txt").is_empty());
        assert!(parse_spending("No structured output here.", "test.txt").is_empty());
    }

    #[test]
    fn empty_block_yields_empty_list() {
        assert!(parse_votes("```vote-log\n```", "test.txt").is_empty());
        assert!(parse_spending("```spending-log\n```", "test.txt").is_empty());
    }

    #[test]
    fn only_first_block_is_read() {
        let output = "```vote-log\n{\"motion\": \"A\"}\n```\nmore\n```vote-log\n{\"motion\": \"B\"}\n```";
        let votes = parse_votes(output, "test.txt");
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].motion, "A");
    }

    #[test]
    fn spending_block_parses_and_tags_source() {
        let output = "```spending-log\n\
            {\"vendor\": \"Insight Pipe Contracting LLC\", \"amount\": 1124196.00, \"description\": \"2026 sewer lining\", \"category\": \"contract\", \"project\": \"2026 Sewer Lining\", \"budget_line\": \"Sewer Funds\", \"contract_term\": \"base_year\"}\n\
            {\"vendor\": \"N/A\", \"amount\": 7160832.12, \"description\": \"November expenditure list\", \"category\": \"routine\", \"project\": null, \"budget_line\": null, \"contract_term\": null}\n\
            ```";
        let items = parse_spending(output, "2026-01-28_meeting.txt");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].vendor, "Insight Pipe Contracting LLC");
        assert_eq!(items[1].vendor, "N/A");
        assert_eq!(items[1].amount, 7160832.12);
        assert_eq!(items[0].source, "2026-01-28_meeting.txt");
    }

    #[test]
    fn bad_amount_drops_only_that_line() {
        let output = "```spending-log\n\
            {\"vendor\": \"Acme\", \"amount\": 1500.5, \"description\": \"paving\"}\n\
            {\"vendor\": \"Acme\", \"amount\": \"bad\", \"description\": \"paving\"}\n\
            ```";
        let items = parse_spending(output, "test.txt");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, 1500.5);
    }
}
