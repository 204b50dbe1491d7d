//! Mock generation adapter for testing without API calls.
//!
//! Returns a canned extraction response (notes plus structured log blocks)
//! and counts calls, so pipeline tests can assert how many times the
//! gateway was actually invoked.

use crate::domain::GenerationError;
use crate::ports::GenerationPort;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

const CANNED_RESPONSE: &str = r#"[MOCK] Structured notes for this meeting.

- The board approved the prior meeting's minutes without discussion.
- A sewer lining contract was awarded after one round of questions.

```vote-log
{"meeting": "Mock Meeting", "motion": "Approve minutes", "result": "Passed 5-0", "unanimous": true, "yes": [], "no": [], "abstain": [], "context": ""}
```

```spending-log
{"vendor": "Mock Contracting LLC", "amount": 125000.00, "description": "Sewer lining award", "category": "contract", "project": "Sewer Lining", "budget_line": null, "contract_term": "base_year"}
```
"#;

pub struct MockGenerationAdapter {
    delay_ms: u64,
    calls: AtomicUsize,
    response: String,
}

impl MockGenerationAdapter {
    pub fn new() -> Self {
        Self::with_response(CANNED_RESPONSE.to_string())
    }

    pub fn with_response(response: String) -> Self {
        Self {
            delay_ms: 10,
            calls: AtomicUsize::new(0),
            response,
        }
    }

    /// Number of generate() calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockGenerationAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GenerationPort for MockGenerationAdapter {
    async fn generate(
        &self,
        model: &str,
        _system_prompt: &str,
        user_prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        info!(
            model,
            prompt_len = user_prompt.len(),
            "[MOCK] simulating generation call"
        );
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::logparse;

    #[tokio::test]
    async fn canned_response_contains_parseable_logs() {
        let adapter = MockGenerationAdapter::new();
        let out = adapter.generate("mock", "sys", "user", 4000).await.unwrap();
        assert_eq!(adapter.call_count(), 1);
        assert_eq!(logparse::parse_votes(&out, "t.txt").len(), 1);
        assert_eq!(logparse::parse_spending(&out, "t.txt").len(), 1);
    }
}
