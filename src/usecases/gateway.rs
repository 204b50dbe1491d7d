//! Generation gateway: retry with backoff, then fall back down a fixed chain.
//!
//! Each step names a provider adapter and a model. Transient failures
//! (rate limits, 5xx, timeouts) are retried with exponential backoff up to
//! the retry budget, then the next step is tried; permanent failures (auth,
//! malformed request) abort the whole call immediately.

use crate::domain::GenerationError;
use crate::ports::GenerationPort;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct GatewayStep {
    /// Display label for logs, e.g. "anthropic/claude-sonnet-4-5".
    pub label: String,
    pub model: String,
    pub port: Arc<dyn GenerationPort>,
}

impl GatewayStep {
    pub fn new(label: impl Into<String>, model: impl Into<String>, port: Arc<dyn GenerationPort>) -> Self {
        Self {
            label: label.into(),
            model: model.into(),
            port,
        }
    }
}

pub struct LlmGateway {
    steps: Vec<GatewayStep>,
    max_retries: u32,
    backoff_base: Duration,
}

impl LlmGateway {
    pub fn new(steps: Vec<GatewayStep>, max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            steps,
            max_retries: max_retries.max(1),
            backoff_base,
        }
    }

    /// Run one generation request through the chain. Returns the first
    /// successful response, or the last error once every step is exhausted.
    pub async fn call(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let mut last_err = GenerationError::Permanent("no gateway steps configured".to_string());

        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                warn!(step = %step.label, "falling back to next provider");
            }
            for attempt in 1..=self.max_retries {
                match step
                    .port
                    .generate(&step.model, system_prompt, user_prompt, max_tokens)
                    .await
                {
                    Ok(text) => {
                        info!(step = %step.label, attempt, "generation succeeded");
                        return Ok(text);
                    }
                    Err(err) if err.is_transient() => {
                        warn!(step = %step.label, attempt, %err, "transient generation failure");
                        last_err = err;
                        if attempt < self.max_retries && !self.backoff_base.is_zero() {
                            let delay = self.backoff_base * 2u32.pow(attempt - 1);
                            info!(step = %step.label, delay_secs = delay.as_secs(), "backing off");
                            tokio::time::sleep(delay).await;
                        }
                    }
                    Err(err) => {
                        error!(step = %step.label, attempt, %err, "permanent generation failure");
                        return Err(err);
                    }
                }
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockGenerationAdapter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingPort {
        calls: AtomicUsize,
        error: fn() -> GenerationError,
    }

    impl FailingPort {
        fn transient() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                error: || GenerationError::Transient("HTTP 429".to_string()),
            }
        }

        fn permanent() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                error: || GenerationError::Permanent("HTTP 401".to_string()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerationPort for FailingPort {
        async fn generate(
            &self,
            _model: &str,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: u32,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    fn gateway(steps: Vec<GatewayStep>) -> LlmGateway {
        LlmGateway::new(steps, 3, Duration::ZERO)
    }

    #[tokio::test]
    async fn first_step_success_skips_fallback() {
        let primary = Arc::new(MockGenerationAdapter::new());
        let fallback = Arc::new(MockGenerationAdapter::new());
        let gw = gateway(vec![
            GatewayStep::new("primary", "model-a", primary.clone()),
            GatewayStep::new("fallback", "model-b", fallback.clone()),
        ]);

        gw.call("sys", "user", 4000).await.unwrap();
        assert_eq!(primary.call_count(), 1);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn transient_failures_exhaust_retries_then_fall_back() {
        let flaky = Arc::new(FailingPort::transient());
        let backup = Arc::new(MockGenerationAdapter::new());
        let gw = gateway(vec![
            GatewayStep::new("flaky", "model-a", flaky.clone()),
            GatewayStep::new("backup", "model-b", backup.clone()),
        ]);

        gw.call("sys", "user", 4000).await.unwrap();
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(backup.call_count(), 1);
    }

    #[tokio::test]
    async fn permanent_failure_aborts_without_fallback() {
        let broken = Arc::new(FailingPort::permanent());
        let backup = Arc::new(MockGenerationAdapter::new());
        let gw = gateway(vec![
            GatewayStep::new("broken", "model-a", broken.clone()),
            GatewayStep::new("backup", "model-b", backup.clone()),
        ]);

        let err = gw.call("sys", "user", 4000).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backup.call_count(), 0);
    }

    #[tokio::test]
    async fn all_steps_exhausted_returns_last_error() {
        let a = Arc::new(FailingPort::transient());
        let b = Arc::new(FailingPort::transient());
        let gw = gateway(vec![
            GatewayStep::new("a", "model-a", a.clone()),
            GatewayStep::new("b", "model-b", b.clone()),
        ]);

        let err = gw.call("sys", "user", 4000).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(a.calls.load(Ordering::SeqCst), 3);
        assert_eq!(b.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_chain_is_a_permanent_error() {
        let gw = gateway(Vec::new());
        let err = gw.call("sys", "user", 4000).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
