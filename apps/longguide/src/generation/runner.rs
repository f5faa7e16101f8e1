//! Generation Runner: renders guided prompts and drives the backend under
//! the retry policy, per-call timeout and shared rate limiter.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::config::Config;
use crate::generation::prompts::render_prompt;
use crate::llm_client::{
    GenerationBackend, GenerationError, GenerationRequest, RateLimiter, RetryPolicy,
};
use crate::models::{Example, GuidelineSet};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_CONCURRENCY: usize = 4;

pub struct GenerationRunner {
    backend: Arc<dyn GenerationBackend>,
    retry: RetryPolicy,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    concurrency: usize,
}

impl GenerationRunner {
    pub fn new(backend: Arc<dyn GenerationBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            limiter: Arc::new(RateLimiter::unlimited()),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn GenerationBackend>) -> Self {
        Self::new(backend, config.retry.clone())
            .with_limiter(RateLimiter::new(config.concurrency, config.requests_per_minute))
            .with_timeout(config.request_timeout)
            .with_sampling(config.max_tokens, config.temperature)
            .with_concurrency(config.concurrency)
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Sends a raw prompt. Each attempt waits for the rate limiter, then runs
    /// under the per-call timeout; an elapsed timeout is transient.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let request = GenerationRequest {
            prompt: prompt.to_string(),
            max_tokens,
            temperature: self.temperature,
        };

        let request = &request;
        let backend = self.backend.as_ref();
        let limiter = self.limiter.as_ref();
        let timeout = self.timeout;

        self.retry
            .execute(|attempt| async move {
                let _permit = limiter.acquire().await?;
                debug!("Generation request attempt {attempt}");
                match tokio::time::timeout(timeout, backend.generate(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Transient(format!(
                        "request timed out after {}ms",
                        timeout.as_millis()
                    ))),
                }
            })
            .await
    }

    /// Generates the output for one example under one guideline set.
    pub async fn generate(
        &self,
        instruction: &str,
        example: &Example,
        set: &GuidelineSet,
    ) -> Result<String, GenerationError> {
        let prompt = render_prompt(instruction, set, &example.source_text);
        self.complete(&prompt, self.max_tokens).await
    }

    /// Generates for every example with at most `concurrency` calls in
    /// flight. Results come back in input order.
    pub async fn run_batch(
        &self,
        instruction: &str,
        examples: &[Example],
        set: &GuidelineSet,
    ) -> Vec<Result<String, GenerationError>> {
        stream::iter(examples)
            .map(|example| self.generate(instruction, example, set))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::FakeBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps before echoing the input; the delay shrinks as the input grows.
    struct SlowEcho {
        base: Duration,
    }

    #[async_trait]
    impl GenerationBackend for SlowEcho {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let input = request.prompt.rsplit("Input: ").next().unwrap_or_default();
            let n: u64 = input.trim().parse().unwrap_or(0);
            tokio::time::sleep(self.base.saturating_sub(Duration::from_millis(n * 10))).await;
            Ok(input.to_string())
        }
    }

    fn examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| Example::new(format!("ex-{i}"), i.to_string(), "ref"))
            .collect()
    }

    #[tokio::test]
    async fn test_generate_sends_rendered_prompt() {
        let backend = Arc::new(FakeBackend::new(|req| Ok(req.prompt.clone())));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));
        let example = Example::new("a", "A: hi", "greeting");

        let out = runner
            .generate("Summarize.", &example, &GuidelineSet::empty())
            .await
            .unwrap();
        assert_eq!(out, "Summarize.\n\nInput: A: hi");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let backend = Arc::new(FakeBackend::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(GenerationError::Transient("429".into()))
            } else {
                Ok("ok".to_string())
            }
        }));
        let runner = GenerationRunner::new(backend.clone(), RetryPolicy::without_backoff(4));

        assert_eq!(runner.complete("p", 8).await.unwrap(), "ok");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_terminal() {
        let backend = Arc::new(FakeBackend::new(|_| {
            Err(GenerationError::Permanent("invalid request".into()))
        }));
        let runner = GenerationRunner::new(backend.clone(), RetryPolicy::without_backoff(4));

        let err = runner.complete("p", 8).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let backend = Arc::new(SlowEcho {
            base: Duration::from_secs(30),
        });
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(2))
            .with_timeout(Duration::from_secs(1));

        let err = runner.complete("Input: 0", 8).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_batch_preserves_input_order() {
        let backend = Arc::new(SlowEcho {
            base: Duration::from_millis(100),
        });
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1))
            .with_concurrency(3);

        let outputs = runner
            .run_batch("Echo.", &examples(6), &GuidelineSet::empty())
            .await;
        let outputs: Vec<String> = outputs.into_iter().map(Result::unwrap).collect();
        assert_eq!(outputs, vec!["0", "1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let backend = Arc::new(FakeBackend::new(|req| {
            if req.prompt.ends_with("Input: 1") {
                Err(GenerationError::Permanent("refused".into()))
            } else {
                Ok("fine".to_string())
            }
        }));
        let runner = GenerationRunner::new(backend, RetryPolicy::without_backoff(1));

        let outputs = runner
            .run_batch("Do.", &examples(3), &GuidelineSet::empty())
            .await;
        assert!(outputs[0].is_ok());
        assert!(outputs[1].is_err());
        assert!(outputs[2].is_ok());
    }
}
