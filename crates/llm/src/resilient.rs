//! Retry and fallback around any [`LanguageModel`]
//!
//! A caller on the line must always hear something. Retryable failures
//! (rate limiting, dropped connections, timeouts) are retried with
//! exponential backoff; once the attempts are used up, or on a failure that
//! retrying cannot fix, the configured fallback reply is returned instead of
//! an error.

use std::time::Duration;

use async_trait::async_trait;

use voice_call_config::LlmConfig;
use voice_call_core::{LanguageModel, Result, Turn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for RetryPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

pub struct ResilientModel<M> {
    inner: M,
    policy: RetryPolicy,
    fallback_reply: String,
}

impl<M: LanguageModel> ResilientModel<M> {
    pub fn new(inner: M, policy: RetryPolicy, fallback_reply: impl Into<String>) -> Self {
        Self {
            inner,
            policy,
            fallback_reply: fallback_reply.into(),
        }
    }

    pub fn from_config(inner: M, config: &LlmConfig) -> Self {
        Self::new(inner, RetryPolicy::from(config), config.fallback_reply.clone())
    }

    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for ResilientModel<M> {
    async fn generate(&self, history: &[Turn], user_text: &str) -> Result<String> {
        let mut backoff = self.policy.initial_backoff;

        for attempt in 0..=self.policy.max_retries {
            match self.inner.generate(history, user_text).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let wait = match &e {
                        voice_call_core::Error::RateLimited {
                            retry_after: Some(hint),
                        } => (*hint).max(backoff),
                        _ => backoff,
                    }
                    .min(self.policy.max_backoff);

                    tracing::warn!(
                        model = self.inner.model_name(),
                        error = %e,
                        "LLM request failed, retrying in {:?} (attempt {}/{})",
                        wait,
                        attempt + 1,
                        self.policy.max_retries
                    );
                    metrics::counter!("voice_call_llm_retries_total", "kind" => e.kind())
                        .increment(1);
                    tokio::time::sleep(wait).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                }
                Err(e) => {
                    tracing::error!(
                        model = self.inner.model_name(),
                        error = %e,
                        attempts = attempt + 1,
                        "LLM request failed, using fallback reply"
                    );
                    metrics::counter!("voice_call_llm_fallbacks_total", "kind" => e.kind())
                        .increment(1);
                    return Ok(self.fallback_reply.clone());
                }
            }
        }

        Ok(self.fallback_reply.clone())
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::time::Instant;
    use voice_call_core::Error;

    #[derive(Clone, Default)]
    struct ScriptedModel {
        replies: Arc<Mutex<VecDeque<Result<String>>>>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                calls: Arc::default(),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, _history: &[Turn], _user_text: &str) -> Result<String> {
            self.calls.lock().push(Instant::now());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::RateLimited { retry_after: None }))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backs_off_then_succeeds() {
        let scripted = ScriptedModel::new(vec![
            Err(Error::RateLimited { retry_after: None }),
            Err(Error::RateLimited { retry_after: None }),
            Ok("hello".to_string()),
        ]);
        let model = ResilientModel::new(scripted.clone(), policy(), "fallback");

        let start = Instant::now();
        assert_eq!(model.generate(&[], "hi").await.unwrap(), "hello");
        assert_eq!(scripted.call_count(), 3);

        let calls = scripted.calls.lock().clone();
        assert_eq!(calls[1] - calls[0], Duration::from_millis(500));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(1000));
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let scripted = ScriptedModel::new(vec![]);
        let model = ResilientModel::new(scripted.clone(), policy(), "fallback");

        let start = Instant::now();
        assert_eq!(model.generate(&[], "hi").await.unwrap(), "fallback");
        assert_eq!(scripted.call_count(), 4);
        // 500 + 1000 + 1500 (capped)
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_is_respected() {
        let scripted = ScriptedModel::new(vec![
            Err(Error::RateLimited {
                retry_after: Some(Duration::from_millis(1200)),
            }),
            Ok("ok".to_string()),
        ]);
        let model = ResilientModel::new(scripted.clone(), policy(), "fallback");

        let start = Instant::now();
        assert_eq!(model.generate(&[], "hi").await.unwrap(), "ok");
        assert_eq!(start.elapsed(), Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_falls_back_immediately() {
        let scripted = ScriptedModel::new(vec![Err(Error::Provider("HTTP 401".to_string()))]);
        let model = ResilientModel::new(scripted.clone(), policy(), "Sorry?");

        let start = Instant::now();
        assert_eq!(model.generate(&[], "hi").await.unwrap(), "Sorry?");
        assert_eq!(scripted.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_millis(4000));
    }
}
