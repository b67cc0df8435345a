use crate::clock::Clock;
use crate::domain::report::{BriefKind, ResearchQuery, ResearchResult};
use crate::domain::watchlist::WatchlistItem;
use crate::error::{ErrorKind, StageError};
use crate::llm::{prompt, GroundedAnswer, GroundedModel};
use crate::research::rate_limit::RateLimiter;
use crate::research::retry::RetryPolicy;
use chrono::NaiveDate;
use std::sync::Arc;

/// Grounded research over one watchlist item, paced by the shared rate limiter.
pub struct ResearchClient {
    model: Arc<dyn GroundedModel>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl ResearchClient {
    pub fn new(model: Arc<dyn GroundedModel>, limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            limiter,
            clock,
            policy: RetryPolicy::research(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Never fails: errors are folded into `ResearchResult::failure`.
    pub async fn query(&self, item: &WatchlistItem, as_of: NaiveDate) -> ResearchResult {
        let query = ResearchQuery {
            item: item.clone(),
            prompt_text: prompt::research_prompt(item, as_of),
        };

        match self.ask(&query.prompt_text, &item.label).await {
            Ok(answer) => {
                tracing::debug!(provider = %self.model.provider(), label = %item.label, sources = answer.sources.len(), "research succeeded");
                ResearchResult::success(query.item, answer.text, answer.sources)
            }
            Err(err) => {
                tracing::warn!(provider = %self.model.provider(), label = %item.label, kind = %err.kind, error = %err, "research failed");
                ResearchResult::failure(query.item, err.kind, err.detail)
            }
        }
    }

    /// Portfolio-level section; the caller decides how to render a failure.
    pub async fn brief(
        &self,
        kind: BriefKind,
        items: &[WatchlistItem],
        as_of: NaiveDate,
    ) -> Result<String, StageError> {
        let prompt_text = prompt::brief_prompt(kind, items, as_of);
        self.ask(&prompt_text, kind.title()).await.map(|a| a.text)
    }

    async fn ask(&self, prompt_text: &str, target: &str) -> Result<GroundedAnswer, StageError> {
        let limiter = &self.limiter;
        let model = &self.model;

        let (res, attempts) = self
            .policy
            .run(self.clock.as_ref(), target, move |attempt| async move {
                let permit = limiter.acquire().await?;
                tracing::trace!(provider = %model.provider(), target_name = target, attempt, used_today = permit.used_today, "calling model");
                let answer = model.generate(prompt_text).await?;
                if answer.text.trim().is_empty() {
                    return Err(StageError::new(
                        ErrorKind::MalformedResponse,
                        "research",
                        "model returned empty text",
                    ));
                }
                Ok(answer)
            })
            .await;

        if attempts > 1 {
            tracing::info!(target_name = target, attempts, ok = res.is_ok(), "research finished after retries");
        }
        res
    }
}
