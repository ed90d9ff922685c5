//! Model-assisted conformity evaluation.
//!
//! [`AssistedEvaluator`] wraps an [`LlmProvider`] in the same contract the
//! keyword heuristic honours: every (baseline, evidence) pair yields an
//! [`Evaluation`]. The model is consulted only when
//!
//! - the submission is not empty or a bare yes/no,
//! - the category's circuit is not open,
//! - the token budget covers another call,
//!
//! and its reply is used only when it parses and every cited term occurs in
//! the submission. In all other cases the heuristic result is returned with
//! its rationale prefixed by the fallback reason.

use backon::{ExponentialBuilder, Retryable};
use rmf_audit_core::{
    AuditError, AuditService, Category, ConformityEvaluator, Evaluation, KeywordEvaluator,
    ScoringConfig,
};
use std::sync::Arc;

use crate::cache::{CacheKey, VerdictCache};
use crate::config::RuntimeConfig;
use crate::judgment::Judgment;
use crate::prompts;
use crate::providers::{LlmProvider, ProviderError};
use crate::resilience::{BudgetTracker, CircuitBreaker, CircuitState, FallbackReason, LlmUsage};

pub struct AssistedEvaluator {
    provider: Arc<dyn LlmProvider>,
    config: RuntimeConfig,
    heuristic: KeywordEvaluator,
    circuit_breaker: CircuitBreaker,
    budget: BudgetTracker,
    cache: Option<VerdictCache>,
}

impl AssistedEvaluator {
    /// `scoring` configures the heuristic used for coverage figures and
    /// for every fallback.
    pub fn new(provider: Arc<dyn LlmProvider>, config: RuntimeConfig, scoring: ScoringConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| VerdictCache::new(config.cache.max_entries, config.cache.ttl));

        Self {
            provider,
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            budget: BudgetTracker::new(config.budget.global_max_tokens),
            heuristic: KeywordEvaluator::new(scoring),
            cache,
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn heuristic(&self) -> &KeywordEvaluator {
        &self.heuristic
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn usage(&self) -> LlmUsage {
        self.budget.usage()
    }

    pub fn circuit_state(&self, category: Category) -> CircuitState {
        self.circuit_breaker.state(category)
    }

    /// Evaluate one submission. Never fails.
    pub async fn evaluate(&self, category: Category, baseline: &str, evidence: &str) -> Evaluation {
        let heuristic = self.heuristic.evaluate(baseline, evidence);

        if evidence.trim().is_empty() || self.heuristic.is_trivial(evidence) {
            tracing::debug!(category = %category, "Bare submission, skipping model call");
            return heuristic;
        }

        let key = CacheKey::new(category, baseline, evidence);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                self.budget.record_cache_hit();
                tracing::debug!(category = %category, verdict = %hit.verdict, "Assisted verdict cache hit");
                return hit;
            }
        }

        match self.judge(category, baseline, evidence).await {
            Ok(judgment) => {
                self.circuit_breaker.record_success(category);
                tracing::debug!(
                    category = %category,
                    verdict = %judgment.verdict,
                    heuristic_verdict = %heuristic.verdict,
                    cited = judgment.cited_terms.len(),
                    "Assisted evaluation accepted"
                );

                let evaluation = Evaluation {
                    verdict: judgment.verdict,
                    rationale: judgment.rationale,
                    assisted: true,
                    ..heuristic
                };
                if let Some(cache) = &self.cache {
                    cache.insert(key, evaluation.clone()).await;
                }
                evaluation
            }
            Err(reason) => {
                if reason.trips_circuit() {
                    self.circuit_breaker.record_failure(category);
                }
                tracing::warn!(
                    category = %category,
                    provider = self.provider.name(),
                    reason = %reason,
                    "Falling back to keyword heuristic"
                );
                self.budget.record_fallback(&reason);
                fallback(heuristic, &reason)
            }
        }
    }

    /// Evaluate the pending evidence of a session and commit the result.
    ///
    /// The session lock is not held across the model call. The pending
    /// question is captured first; if the session has moved to another
    /// question by the time the model replies, the commit is rejected with
    /// [`AuditError::InvalidState`] and the session is left untouched.
    pub async fn submit(
        &self,
        service: &AuditService,
        session_id: &str,
        evidence: &str,
    ) -> Result<Evaluation, AuditError> {
        let (category, state, pending) = service
            .registry()
            .with_session(session_id, |s| (s.category(), s.state(), s.pending_evidence()))?;

        let pending = pending.ok_or(AuditError::InvalidState {
            operation: "submit evidence",
            state,
        })?;

        let evaluation = self.evaluate(category, &pending.baseline, evidence).await;
        service.submit_evaluated_evidence(session_id, &pending, evidence, evaluation)
    }

    async fn judge(
        &self,
        category: Category,
        baseline: &str,
        evidence: &str,
    ) -> Result<Judgment, FallbackReason> {
        if !self.budget.can_afford(self.config.budget.estimated_call_tokens) {
            return Err(FallbackReason::BudgetExhausted);
        }
        // Past this point every outcome is recorded on the circuit.
        if !self.circuit_breaker.allows(category) {
            return Err(FallbackReason::CircuitOpen);
        }

        let messages = prompts::evaluation_messages(category, baseline, evidence);
        let completion = self.config.completion();
        let provider = &self.provider;
        let (messages, completion) = (&messages, &completion);

        let call = (move || async move { provider.complete(messages.clone(), completion).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.config.retry.min_delay)
                    .with_max_times(self.config.retry.max_retries),
            )
            .when(ProviderError::is_retryable)
            .notify(|err: &ProviderError, delay| {
                tracing::debug!(error = %err, delay = ?delay, "Retrying model call");
            });

        let response = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(FallbackReason::Provider(e.to_string())),
            Err(_) => return Err(FallbackReason::Timeout),
        };
        self.budget.record_usage(&response.usage);

        Judgment::parse_verified(&response.content, evidence)
            .map_err(|e| FallbackReason::InvalidJudgment(e.to_string()))
    }
}

fn fallback(heuristic: Evaluation, reason: &FallbackReason) -> Evaluation {
    Evaluation {
        rationale: format!(
            "Assisted evaluation unavailable ({}); keyword heuristic: {}",
            reason, heuristic.rationale
        ),
        assisted: false,
        ..heuristic
    }
}
