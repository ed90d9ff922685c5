//! Token budget and usage accounting for model calls.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use super::FallbackReason;
use crate::providers::TokenUsage;

/// Accumulated model usage for one evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,

    /// Model calls that returned a response
    pub llm_calls: u32,

    /// Evaluations answered from the verdict cache
    pub cache_hits: u32,

    /// Evaluations that fell back to the keyword heuristic
    pub fallbacks: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call_at: Option<DateTime<Utc>>,
}

impl LlmUsage {
    fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.last_call_at = Some(Utc::now());
    }
}

/// Global token budget plus usage counters.
///
/// A call is admitted when the remaining budget covers its estimate; the
/// provider's reported usage is what gets charged afterwards.
pub struct BudgetTracker {
    max_tokens: u32,
    used: AtomicU32,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.remaining() >= estimated_tokens
    }

    pub fn record_usage(&self, usage: &TokenUsage) {
        self.used.fetch_add(usage.total(), Ordering::SeqCst);
        self.usage.write().add(usage);
    }

    pub fn record_cache_hit(&self) {
        self.usage.write().cache_hits += 1;
    }

    pub fn record_fallback(&self, reason: &FallbackReason) {
        tracing::debug!(reason = %reason, "Counting heuristic fallback");
        self.usage.write().fallbacks += 1;
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(20_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_enforcement() {
        let tracker = BudgetTracker::new(100);
        assert!(tracker.can_afford(100));
        assert!(!tracker.can_afford(101));

        tracker.record_usage(&TokenUsage {
            prompt_tokens: 40,
            completion_tokens: 20,
        });
        assert_eq!(tracker.remaining(), 40);
        assert!(!tracker.can_afford(50));
        assert!(tracker.can_afford(40));
    }

    #[test]
    fn test_overspend_saturates() {
        let tracker = BudgetTracker::new(50);
        tracker.record_usage(&TokenUsage {
            prompt_tokens: 60,
            completion_tokens: 10,
        });
        assert_eq!(tracker.remaining(), 0);
        assert!(tracker.can_afford(0));
    }

    #[test]
    fn test_usage_counters() {
        let tracker = BudgetTracker::default();
        tracker.record_usage(&TokenUsage {
            prompt_tokens: 30,
            completion_tokens: 20,
        });
        tracker.record_cache_hit();
        tracker.record_fallback(&FallbackReason::CircuitOpen);

        let usage = tracker.usage();
        assert_eq!(usage.total_tokens, 50);
        assert_eq!(usage.llm_calls, 1);
        assert_eq!(usage.cache_hits, 1);
        assert_eq!(usage.fallbacks, 1);
        assert!(usage.last_call_at.is_some());

        tracker.reset();
        assert_eq!(tracker.usage(), LlmUsage::default());
        assert_eq!(tracker.remaining(), 20_000);
    }
}
