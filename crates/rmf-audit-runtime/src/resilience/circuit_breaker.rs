//! Circuit breaker to stop calling a failing model.
//!
//! Each category has its own circuit. Once a category's calls fail
//! `failure_threshold` times in a row its circuit opens and evaluations for
//! that category go straight to the keyword heuristic until
//! `recovery_timeout` has passed. A half-open circuit admits one trial call
//! at a time.

use parking_lot::Mutex;
use rmf_audit_core::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before a trial call is let through
    #[serde(with = "crate::config::duration_human")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close the circuit again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one category's circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen {
        successes: u32,
        /// Start of the trial call in flight, if any.
        trial_started: Option<Instant>,
    },
}

pub struct CircuitBreaker {
    states: Mutex<HashMap<Category, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Whether a model call may be made for `category`.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// and lets one trial call through. Further callers are refused until
    /// that call is recorded, or until it has been outstanding for another
    /// recovery timeout (a caller that never reports back).
    ///
    /// A `true` from a non-closed circuit must be followed by
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn allows(&self, category: Category) -> bool {
        let mut states = self.states.lock();
        let successes = match states.get(&category) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() < self.config.recovery_timeout {
                    return false;
                }
                tracing::info!(category = %category, "Circuit half-open, trying the model again");
                0
            }
            Some(CircuitState::HalfOpen {
                successes,
                trial_started: Some(started),
            }) => {
                if started.elapsed() < self.config.recovery_timeout {
                    return false;
                }
                *successes
            }
            Some(CircuitState::HalfOpen {
                successes,
                trial_started: None,
            }) => *successes,
            _ => return true,
        };

        states.insert(
            category,
            CircuitState::HalfOpen {
                successes,
                trial_started: Some(Instant::now()),
            },
        );
        true
    }

    pub fn record_success(&self, category: Category) {
        let mut states = self.states.lock();
        let next = match states.get(&category) {
            Some(CircuitState::HalfOpen { successes, .. })
                if successes + 1 < self.config.success_threshold =>
            {
                CircuitState::HalfOpen {
                    successes: successes + 1,
                    trial_started: None,
                }
            }
            Some(CircuitState::HalfOpen { .. }) => {
                tracing::info!(category = %category, "Circuit closed after recovery");
                CircuitState::Closed { failures: 0 }
            }
            _ => CircuitState::Closed { failures: 0 },
        };
        states.insert(category, next);
    }

    pub fn record_failure(&self, category: Category) {
        let mut states = self.states.lock();
        let next = match states.get(&category) {
            Some(CircuitState::Open { opened_at }) => CircuitState::Open {
                opened_at: *opened_at,
            },
            Some(CircuitState::HalfOpen { .. }) => {
                tracing::warn!(category = %category, "Circuit reopened after failed trial call");
                CircuitState::Open {
                    opened_at: Instant::now(),
                }
            }
            Some(CircuitState::Closed { failures }) if failures + 1 < self.config.failure_threshold => {
                CircuitState::Closed {
                    failures: failures + 1,
                }
            }
            None if self.config.failure_threshold > 1 => CircuitState::Closed { failures: 1 },
            _ => {
                tracing::warn!(
                    category = %category,
                    threshold = self.config.failure_threshold,
                    "Circuit opened after repeated failures"
                );
                CircuitState::Open {
                    opened_at: Instant::now(),
                }
            }
        };
        states.insert(category, next);
    }

    pub fn state(&self, category: Category) -> CircuitState {
        self.states
            .lock()
            .get(&category)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    pub fn reset(&self) {
        self.states.lock().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(cb.allows(Category::Safe));
        assert_eq!(cb.state(Category::Safe), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        cb.record_failure(Category::Safe);
        assert!(cb.allows(Category::Safe));

        cb.record_failure(Category::Safe);
        assert!(!cb.allows(Category::Safe));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();
        cb.record_failure(Category::Safe);
        cb.record_failure(Category::Safe);
        cb.record_success(Category::Safe);

        cb.record_failure(Category::Safe);
        cb.record_failure(Category::Safe);
        assert!(cb.allows(Category::Safe));
    }

    #[test]
    fn test_categories_are_independent() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        cb.record_failure(Category::PrivacyEnhanced);

        assert!(!cb.allows(Category::PrivacyEnhanced));
        assert!(cb.allows(Category::Safe));
    }

    #[test]
    fn test_recovers_through_half_open() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 2,
        });
        cb.record_failure(Category::Safe);
        assert!(matches!(cb.state(Category::Safe), CircuitState::Open { .. }));

        assert!(cb.allows(Category::Safe));
        assert!(matches!(
            cb.state(Category::Safe),
            CircuitState::HalfOpen {
                successes: 0,
                trial_started: Some(_)
            }
        ));

        cb.record_success(Category::Safe);
        assert_eq!(
            cb.state(Category::Safe),
            CircuitState::HalfOpen {
                successes: 1,
                trial_started: None
            }
        );
        assert!(cb.allows(Category::Safe));
        cb.record_success(Category::Safe);
        assert_eq!(cb.state(Category::Safe), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_failed_trial_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 1,
        });
        cb.record_failure(Category::Safe);
        assert!(cb.allows(Category::Safe));
        cb.record_failure(Category::Safe);
        assert!(matches!(cb.state(Category::Safe), CircuitState::Open { .. }));

        cb.reset();
        assert_eq!(cb.state(Category::Safe), CircuitState::Closed { failures: 0 });
    }

    #[test]
    fn test_half_open_admits_one_trial_at_a_time() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
            success_threshold: 2,
        });
        cb.record_failure(Category::Safe);
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.allows(Category::Safe));
        assert!(!cb.allows(Category::Safe));
        assert!(!cb.allows(Category::Safe));
        // Half-open refusals are per category.
        assert!(cb.allows(Category::SecureResilient));

        cb.record_success(Category::Safe);
        assert!(cb.allows(Category::Safe));
        assert!(!cb.allows(Category::Safe));
        cb.record_success(Category::Safe);

        assert_eq!(cb.state(Category::Safe), CircuitState::Closed { failures: 0 });
        assert!(cb.allows(Category::Safe));
        assert!(cb.allows(Category::Safe));
    }

    #[test]
    fn test_abandoned_trial_is_replaced_after_recovery_timeout() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(20),
            success_threshold: 1,
        });
        cb.record_failure(Category::Safe);
        std::thread::sleep(Duration::from_millis(30));

        assert!(cb.allows(Category::Safe));
        assert!(!cb.allows(Category::Safe));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allows(Category::Safe));
    }
}
