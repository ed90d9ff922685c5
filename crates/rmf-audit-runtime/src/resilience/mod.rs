//! Resilience patterns for assisted evaluation.
//!
//! - Per-category circuit breaker
//! - Token budget and usage accounting
//! - Fallback reasons reported when the heuristic takes over

mod budget;
mod circuit_breaker;
mod fallback;

pub use budget::{BudgetTracker, LlmUsage};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fallback::FallbackReason;
