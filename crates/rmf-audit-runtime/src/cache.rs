//! In-memory cache of assisted verdicts.
//!
//! Identical (category, baseline, evidence) triples reuse the model's
//! earlier judgment instead of paying for another call. Only accepted
//! model judgments are cached; fallbacks never are.

use moka::future::Cache;
use rmf_audit_core::{Category, Evaluation};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    category: Category,
    baseline_hash: u64,
    evidence_hash: u64,
}

impl CacheKey {
    /// Surrounding whitespace does not change the key.
    pub fn new(category: Category, baseline: &str, evidence: &str) -> Self {
        Self {
            category,
            baseline_hash: hash_text(baseline),
            evidence_hash: hash_text(evidence),
        }
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.trim().hash(&mut hasher);
    hasher.finish()
}

pub struct VerdictCache {
    cache: Cache<CacheKey, Evaluation>,
}

impl VerdictCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Evaluation> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, evaluation: Evaluation) {
        self.cache.insert(key, evaluation).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}
