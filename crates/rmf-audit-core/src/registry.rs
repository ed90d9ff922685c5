//! Process-wide session map.
//!
//! The map lock is held only to insert, look up or remove an entry. Work on
//! a session happens under that session's own mutex, so sessions never
//! contend with each other.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::catalog::QuestionCatalog;
use crate::category::Category;
use crate::session::{AuditSession, SessionSummary};
use crate::AuditError;

/// Registry limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Sessions idle longer than this are evictable ("30m", "2h", ...)
    #[serde(with = "duration_human")]
    pub idle_timeout: Duration,

    /// Maximum number of live sessions
    pub max_sessions: usize,
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            max_sessions: 1024,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.idle_timeout.is_zero() {
            return Err(AuditError::Config(
                "idle_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(AuditError::Config(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

struct Entry {
    session: AuditSession,
    last_activity: Instant,
}

impl Entry {
    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Shared handle to one live session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    entry: Arc<Mutex<Entry>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the session; marks it as active.
    pub fn lock(&self) -> MappedMutexGuard<'_, AuditSession> {
        let mut entry = self.entry.lock();
        entry.last_activity = Instant::now();
        MutexGuard::map(entry, |e| &mut e.session)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// Owns every live [`AuditSession`].
pub struct SessionRegistry {
    catalog: Arc<QuestionCatalog>,
    config: RegistryConfig,
    sessions: RwLock<HashMap<String, Arc<Mutex<Entry>>>>,
}

impl SessionRegistry {
    pub fn new(catalog: Arc<QuestionCatalog>, config: RegistryConfig) -> Self {
        Self {
            catalog,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Start a session over `category`'s questions.
    ///
    /// Fails with `UnknownCategory` (and creates nothing) when the catalog
    /// has no questions for the category.
    pub fn create(&self, category: Category) -> Result<(String, SessionHandle), AuditError> {
        if !self.catalog.contains(category) {
            return Err(AuditError::UnknownCategory {
                category: category.label().to_string(),
            });
        }

        let questions = self.catalog.questions_for(category).to_vec();
        let question_count = questions.len();

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.config.max_sessions {
            self.make_room(&mut sessions);
        }
        if sessions.len() >= self.config.max_sessions {
            tracing::warn!(max = self.config.max_sessions, "Session registry full");
            return Err(AuditError::CapacityExceeded {
                max: self.config.max_sessions,
            });
        }

        let mut id = new_session_id();
        while sessions.contains_key(&id) {
            id = new_session_id();
        }

        let entry = Arc::new(Mutex::new(Entry {
            session: AuditSession::new(id.clone(), category, questions),
            last_activity: Instant::now(),
        }));
        sessions.insert(id.clone(), Arc::clone(&entry));
        drop(sessions);

        tracing::info!(
            session_id = %id,
            category = %category,
            questions = question_count,
            "Audit session created"
        );

        Ok((id.clone(), SessionHandle { id, entry }))
    }

    /// Look up a live session. Expired sessions are removed and reported
    /// as not found.
    pub fn get(&self, session_id: &str) -> Result<SessionHandle, AuditError> {
        let entry = self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AuditError::SessionNotFound(session_id.to_string()))?;

        let expired = entry
            .try_lock()
            .is_some_and(|e| e.is_idle(self.config.idle_timeout));
        if expired {
            let mut sessions = self.sessions.write();
            if sessions
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current, &entry))
            {
                sessions.remove(session_id);
            }
            tracing::debug!(session_id = %session_id, "Expired session removed on lookup");
            return Err(AuditError::SessionNotFound(session_id.to_string()));
        }

        Ok(SessionHandle {
            id: session_id.to_string(),
            entry,
        })
    }

    /// Run `f` with exclusive access to a session.
    pub fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut AuditSession) -> R,
    ) -> Result<R, AuditError> {
        let handle = self.get(session_id)?;
        let mut session = handle.lock();
        Ok(f(&mut session))
    }

    /// Remove a session. Closing an unknown id is not an error; returns
    /// whether anything was removed.
    pub fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id = %session_id, "Audit session closed");
        }
        removed
    }

    /// Drop sessions idle past the timeout. Sessions currently locked count
    /// as active. Returns the number evicted.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        let timeout = self.config.idle_timeout;
        sessions.retain(|_, entry| !entry.try_lock().is_some_and(|e| e.is_idle(timeout)));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    fn make_room(&self, sessions: &mut HashMap<String, Arc<Mutex<Entry>>>) {
        let timeout = self.config.idle_timeout;
        sessions.retain(|_, entry| !entry.try_lock().is_some_and(|e| e.is_idle(timeout)));

        let mut completed: Vec<(Instant, String)> = sessions
            .iter()
            .filter_map(|(id, entry)| {
                let e = entry.try_lock()?;
                let candidate = e.session.is_completed().then(|| (e.last_activity, id.clone()));
                candidate
            })
            .collect();
        completed.sort();

        let excess = (sessions.len() + 1).saturating_sub(self.config.max_sessions);
        for (_, id) in completed.into_iter().take(excess) {
            sessions.remove(&id);
            tracing::debug!(session_id = %id, "Completed session evicted to make room");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of live sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Summaries of every completed session, oldest completion first.
    pub fn completed(&self) -> Vec<SessionSummary> {
        let entries: Vec<Arc<Mutex<Entry>>> = self.sessions.read().values().cloned().collect();

        let mut summaries: Vec<SessionSummary> = entries
            .iter()
            .filter_map(|entry| {
                let e = entry.lock();
                let summary = e.session.is_completed().then(|| e.session.summary());
                summary
            })
            .collect();
        summaries.sort_by(|a, b| {
            a.completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }
}

/// `audit_` followed by 16 lowercase hex characters.
fn new_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("audit_{}", &hex[..16])
}
