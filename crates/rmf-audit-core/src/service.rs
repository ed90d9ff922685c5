//! The audit façade: catalog, registry, evaluator and plans behind one API.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::assessment::{Assessment, AssessmentPolicy};
use crate::catalog::{QuestionCatalog, QuestionId, QuestionRecord};
use crate::category::Category;
use crate::config::AuditConfig;
use crate::evaluator::{ConformityEvaluator, Evaluation, KeywordEvaluator};
use crate::intent::Intent;
use crate::plan::{AuditPlan, PlanProgress};
use crate::registry::SessionRegistry;
use crate::session::{PendingEvidence, Progress, SessionSnapshot, SessionState, SessionSummary};
use crate::AuditError;

/// Returned when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub category: Category,
    pub total_questions: usize,
    pub question: Option<QuestionRecord>,
}

/// Outcome of moving a plan forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    Started {
        plan: PlanProgress,
        session: SessionStarted,
    },
    Finished {
        plan: PlanProgress,
    },
}

/// Result of a chat message, ready to render or serialize.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Reply {
    Help {
        message: String,
        categories: Vec<Category>,
    },
    SessionStarted {
        session: SessionStarted,
        plan: Option<PlanProgress>,
    },
    BaselineShown {
        session_id: String,
        question_id: QuestionId,
        baseline_evidence: String,
    },
    EvidenceEvaluated {
        session_id: String,
        evaluation: Evaluation,
        progress: Progress,
        next_question: Option<QuestionRecord>,
        completed: bool,
        plan: Option<PlanProgress>,
    },
    SessionCompleted {
        summary: SessionSummary,
        plan: Option<PlanProgress>,
    },
    PlanFinished {
        plan: PlanProgress,
    },
    AssessmentGenerated {
        assessment: Assessment,
    },
    Error {
        kind: String,
        message: String,
        recoverable: bool,
    },
}

impl From<AuditError> for Reply {
    fn from(err: AuditError) -> Self {
        Reply::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

/// What a chat conversation is currently working on.
#[derive(Debug, Clone, Default)]
struct Conversation {
    session_id: Option<String>,
    plan_id: Option<String>,
}

/// String-keyed entries capped at `capacity`; inserting past it drops the
/// least recently used entry.
struct Recent<V> {
    entries: HashMap<String, (u64, V)>,
    tick: u64,
    capacity: usize,
}

impl<V> Recent<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            tick: 0,
            capacity: capacity.max(1),
        }
    }

    fn get(&mut self, key: &str) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(used, value)| {
            *used = tick;
            &*value
        })
    }

    /// Insert or replace `key`; returns the keys dropped to make room.
    fn insert(&mut self, key: String, value: V) -> Vec<String> {
        self.tick += 1;
        self.entries.insert(key, (self.tick, value));

        let mut dropped = Vec::new();
        while self.entries.len() > self.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (used, _))| *used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
            dropped.push(oldest);
        }
        dropped
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().map(|(_, value)| value)
    }

    fn retain(&mut self, mut keep: impl FnMut(&mut V) -> bool) {
        self.entries.retain(|_, (_, value)| keep(value));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Guided audit service.
///
/// Plans and chat conversations are kept for at most
/// `registry.max_sessions` ids each, least recently used dropped first.
pub struct AuditService {
    catalog: Arc<QuestionCatalog>,
    registry: SessionRegistry,
    evaluator: Arc<dyn ConformityEvaluator>,
    policy: AssessmentPolicy,
    plans: Mutex<Recent<AuditPlan>>,
    conversations: Mutex<Recent<Conversation>>,
}

impl AuditService {
    /// Service using the keyword heuristic configured by `config.scoring`.
    pub fn new(catalog: QuestionCatalog, config: AuditConfig) -> Self {
        let evaluator = Arc::new(KeywordEvaluator::new(config.scoring.clone()));
        Self::with_evaluator(catalog, config, evaluator)
    }

    /// Service using a custom evaluator.
    pub fn with_evaluator(
        catalog: QuestionCatalog,
        config: AuditConfig,
        evaluator: Arc<dyn ConformityEvaluator>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let capacity = config.registry.max_sessions;
        Self {
            registry: SessionRegistry::new(Arc::clone(&catalog), config.registry),
            catalog,
            evaluator,
            policy: config.assessment,
            plans: Mutex::new(Recent::new(capacity)),
            conversations: Mutex::new(Recent::new(capacity)),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn evaluator(&self) -> &dyn ConformityEvaluator {
        self.evaluator.as_ref()
    }

    /// Categories with at least one question, canonical order.
    pub fn list_categories(&self) -> Vec<Category> {
        self.catalog.categories()
    }

    pub fn start_session(&self, category: Category) -> Result<SessionStarted, AuditError> {
        let (session_id, handle) = self.registry.create(category)?;
        let session = handle.lock();
        Ok(SessionStarted {
            session_id,
            category,
            total_questions: session.questions().len(),
            question: session.current_question().cloned(),
        })
    }

    /// Start a session from a free-text category label.
    pub fn start_session_by_label(&self, label: &str) -> Result<SessionStarted, AuditError> {
        self.start_session(label.parse()?)
    }

    pub fn current_question(&self, session_id: &str) -> Result<Option<QuestionRecord>, AuditError> {
        self.registry
            .with_session(session_id, |s| s.current_question().cloned())
    }

    /// Record an observation; returns the baseline evidence to show next.
    pub fn record_observation(&self, session_id: &str, text: &str) -> Result<String, AuditError> {
        self.registry
            .with_session(session_id, |s| s.record_observation(text).map(str::to_string))?
    }

    pub fn submit_evidence(&self, session_id: &str, text: &str) -> Result<Evaluation, AuditError> {
        let evaluator = self.evaluator.as_ref();
        let (evaluation, completed) = self.registry.with_session(session_id, |s| {
            let evaluation = s.submit_evidence(text, evaluator)?;
            Ok::<_, AuditError>((evaluation, s.is_completed().then(|| s.summary())))
        })??;

        if let Some(summary) = completed {
            self.record_plan_result(summary);
        }
        Ok(evaluation)
    }

    /// Question awaiting evidence, for callers that evaluate elsewhere.
    pub fn pending_evidence(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingEvidence>, AuditError> {
        self.registry.with_session(session_id, |s| s.pending_evidence())
    }

    /// Commit an externally computed evaluation for the question captured
    /// in `pending`. Fails with `InvalidState` if the session has moved on.
    pub fn submit_evaluated_evidence(
        &self,
        session_id: &str,
        pending: &PendingEvidence,
        text: &str,
        evaluation: Evaluation,
    ) -> Result<Evaluation, AuditError> {
        let (evaluation, completed) = self.registry.with_session(session_id, |s| {
            let evaluation = s.submit_evaluated_evidence(pending, text, evaluation)?;
            Ok::<_, AuditError>((evaluation, s.is_completed().then(|| s.summary())))
        })??;

        if let Some(summary) = completed {
            self.record_plan_result(summary);
        }
        Ok(evaluation)
    }

    /// Keep a just-completed session's summary on the plan auditing it.
    fn record_plan_result(&self, summary: SessionSummary) {
        let mut plans = self.plans.lock();
        let session_id = summary.session_id.clone();
        if let Some(plan) = plans
            .values_mut()
            .find(|p| p.current_session_id() == Some(session_id.as_str()))
        {
            plan.record_result(summary);
            tracing::debug!(
                plan_id = %plan.id(),
                session_id = %session_id,
                "Plan category completed"
            );
        };
    }

    pub fn progress(&self, session_id: &str) -> Result<Progress, AuditError> {
        self.registry.with_session(session_id, |s| s.progress())
    }

    pub fn summary(&self, session_id: &str) -> Result<SessionSummary, AuditError> {
        self.registry.with_session(session_id, |s| s.summary())
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, AuditError> {
        self.registry.with_session(session_id, |s| s.snapshot())
    }

    /// Close a session. Unknown ids are ignored.
    ///
    /// Conversations pointing at the session forget it; those outside a plan
    /// are dropped.
    pub fn close_session(&self, session_id: &str) -> bool {
        let closed = self.registry.close(session_id);
        self.conversations.lock().retain(|c| {
            if c.session_id.as_deref() == Some(session_id) {
                c.session_id = None;
            }
            c.session_id.is_some() || c.plan_id.is_some()
        });
        closed
    }

    /// Start a multi-category plan and the session for its first category.
    pub fn start_plan(&self, categories: &[Category]) -> Result<PlanStep, AuditError> {
        let mut plan = AuditPlan::new(categories)?;
        if let Some(missing) = plan
            .categories()
            .iter()
            .find(|c| !self.catalog.contains(**c))
        {
            return Err(AuditError::UnknownCategory {
                category: missing.label().to_string(),
            });
        }

        let first = plan
            .current_category()
            .ok_or_else(|| AuditError::InvalidPlan("plan has no categories".to_string()))?;
        let session = self.start_session(first)?;
        plan.attach_session(session.session_id.clone())?;

        tracing::info!(
            plan_id = %plan.id(),
            categories = plan.categories().len(),
            first = %first,
            "Multi-category audit started"
        );

        let progress = plan.progress();
        self.store_plan(plan);
        Ok(PlanStep::Started {
            plan: progress,
            session,
        })
    }

    /// Move a plan to its next category. The current category's session
    /// must be completed first; once it has, the plan keeps its summary even
    /// if the registry later evicts the session.
    pub fn continue_plan(&self, plan_id: &str) -> Result<PlanStep, AuditError> {
        let mut plan = self.plan(plan_id)?;

        if let Some(session_id) = plan.current_session_id().map(str::to_string) {
            if plan.result_for(&session_id).is_none() {
                let summary = self.summary(&session_id)?;
                if summary.state != SessionState::Completed {
                    return Err(AuditError::InvalidState {
                        operation: "continue to the next category",
                        state: summary.state,
                    });
                }
                plan.record_result(summary);
            }
        }

        let step = match plan.advance() {
            Some(next) => {
                let session = self.start_session(next)?;
                plan.attach_session(session.session_id.clone())?;
                tracing::info!(plan_id = %plan_id, category = %next, "Audit plan advanced");
                PlanStep::Started {
                    plan: plan.progress(),
                    session,
                }
            }
            None => {
                tracing::info!(plan_id = %plan_id, "Audit plan finished");
                PlanStep::Finished {
                    plan: plan.progress(),
                }
            }
        };

        self.store_plan(plan);
        Ok(step)
    }

    fn store_plan(&self, plan: AuditPlan) {
        let dropped = self.plans.lock().insert(plan.id().to_string(), plan);
        for plan_id in dropped {
            tracing::debug!(plan_id = %plan_id, "Least recently used audit plan dropped");
        }
    }

    pub fn plan_progress(&self, plan_id: &str) -> Result<PlanProgress, AuditError> {
        Ok(self.plan(plan_id)?.progress())
    }

    fn plan(&self, plan_id: &str) -> Result<AuditPlan, AuditError> {
        self.plans
            .lock()
            .get(plan_id)
            .cloned()
            .ok_or_else(|| AuditError::PlanNotFound(plan_id.to_string()))
    }

    /// Assessment over every completed session.
    pub fn assessment(&self) -> Result<Assessment, AuditError> {
        Assessment::generate(&self.registry.completed(), &self.policy)
    }

    /// Assessment over a plan's completed sessions, in category order.
    pub fn plan_assessment(&self, plan_id: &str) -> Result<Assessment, AuditError> {
        let plan = self.plan(plan_id)?;
        let summaries: Vec<SessionSummary> = plan
            .session_ids()
            .iter()
            .filter_map(|id| {
                plan.result_for(id).cloned().or_else(|| {
                    self.summary(id)
                        .ok()
                        .filter(|s| s.state == SessionState::Completed)
                })
            })
            .collect();
        Assessment::generate(&summaries, &self.policy)
    }

    /// Route one chat message for a conversation.
    ///
    /// Never fails: errors become [`Reply::Error`].
    pub fn handle_message(&self, conversation_id: &str, message: &str) -> Reply {
        let conversation = self
            .conversations
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();

        let state = conversation
            .session_id
            .as_deref()
            .and_then(|id| self.registry.with_session(id, |s| s.state()).ok());

        let in_interview = matches!(
            state,
            Some(SessionState::Active) | Some(SessionState::AwaitingEvidence)
        );
        let intent = if in_interview {
            Intent::classify_during_session(message)
        } else {
            Intent::classify(message)
        };
        tracing::debug!(conversation = %conversation_id, intent = ?intent, "Chat message routed");

        let result = match intent {
            Intent::Help => Ok(self.help()),
            Intent::Assessment => self.reply_assessment(&conversation),
            Intent::Continue => self.reply_continue(conversation_id, &conversation),
            Intent::StartPlan(categories) => self.reply_start_plan(conversation_id, &categories),
            Intent::Start(category) => self.start_session(category).map(|session| {
                let previous = conversation.session_id.as_deref().filter(|_| in_interview);
                if let Some(previous) = previous {
                    tracing::info!(
                        conversation = %conversation_id,
                        session_id = %previous,
                        "Unfinished session abandoned for a new one"
                    );
                    self.close_session(previous);
                }
                self.remember(conversation_id, Some(session.session_id.clone()), None);
                Reply::SessionStarted {
                    session,
                    plan: None,
                }
            }),
            Intent::Reply(text) => self.reply_answer(&conversation, state, &text),
        };

        result.unwrap_or_else(Reply::from)
    }

    fn help(&self) -> Reply {
        Reply::Help {
            message: "Pick a category to audit, start a multi-category audit \
                      (e.g. 'multi-category audit for Privacy-Enhanced and Safe'), \
                      say 'continue' to move to the next category, or 'generate assessment' \
                      for a report."
                .to_string(),
            categories: self.list_categories(),
        }
    }

    fn remember(&self, conversation_id: &str, session_id: Option<String>, plan_id: Option<String>) {
        let dropped = self.conversations.lock().insert(
            conversation_id.to_string(),
            Conversation {
                session_id,
                plan_id,
            },
        );
        for id in dropped {
            tracing::debug!(conversation = %id, "Least recently used conversation dropped");
        }
    }

    fn plan_progress_for(&self, conversation: &Conversation) -> Option<PlanProgress> {
        conversation
            .plan_id
            .as_deref()
            .and_then(|id| self.plan_progress(id).ok())
    }

    fn reply_assessment(&self, conversation: &Conversation) -> Result<Reply, AuditError> {
        let assessment = match conversation.plan_id.as_deref() {
            Some(plan_id) => self.plan_assessment(plan_id)?,
            None => self.assessment()?,
        };
        Ok(Reply::AssessmentGenerated { assessment })
    }

    fn reply_continue(
        &self,
        conversation_id: &str,
        conversation: &Conversation,
    ) -> Result<Reply, AuditError> {
        let plan_id = conversation.plan_id.clone().ok_or_else(|| {
            AuditError::InvalidPlan("no multi-category audit in progress".to_string())
        })?;

        match self.continue_plan(&plan_id)? {
            PlanStep::Started { plan, session } => {
                self.remember(
                    conversation_id,
                    Some(session.session_id.clone()),
                    Some(plan_id),
                );
                Ok(Reply::SessionStarted {
                    session,
                    plan: Some(plan),
                })
            }
            PlanStep::Finished { plan } => Ok(Reply::PlanFinished { plan }),
        }
    }

    fn reply_start_plan(
        &self,
        conversation_id: &str,
        categories: &[Category],
    ) -> Result<Reply, AuditError> {
        // "all categories" may name categories the catalog has no rows for.
        let available: Vec<Category> = categories
            .iter()
            .copied()
            .filter(|c| self.catalog.contains(*c))
            .collect();

        match self.start_plan(&available)? {
            PlanStep::Started { plan, session } => {
                self.remember(
                    conversation_id,
                    Some(session.session_id.clone()),
                    Some(plan.plan_id.clone()),
                );
                Ok(Reply::SessionStarted {
                    session,
                    plan: Some(plan),
                })
            }
            PlanStep::Finished { plan } => Ok(Reply::PlanFinished { plan }),
        }
    }

    fn reply_answer(
        &self,
        conversation: &Conversation,
        state: Option<SessionState>,
        text: &str,
    ) -> Result<Reply, AuditError> {
        let (Some(session_id), Some(state)) = (conversation.session_id.as_deref(), state) else {
            return Ok(self.help());
        };
        let plan = self.plan_progress_for(conversation);

        match state {
            SessionState::Active => {
                let baseline_evidence = self.record_observation(session_id, text)?;
                let question_id = self
                    .current_question(session_id)?
                    .map(|q| q.question_id)
                    .ok_or_else(|| AuditError::InvalidState {
                        operation: "record an observation",
                        state: SessionState::Completed,
                    })?;
                Ok(Reply::BaselineShown {
                    session_id: session_id.to_string(),
                    question_id,
                    baseline_evidence,
                })
            }
            SessionState::AwaitingEvidence => {
                let evaluation = self.submit_evidence(session_id, text)?;
                let progress = self.progress(session_id)?;
                Ok(Reply::EvidenceEvaluated {
                    session_id: session_id.to_string(),
                    evaluation,
                    progress,
                    next_question: self.current_question(session_id)?,
                    completed: progress.is_complete(),
                    plan,
                })
            }
            SessionState::Completed => Ok(Reply::SessionCompleted {
                summary: self.summary(session_id)?,
                plan,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryConfig;
    use std::thread;
    use std::time::Duration;

    const CATALOG: &str = r#"
- question_id: S1
  category: Safe
  sub_question: "Is a safety case maintained?"
  baseline_evidence: "documented safety case review records"
- question_id: P1
  category: Privacy-Enhanced
  sub_question: "Is a privacy impact assessment performed?"
  baseline_evidence: "signed privacy impact assessment report"
"#;

    fn service() -> AuditService {
        AuditService::new(
            QuestionCatalog::from_yaml_str(CATALOG).unwrap(),
            AuditConfig::default(),
        )
    }

    fn service_with(registry: RegistryConfig) -> AuditService {
        AuditService::new(
            QuestionCatalog::from_yaml_str(CATALOG).unwrap(),
            AuditConfig {
                registry,
                ..Default::default()
            },
        )
    }

    fn answer(service: &AuditService, session_id: &str, evidence: &str) {
        service.record_observation(session_id, "observed").unwrap();
        service.submit_evidence(session_id, evidence).unwrap();
    }

    #[test]
    fn test_unknown_category_creates_no_session() {
        let service = service();
        let err = service.start_session(Category::FairBiasManaged).unwrap_err();
        assert!(matches!(err, AuditError::UnknownCategory { .. }));
        assert!(service.start_session_by_label("Sustainable").is_err());
        assert!(service.registry().is_empty());
    }

    #[test]
    fn test_evidence_before_observation_fails_without_mutation() {
        let service = service();
        let started = service.start_session(Category::Safe).unwrap();

        let err = service
            .submit_evidence(&started.session_id, "records")
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidState { .. }));
        assert!(service.summary(&started.session_id).unwrap().answers.is_empty());
    }

    #[test]
    fn test_unknown_session_and_idempotent_close() {
        let service = service();
        assert!(matches!(
            service.progress("audit_missing"),
            Err(AuditError::SessionNotFound(_))
        ));
        assert!(!service.close_session("audit_missing"));
    }

    #[test]
    fn test_plan_requires_completed_session_to_continue() {
        let service = service();
        let PlanStep::Started { plan, session } = service
            .start_plan(&[Category::Safe, Category::PrivacyEnhanced])
            .unwrap()
        else {
            panic!("plan should start");
        };
        assert_eq!(session.category, Category::Safe);

        let err = service.continue_plan(&plan.plan_id).unwrap_err();
        assert!(matches!(err, AuditError::InvalidState { .. }));

        answer(&service, &session.session_id, "documented safety case review records");
        let PlanStep::Started { session: next, .. } = service.continue_plan(&plan.plan_id).unwrap()
        else {
            panic!("second category should start");
        };
        assert_eq!(next.category, Category::PrivacyEnhanced);

        answer(&service, &next.session_id, "no");
        assert!(matches!(
            service.continue_plan(&plan.plan_id).unwrap(),
            PlanStep::Finished { .. }
        ));

        let assessment = service.plan_assessment(&plan.plan_id).unwrap();
        assert_eq!(assessment.total_evaluations, 2);
        assert_eq!(assessment.compliance_score, 50.0);
    }

    #[test]
    fn test_plan_survives_expiry_of_completed_sessions() {
        let service = service_with(RegistryConfig {
            idle_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let PlanStep::Started { plan, session } = service
            .start_plan(&[Category::Safe, Category::PrivacyEnhanced])
            .unwrap()
        else {
            panic!("plan should start");
        };
        answer(&service, &session.session_id, "documented safety case review records");
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(
            service.summary(&session.session_id),
            Err(AuditError::SessionNotFound(_))
        ));

        let PlanStep::Started { session: next, .. } = service.continue_plan(&plan.plan_id).unwrap()
        else {
            panic!("second category should start");
        };
        assert_eq!(next.category, Category::PrivacyEnhanced);

        // The new category is not done yet, whatever happened to the first.
        let err = service.continue_plan(&plan.plan_id).unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvalidState {
                state: SessionState::Active,
                ..
            }
        ));

        answer(&service, &next.session_id, "no");
        thread::sleep(Duration::from_millis(50));
        assert!(matches!(
            service.continue_plan(&plan.plan_id).unwrap(),
            PlanStep::Finished { .. }
        ));

        let assessment = service.plan_assessment(&plan.plan_id).unwrap();
        assert_eq!(assessment.total_evaluations, 2);
        assert_eq!(assessment.compliance_score, 50.0);
    }

    #[test]
    fn test_plan_session_lost_before_completion_blocks_the_plan() {
        let service = service();
        let PlanStep::Started { plan, session } = service
            .start_plan(&[Category::Safe, Category::PrivacyEnhanced])
            .unwrap()
        else {
            panic!("plan should start");
        };
        service.close_session(&session.session_id);

        assert!(matches!(
            service.continue_plan(&plan.plan_id),
            Err(AuditError::SessionNotFound(_))
        ));
        assert!(matches!(
            service.plan_assessment(&plan.plan_id),
            Err(AuditError::NoCompletedSessions)
        ));
    }

    #[test]
    fn test_plans_are_capped_least_recently_used_first() {
        let service = service_with(RegistryConfig {
            max_sessions: 2,
            ..Default::default()
        });

        let mut plan_ids = Vec::new();
        for _ in 0..3 {
            let PlanStep::Started { plan, session } = service
                .start_plan(&[Category::Safe, Category::PrivacyEnhanced])
                .unwrap()
            else {
                panic!("plan should start");
            };
            // Completed sessions make room for the next plan's session.
            answer(&service, &session.session_id, "documented safety case review records");
            plan_ids.push(plan.plan_id);
        }

        assert_eq!(service.plans.lock().len(), 2);
        assert!(matches!(
            service.plan_progress(&plan_ids[0]),
            Err(AuditError::PlanNotFound(_))
        ));
        assert!(service.plan_progress(&plan_ids[1]).is_ok());
        assert!(service.plan_progress(&plan_ids[2]).is_ok());
    }

    #[test]
    fn test_conversations_are_capped_and_dropped_on_close() {
        let service = service_with(RegistryConfig {
            max_sessions: 2,
            ..Default::default()
        });

        let mut sessions = Vec::new();
        for conversation in ["c1", "c2", "c3"] {
            let Reply::SessionStarted { session, .. } =
                service.handle_message(conversation, "I want to audit safety")
            else {
                panic!("session should start");
            };
            service.handle_message(conversation, "observed");
            service.handle_message(conversation, "documented safety case review records");
            sessions.push(session.session_id);
        }
        assert_eq!(service.conversations.lock().len(), 2);

        assert!(service.close_session(&sessions[2]));
        assert_eq!(service.conversations.lock().len(), 1);
        assert!(!service.close_session(&sessions[2]));
        assert_eq!(service.conversations.lock().len(), 1);
    }

    #[test]
    fn test_switching_category_mid_interview_closes_the_unfinished_session() {
        let service = service();
        let Reply::SessionStarted { session: first, .. } =
            service.handle_message("c1", "I want to audit safety")
        else {
            panic!("session should start");
        };
        assert!(matches!(
            service.handle_message("c1", "we keep one"),
            Reply::BaselineShown { .. }
        ));

        let Reply::SessionStarted { session: second, .. } =
            service.handle_message("c1", "start privacy")
        else {
            panic!("new session should start");
        };
        assert_eq!(second.category, Category::PrivacyEnhanced);
        assert!(matches!(
            service.snapshot(&first.session_id),
            Err(AuditError::SessionNotFound(_))
        ));
        assert_eq!(service.registry().len(), 1);

        // A completed session is kept when the next one starts.
        service.handle_message("c1", "observed");
        service.handle_message("c1", "signed privacy impact assessment report");
        service.handle_message("c1", "audit safety");
        assert!(service.summary(&second.session_id).is_ok());
        assert_eq!(service.registry().len(), 2);
    }

    #[test]
    fn test_plan_with_missing_category_rejected() {
        let service = service();
        let err = service
            .start_plan(&[Category::Safe, Category::FairBiasManaged])
            .unwrap_err();
        assert!(matches!(err, AuditError::UnknownCategory { .. }));
        assert!(service.registry().is_empty());
        assert!(matches!(
            service.continue_plan("plan_missing"),
            Err(AuditError::PlanNotFound(_))
        ));
    }

    #[test]
    fn test_assessment_needs_completed_sessions() {
        let service = service();
        service.start_session(Category::Safe).unwrap();
        assert!(matches!(
            service.assessment(),
            Err(AuditError::NoCompletedSessions)
        ));
    }

    #[test]
    fn test_chat_walks_a_session() {
        let service = service();

        let reply = service.handle_message("c1", "I want to audit safety");
        let Reply::SessionStarted { session, .. } = reply else {
            panic!("expected session start, got {:?}", reply);
        };

        let reply = service.handle_message("c1", "we keep a safety case");
        match reply {
            Reply::BaselineShown {
                baseline_evidence, ..
            } => assert_eq!(baseline_evidence, "documented safety case review records"),
            other => panic!("expected baseline, got {:?}", other),
        }

        // Mentions "safety" and "report" but is evidence, not a command.
        let reply = service.handle_message(
            "c1",
            "documented safety case review records and an annual report",
        );
        match reply {
            Reply::EvidenceEvaluated {
                evaluation,
                completed,
                ..
            } => {
                assert_eq!(evaluation.verdict, crate::ConformityVerdict::Full);
                assert!(completed);
            }
            other => panic!("expected evaluation, got {:?}", other),
        }

        assert_eq!(
            service.summary(&session.session_id).unwrap().state,
            SessionState::Completed
        );
        assert!(matches!(
            service.handle_message("c1", "generate assessment"),
            Reply::AssessmentGenerated { .. }
        ));
    }

    #[test]
    fn test_chat_errors_become_replies() {
        let service = service();
        let reply = service.handle_message("c2", "continue");
        match reply {
            Reply::Error { kind, recoverable, .. } => {
                assert_eq!(kind, "invalid_plan");
                assert!(recoverable);
            }
            other => panic!("expected error reply, got {:?}", other),
        }

        let json = serde_json::to_value(service.handle_message("c2", "help")).unwrap();
        assert_eq!(json["action"], "help");
        assert_eq!(json["categories"][0], "Privacy-Enhanced");
    }

    #[test]
    fn test_chat_all_categories_uses_catalog_categories() {
        let service = service();
        let reply = service.handle_message("c3", "audit all categories");
        let Reply::SessionStarted {
            plan: Some(plan), ..
        } = reply
        else {
            panic!("expected plan start, got {:?}", reply);
        };
        assert_eq!(
            plan.categories,
            vec![Category::PrivacyEnhanced, Category::Safe]
        );
    }
}
