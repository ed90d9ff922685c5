//! One user's progression through a category's questions.
//!
//! ```text
//!            record_observation             submit_evidence
//!   Active ──────────────────────▶ AwaitingEvidence ──────────▶ Active
//!     │                                                │
//!     └── (no questions)                     (last question)
//!                 ▼                                    ▼
//!             Completed ◀──────────────────────────────┘
//! ```
//!
//! Every transition is guarded. A rejected call returns
//! [`AuditError::InvalidState`] and leaves the session untouched; evidence is
//! evaluated before anything is mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::{QuestionId, QuestionRecord};
use crate::category::Category;
use crate::evaluator::{ConformityEvaluator, ConformityVerdict, Evaluation};
use crate::AuditError;

/// Where a session is in the observation/evidence cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// A question is waiting for an observation
    Active,
    /// An observation is recorded; evidence for the same question is next
    AwaitingEvidence,
    /// Every question has been answered
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Active => "active",
            SessionState::AwaitingEvidence => "awaiting evidence",
            SessionState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// One answered question. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    #[serde(default)]
    pub control_reference: String,
    pub observation: String,
    pub evidence: String,
    pub verdict: ConformityVerdict,
    pub rationale: String,
    pub coverage: f64,
    #[serde(default)]
    pub assisted: bool,
    pub answered_at: DateTime<Utc>,
}

/// Questions answered versus total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn as_tuple(&self) -> (usize, usize) {
        (self.completed, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Percentage answered; 100 for an empty question list.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Number of answers per verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub full: usize,
    pub partial: usize,
    pub no: usize,
}

impl VerdictCounts {
    pub fn record(&mut self, verdict: ConformityVerdict) {
        match verdict {
            ConformityVerdict::Full => self.full += 1,
            ConformityVerdict::Partial => self.partial += 1,
            ConformityVerdict::No => self.no += 1,
        }
    }

    pub fn get(&self, verdict: ConformityVerdict) -> usize {
        match verdict {
            ConformityVerdict::Full => self.full,
            ConformityVerdict::Partial => self.partial,
            ConformityVerdict::No => self.no,
        }
    }

    pub fn total(&self) -> usize {
        self.full + self.partial + self.no
    }

    pub fn merge(&mut self, other: &VerdictCounts) {
        self.full += other.full;
        self.partial += other.partial;
        self.no += other.no;
    }
}

impl<'a> FromIterator<&'a AnswerRecord> for VerdictCounts {
    fn from_iter<I: IntoIterator<Item = &'a AnswerRecord>>(iter: I) -> Self {
        let mut counts = VerdictCounts::default();
        for answer in iter {
            counts.record(answer.verdict);
        }
        counts
    }
}

/// Read-only view of a session, available at any point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub category: Category,
    pub state: SessionState,
    pub progress: Progress,
    pub counts: VerdictCounts,
    pub answers: Vec<AnswerRecord>,

    /// Mean keyword coverage over answered questions
    pub average_coverage: f64,

    /// Percentage of questions answered
    pub completion_rate: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything needed to persist and inspect a session externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub category: Category,
    pub current_index: usize,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_observation: Option<String>,
    pub answers: Vec<AnswerRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A question awaiting evidence, captured before an out-of-band evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingEvidence {
    /// Index of the question within the session.
    pub position: usize,
    pub question_id: QuestionId,
    pub baseline: String,
}

/// A single audit interview over one category.
#[derive(Debug, Clone)]
pub struct AuditSession {
    id: String,
    category: Category,
    questions: Vec<QuestionRecord>,
    current_index: usize,
    pending_observation: Option<String>,
    answers: Vec<AnswerRecord>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl AuditSession {
    /// Start a session over a snapshot of the category's questions.
    pub fn new(id: impl Into<String>, category: Category, questions: Vec<QuestionRecord>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            category,
            completed_at: questions.is_empty().then_some(now),
            questions,
            current_index: 0,
            pending_observation: None,
            answers: Vec::new(),
            started_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn state(&self) -> SessionState {
        if self.current_index >= self.questions.len() {
            SessionState::Completed
        } else if self.pending_observation.is_some() {
            SessionState::AwaitingEvidence
        } else {
            SessionState::Active
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == SessionState::Completed
    }

    /// The question being asked, or `None` once completed.
    pub fn current_question(&self) -> Option<&QuestionRecord> {
        self.questions.get(self.current_index)
    }

    /// Record the observation for the current question and return the
    /// baseline evidence expected for it.
    pub fn record_observation(&mut self, text: &str) -> Result<&str, AuditError> {
        self.require(SessionState::Active, "record an observation")?;

        self.pending_observation = Some(text.trim().to_string());
        Ok(self
            .current_question()
            .map(|q| q.baseline_evidence.as_str())
            .unwrap_or_default())
    }

    /// The question whose evidence is pending, if any.
    pub fn pending_evidence(&self) -> Option<PendingEvidence> {
        match self.state() {
            SessionState::AwaitingEvidence => {
                self.current_question().map(|q| PendingEvidence {
                    position: self.current_index,
                    question_id: q.question_id.clone(),
                    baseline: q.baseline_evidence.clone(),
                })
            }
            _ => None,
        }
    }

    /// Evaluate and commit evidence for the current question, then advance.
    pub fn submit_evidence(
        &mut self,
        text: &str,
        evaluator: &dyn ConformityEvaluator,
    ) -> Result<Evaluation, AuditError> {
        let baseline = self
            .require(SessionState::AwaitingEvidence, "submit evidence")?
            .baseline_evidence
            .clone();

        let evaluation = evaluator.evaluate(&baseline, text);
        self.commit(text, evaluation)
    }

    /// Commit an evaluation computed elsewhere (e.g. asynchronously).
    ///
    /// `pending` is what [`pending_evidence`](Self::pending_evidence)
    /// returned when evaluation started; if the session has moved to another
    /// question since, nothing is committed.
    pub fn submit_evaluated_evidence(
        &mut self,
        pending: &PendingEvidence,
        text: &str,
        evaluation: Evaluation,
    ) -> Result<Evaluation, AuditError> {
        let question = self.require(SessionState::AwaitingEvidence, "submit evidence")?;
        if self.current_index != pending.position || question.question_id != pending.question_id {
            tracing::warn!(
                session_id = %self.id,
                expected = %pending.question_id,
                current = %question.question_id,
                "Evaluated evidence is for a question that is no longer pending"
            );
            return Err(self.invalid("submit evidence"));
        }
        self.commit(text, evaluation)
    }

    fn commit(&mut self, text: &str, evaluation: Evaluation) -> Result<Evaluation, AuditError> {
        let question = self
            .questions
            .get(self.current_index)
            .ok_or_else(|| self.invalid("submit evidence"))?;
        let observation = self.pending_observation.take().unwrap_or_default();

        self.answers.push(AnswerRecord {
            question_id: question.question_id.clone(),
            control_reference: question.control_reference.clone(),
            observation,
            evidence: text.trim().to_string(),
            verdict: evaluation.verdict,
            rationale: evaluation.rationale.clone(),
            coverage: evaluation.coverage,
            assisted: evaluation.assisted,
            answered_at: Utc::now(),
        });
        self.current_index += 1;

        if self.is_completed() {
            self.completed_at = Some(Utc::now());
            tracing::info!(
                session_id = %self.id,
                category = %self.category,
                answered = self.answers.len(),
                "Audit session completed"
            );
        }

        Ok(evaluation)
    }

    /// Questions answered versus total.
    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.answers.len(),
            total: self.questions.len(),
        }
    }

    /// Answers so far with per-verdict counts. Partial before completion.
    pub fn summary(&self) -> SessionSummary {
        let progress = self.progress();
        let average_coverage = if self.answers.is_empty() {
            0.0
        } else {
            self.answers.iter().map(|a| a.coverage).sum::<f64>() / self.answers.len() as f64
        };

        SessionSummary {
            session_id: self.id.clone(),
            category: self.category,
            state: self.state(),
            progress,
            counts: self.answers.iter().collect(),
            answers: self.answers.clone(),
            average_coverage,
            completion_rate: progress.percent(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            category: self.category,
            current_index: self.current_index,
            state: self.state(),
            pending_observation: self.pending_observation.clone(),
            answers: self.answers.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    /// Current question if the session is in `expected`, else `InvalidState`.
    fn require(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<&QuestionRecord, AuditError> {
        if self.state() != expected {
            return Err(self.invalid(operation));
        }
        self.current_question().ok_or_else(|| self.invalid(operation))
    }

    fn invalid(&self, operation: &'static str) -> AuditError {
        AuditError::InvalidState {
            operation,
            state: self.state(),
        }
    }
}
