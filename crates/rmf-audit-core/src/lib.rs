//! # rmf-audit-core
//!
//! Deterministic engine for guided AI RMF conformity audits.
//!
//! A user picks one of the seven trustworthiness characteristics, is walked
//! through that category's sub-questions, records an observation, sees the
//! baseline evidence expected for the question, submits evidence, and gets a
//! conformity verdict for it.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the reference scoring is a pure keyword heuristic
//! 2. **No network calls**: only catalog loading touches the filesystem
//! 3. **Guarded transitions**: out-of-order calls are rejected, never half-applied
//! 4. **Isolated sessions**: sessions never share mutable state
//!
//! ## Example
//!
//! ```rust,ignore
//! use rmf_audit_core::{AuditService, Category, QuestionCatalog};
//!
//! let catalog = QuestionCatalog::from_path("questionnaire.yaml")?;
//! let service = AuditService::new(catalog, Default::default());
//!
//! let started = service.start_session(Category::Safe)?;
//! let baseline = service.record_observation(&started.session_id, "We keep a safety case.")?;
//! let evaluation = service.submit_evidence(&started.session_id, "Signed safety case review records.")?;
//! println!("{}: {}", evaluation.verdict, evaluation.rationale);
//! ```

pub mod assessment;
pub mod catalog;
pub mod category;
pub mod config;
pub mod evaluator;
pub mod intent;
pub mod plan;
pub mod registry;
pub mod service;
pub mod session;

// Re-export main types at crate root
pub use assessment::{
    Assessment, AssessmentPolicy, CategoryBreakdown, Priority, Recommendation, RiskArea,
    RiskLevel, Strength,
};
pub use catalog::{CatalogError, LoadReport, QuestionCatalog, QuestionId, QuestionRecord};
pub use category::Category;
pub use config::AuditConfig;
pub use evaluator::{
    ConformityEvaluator, ConformityVerdict, Evaluation, KeywordEvaluator, ScoringConfig,
};
pub use intent::Intent;
pub use plan::{AuditPlan, PlanProgress};
pub use registry::{RegistryConfig, SessionHandle, SessionRegistry};
pub use service::{AuditService, PlanStep, Reply, SessionStarted};
pub use session::{
    AnswerRecord, AuditSession, PendingEvidence, Progress, SessionSnapshot, SessionState,
    SessionSummary, VerdictCounts,
};

use thiserror::Error;

/// Errors surfaced by the audit engine.
///
/// Only [`AuditError::DataSource`] and [`AuditError::Config`] are fatal at
/// startup; everything else is a per-request error that leaves catalog and
/// registry state untouched.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Question catalog unavailable: {0}")]
    DataSource(#[from] CatalogError),

    #[error("Unknown category: '{category}'")]
    UnknownCategory { category: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Session capacity exceeded ({max} live sessions)")]
    CapacityExceeded { max: usize },

    #[error("Audit plan not found: {0}")]
    PlanNotFound(String),

    #[error("Invalid audit plan: {0}")]
    InvalidPlan(String),

    #[error("No completed audit sessions to assess")]
    NoCompletedSessions,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AuditError {
    /// Whether the caller can recover by retrying with corrected input or
    /// by starting a new session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuditError::DataSource(_) | AuditError::Config(_))
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::DataSource(_) => "data_source",
            AuditError::UnknownCategory { .. } => "unknown_category",
            AuditError::SessionNotFound(_) => "session_not_found",
            AuditError::InvalidState { .. } => "invalid_state",
            AuditError::CapacityExceeded { .. } => "capacity_exceeded",
            AuditError::PlanNotFound(_) => "plan_not_found",
            AuditError::InvalidPlan(_) => "invalid_plan",
            AuditError::NoCompletedSessions => "no_completed_sessions",
            AuditError::Config(_) => "config",
        }
    }
}
