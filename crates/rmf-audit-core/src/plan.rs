//! Multi-category audit plans.
//!
//! A plan audits two or more categories one after another, with one session
//! per category. The sessions themselves live in the registry; the plan
//! tracks order and session ids, and keeps the summary of each category's
//! session once it completes, so that later registry eviction does not lose
//! finished work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::session::{SessionState, SessionSummary};
use crate::AuditError;

/// An ordered, sequential multi-category audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPlan {
    id: String,
    categories: Vec<Category>,
    current_index: usize,
    session_ids: Vec<String>,
    #[serde(default)]
    results: Vec<SessionSummary>,
    created_at: DateTime<Utc>,
}

/// Where a plan stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub plan_id: String,
    pub categories: Vec<Category>,

    /// Zero-based index of the category being audited
    pub current_index: usize,
    pub current_category: Option<Category>,

    /// Session ids in category order, one per category started so far
    pub session_ids: Vec<String>,
    pub finished: bool,
}

impl AuditPlan {
    /// Create a plan. Duplicates are dropped (first occurrence wins); at
    /// least two distinct categories are required.
    pub fn new(categories: &[Category]) -> Result<Self, AuditError> {
        let mut unique: Vec<Category> = Vec::with_capacity(categories.len());
        for category in categories {
            if !unique.contains(category) {
                unique.push(*category);
            }
        }

        if unique.len() < 2 {
            return Err(AuditError::InvalidPlan(format!(
                "a multi-category audit needs at least 2 distinct categories, got {}",
                unique.len()
            )));
        }

        let hex = Uuid::new_v4().simple().to_string();
        Ok(Self {
            id: format!("plan_{}", &hex[..16]),
            categories: unique,
            current_index: 0,
            session_ids: Vec::new(),
            results: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn session_ids(&self) -> &[String] {
        &self.session_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn current_category(&self) -> Option<Category> {
        self.categories.get(self.current_index).copied()
    }

    /// Session started for the current category, if any.
    pub fn current_session_id(&self) -> Option<&str> {
        if self.is_finished() {
            return None;
        }
        self.session_ids.get(self.current_index).map(String::as_str)
    }

    /// Record the session started for the current category.
    pub fn attach_session(&mut self, session_id: impl Into<String>) -> Result<(), AuditError> {
        if self.is_finished() {
            return Err(AuditError::InvalidPlan(format!(
                "plan {} has no category left to audit",
                self.id
            )));
        }
        if self.session_ids.len() != self.current_index {
            return Err(AuditError::InvalidPlan(format!(
                "plan {} already has a session for {}",
                self.id, self.categories[self.current_index]
            )));
        }
        self.session_ids.push(session_id.into());
        Ok(())
    }

    /// Keep the summary of one of this plan's sessions. Only completed
    /// sessions are kept, once each; returns whether the summary was taken.
    pub fn record_result(&mut self, summary: SessionSummary) -> bool {
        if summary.state != SessionState::Completed
            || !self.session_ids.contains(&summary.session_id)
            || self.result_for(&summary.session_id).is_some()
        {
            return false;
        }
        self.results.push(summary);
        true
    }

    pub fn result_for(&self, session_id: &str) -> Option<&SessionSummary> {
        self.results.iter().find(|r| r.session_id == session_id)
    }

    /// Summaries of completed sessions, in completion order.
    pub fn results(&self) -> &[SessionSummary] {
        &self.results
    }

    /// Move to the next category. Returns it, or `None` when the plan is done.
    pub fn advance(&mut self) -> Option<Category> {
        if !self.is_finished() {
            self.current_index += 1;
        }
        self.current_category()
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.categories.len()
    }

    pub fn progress(&self) -> PlanProgress {
        PlanProgress {
            plan_id: self.id.clone(),
            categories: self.categories.clone(),
            current_index: self.current_index,
            current_category: self.current_category(),
            session_ids: self.session_ids.clone(),
            finished: self.is_finished(),
        }
    }
}
