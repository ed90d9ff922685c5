//! Assessment: folds completed sessions into one compliance report.
//!
//! Rules, applied per category after merging sessions of the same category:
//! 1. Compliance score = (full_weight·Full + partial_weight·Partial) / evaluations
//! 2. Risk level from the score: Low ≥ 75, Medium ≥ 50, else High
//! 3. A category is a risk area when its non-conformity rate reaches 30 %
//!    (Low), 50 % (Medium) or 70 % (High)
//! 4. A category is a strength when its full-conformity rate reaches 60 %
//! 5. Each risk area gets its category's remediation block; with no risk
//!    areas a single general block is emitted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::category::Category;
use crate::session::{SessionSummary, VerdictCounts};
use crate::AuditError;

/// Weights and cut-offs used to build an [`Assessment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentPolicy {
    pub full_weight: f64,
    pub partial_weight: f64,

    /// Minimum score for a Low overall risk level
    pub low_risk_score: f64,
    /// Minimum score for a Medium overall risk level
    pub medium_risk_score: f64,

    /// Non-conformity percentages for High / Medium / Low risk areas
    pub high_priority_rate: f64,
    pub medium_priority_rate: f64,
    pub low_priority_rate: f64,

    /// Full-conformity percentage that makes a category a strength
    pub strength_rate: f64,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            full_weight: 100.0,
            partial_weight: 70.0,
            low_risk_score: 75.0,
            medium_risk_score: 50.0,
            high_priority_rate: 70.0,
            medium_priority_rate: 50.0,
            low_priority_rate: 30.0,
            strength_rate: 60.0,
        }
    }
}

impl AssessmentPolicy {
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.partial_weight > self.full_weight {
            return Err(AuditError::Config(
                "partial_weight must not exceed full_weight".to_string(),
            ));
        }
        if self.medium_risk_score > self.low_risk_score {
            return Err(AuditError::Config(
                "medium_risk_score must not exceed low_risk_score".to_string(),
            ));
        }
        if !(self.low_priority_rate <= self.medium_priority_rate
            && self.medium_priority_rate <= self.high_priority_rate)
        {
            return Err(AuditError::Config(
                "priority rates must satisfy low <= medium <= high".to_string(),
            ));
        }
        Ok(())
    }

    fn risk_level(&self, score: f64) -> RiskLevel {
        if score >= self.low_risk_score {
            RiskLevel::Low
        } else if score >= self.medium_risk_score {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    fn priority(&self, non_conformity_rate: f64) -> Option<Priority> {
        if non_conformity_rate >= self.high_priority_rate {
            Some(Priority::High)
        } else if non_conformity_rate >= self.medium_priority_rate {
            Some(Priority::Medium)
        } else if non_conformity_rate >= self.low_priority_rate {
            Some(Priority::Low)
        } else {
            None
        }
    }
}

/// Overall risk derived from the compliance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Urgency of a risk area or recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Per-category totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub sessions: usize,
    pub total_questions: usize,
    pub counts: VerdictCounts,
    pub average_coverage: f64,
}

impl CategoryBreakdown {
    fn rate(&self, count: usize) -> f64 {
        let total = self.counts.total();
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    }

    pub fn non_conformity_rate(&self) -> f64 {
        self.rate(self.counts.no)
    }

    pub fn full_conformity_rate(&self) -> f64 {
        self.rate(self.counts.full)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskArea {
    pub category: Category,
    pub priority: Priority,
    pub non_conformity_rate: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strength {
    pub category: Category,
    pub full_conformity_rate: f64,
    pub reason: String,
}

/// A remediation block. `category` is `None` for the general block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: Option<Category>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub actions: Vec<String>,
}

/// Aggregate report over one or more completed sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Weighted score (0 - 100), one decimal
    pub compliance_score: f64,
    pub risk_level: RiskLevel,
    pub categories_audited: Vec<Category>,
    pub total_questions: usize,
    pub total_evaluations: usize,
    pub distribution: VerdictCounts,
    pub categories: Vec<CategoryBreakdown>,
    pub risk_areas: Vec<RiskArea>,
    pub strengths: Vec<Strength>,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

impl Assessment {
    /// Build a report. Fails when `summaries` is empty.
    pub fn generate(
        summaries: &[SessionSummary],
        policy: &AssessmentPolicy,
    ) -> Result<Self, AuditError> {
        if summaries.is_empty() {
            return Err(AuditError::NoCompletedSessions);
        }

        let categories = breakdown(summaries);

        let mut distribution = VerdictCounts::default();
        for c in &categories {
            distribution.merge(&c.counts);
        }
        let total_evaluations = distribution.total();
        let total_questions = categories.iter().map(|c| c.total_questions).sum();

        let compliance_score = if total_evaluations == 0 {
            0.0
        } else {
            let weighted = distribution.full as f64 * policy.full_weight
                + distribution.partial as f64 * policy.partial_weight;
            round1(weighted / total_evaluations as f64)
        };

        let risk_areas: Vec<RiskArea> = categories
            .iter()
            .filter_map(|c| {
                let rate = c.non_conformity_rate();
                policy.priority(rate).map(|priority| RiskArea {
                    category: c.category,
                    priority,
                    non_conformity_rate: round1(rate),
                    reason: format!(
                        "Non-conformity rate of {:.1}% ({} out of {} questions)",
                        rate,
                        c.counts.no,
                        c.counts.total()
                    ),
                })
            })
            .collect();

        let strengths: Vec<Strength> = categories
            .iter()
            .filter(|c| c.counts.total() > 0 && c.full_conformity_rate() >= policy.strength_rate)
            .map(|c| Strength {
                category: c.category,
                full_conformity_rate: round1(c.full_conformity_rate()),
                reason: format!(
                    "Strong compliance with {:.1}% full conformity rate ({} out of {} questions)",
                    c.full_conformity_rate(),
                    c.counts.full,
                    c.counts.total()
                ),
            })
            .collect();

        let recommendations = recommendations(&risk_areas);
        let risk_level = policy.risk_level(compliance_score);

        tracing::info!(
            sessions = summaries.len(),
            score = compliance_score,
            risk_level = ?risk_level,
            risk_areas = risk_areas.len(),
            "Assessment generated"
        );

        Ok(Self {
            compliance_score,
            risk_level,
            categories_audited: categories.iter().map(|c| c.category).collect(),
            total_questions,
            total_evaluations,
            distribution,
            categories,
            risk_areas,
            strengths,
            recommendations,
            generated_at: Utc::now(),
        })
    }
}

/// Merge sessions by category, in canonical category order.
fn breakdown(summaries: &[SessionSummary]) -> Vec<CategoryBreakdown> {
    let mut by_category: BTreeMap<Category, (CategoryBreakdown, f64)> = BTreeMap::new();

    for summary in summaries {
        let (entry, coverage_sum) = by_category.entry(summary.category).or_insert_with(|| {
            (
                CategoryBreakdown {
                    category: summary.category,
                    sessions: 0,
                    total_questions: 0,
                    counts: VerdictCounts::default(),
                    average_coverage: 0.0,
                },
                0.0,
            )
        });
        entry.sessions += 1;
        entry.total_questions += summary.progress.total;
        entry.counts.merge(&summary.counts);
        *coverage_sum += summary.answers.iter().map(|a| a.coverage).sum::<f64>();
    }

    by_category
        .into_values()
        .map(|(mut c, coverage_sum)| {
            let answered = c.counts.total();
            if answered > 0 {
                c.average_coverage = coverage_sum / answered as f64;
            }
            c
        })
        .collect()
}

fn recommendations(risk_areas: &[RiskArea]) -> Vec<Recommendation> {
    if risk_areas.is_empty() {
        return vec![general_recommendation()];
    }

    risk_areas
        .iter()
        .map(|area| {
            let (title, description, actions) = remediation(area.category);
            Recommendation {
                category: Some(area.category),
                title: title.to_string(),
                description: description.to_string(),
                priority: area.priority,
                actions: actions.into_iter().map(str::to_string).collect(),
            }
        })
        .collect()
}

fn general_recommendation() -> Recommendation {
    Recommendation {
        category: None,
        title: "Continuous AI Governance Improvement".to_string(),
        description: "Maintain the current compliance posture through continuous monitoring \
                      and periodic review of AI governance practices."
            .to_string(),
        priority: Priority::Medium,
        actions: [
            "Establish a recurring AI audit schedule",
            "Monitor compliance continuously between audits",
            "Track emerging AI regulations and guidance",
            "Run periodic AI governance training",
            "Benchmark practices against industry peers",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect(),
    }
}

fn remediation(category: Category) -> (&'static str, &'static str, Vec<&'static str>) {
    match category {
        Category::PrivacyEnhanced => (
            "Strengthen Privacy Controls & Data Protection",
            "Put data minimization, encryption and consent management in place for AI systems.",
            vec![
                "Conduct privacy impact assessments for AI systems",
                "Encrypt data at rest and in transit",
                "Define data retention and deletion policies",
                "Deploy user consent management",
                "Schedule regular privacy compliance audits",
            ],
        ),
        Category::ValidReliable => (
            "Improve Model Validation & Reliability",
            "Strengthen testing and validation so models stay accurate and reliable in production.",
            vec![
                "Adopt documented model testing protocols",
                "Monitor model performance continuously",
                "Version models with a tested rollback path",
                "Revalidate models on a fixed cycle",
                "Detect model drift automatically",
            ],
        ),
        Category::Safe => (
            "Enhance AI Safety & Risk Mitigation",
            "Add safety testing and monitoring that catch harmful outputs before they reach users.",
            vec![
                "Establish safety testing protocols",
                "Monitor system behaviour for safety events in real time",
                "Write and rehearse AI incident response procedures",
                "Deploy automated safety guardrails",
                "Reassess safety risks on a regular schedule",
            ],
        ),
        Category::SecureResilient => (
            "Strengthen Security Posture & Resilience",
            "Protect AI systems from attack and keep them operating through failures.",
            vec![
                "Require multi-factor authentication for AI system access",
                "Segment the network hosting AI infrastructure",
                "Run regular penetration tests",
                "Automate threat detection",
                "Maintain and test disaster recovery procedures",
            ],
        ),
        Category::AccountableTransparent => (
            "Improve Governance & Transparency Framework",
            "Assign clear accountability for AI systems and report on their decisions openly.",
            vec![
                "Define AI governance roles and responsibilities",
                "Keep audit logs for AI decisions",
                "Publish AI decision reporting for stakeholders",
                "Hold regular governance reviews",
                "Set up stakeholder communication channels",
            ],
        ),
        Category::ExplainableInterpretable => (
            "Enhance Model Interpretability & Explainability",
            "Provide explanation tooling and documentation so users understand system outputs.",
            vec![
                "Adopt model explanation tools (e.g. SHAP, LIME)",
                "Offer user-facing explanations of outputs",
                "Document AI decision-making processes",
                "Publish feature importance analyses",
                "Train staff on explainability concepts",
            ],
        ),
        Category::FairBiasManaged => (
            "Address Bias & Ensure AI Fairness",
            "Detect and mitigate bias so outcomes are fair across demographic groups.",
            vec![
                "Test for bias systematically across demographics",
                "Monitor fairness metrics in production",
                "Balance and diversify training data",
                "Set up a bias review and remediation process",
                "Enforce fairness constraints automatically",
            ],
        ),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Progress, SessionState};

    fn summary(category: Category, full: usize, partial: usize, no: usize) -> SessionSummary {
        let total = full + partial + no;
        SessionSummary {
            session_id: format!("audit_{}", category.label()),
            category,
            state: SessionState::Completed,
            progress: Progress {
                completed: total,
                total,
            },
            counts: VerdictCounts { full, partial, no },
            answers: Vec::new(),
            average_coverage: 0.0,
            completion_rate: 100.0,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn test_no_sessions_is_an_error() {
        let result = Assessment::generate(&[], &AssessmentPolicy::default());
        assert!(matches!(result, Err(AuditError::NoCompletedSessions)));
    }

    #[test]
    fn test_all_full_is_low_risk_with_general_recommendation() {
        let assessment =
            Assessment::generate(&[summary(Category::Safe, 4, 0, 0)], &AssessmentPolicy::default())
                .unwrap();

        assert_eq!(assessment.compliance_score, 100.0);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(assessment.risk_areas.is_empty());
        assert_eq!(assessment.strengths.len(), 1);
        assert_eq!(assessment.recommendations.len(), 1);
        assert!(assessment.recommendations[0].category.is_none());
    }

    #[test]
    fn test_weighted_score_and_risk_level() {
        // (100*1 + 70*1) / 3 = 56.67 -> Medium
        let assessment = Assessment::generate(
            &[summary(Category::PrivacyEnhanced, 1, 1, 1)],
            &AssessmentPolicy::default(),
        )
        .unwrap();
        assert_eq!(assessment.compliance_score, 56.7);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert_eq!(assessment.total_evaluations, 3);

        // 33.3 % non-conformity is a Low priority risk area
        assert_eq!(assessment.risk_areas.len(), 1);
        assert_eq!(assessment.risk_areas[0].priority, Priority::Low);
        assert_eq!(
            assessment.recommendations[0].category,
            Some(Category::PrivacyEnhanced)
        );
    }

    #[test]
    fn test_risk_area_priorities() {
        let assessment = Assessment::generate(
            &[
                summary(Category::Safe, 0, 3, 7),
                summary(Category::SecureResilient, 1, 4, 5),
                summary(Category::FairBiasManaged, 6, 2, 2),
            ],
            &AssessmentPolicy::default(),
        )
        .unwrap();

        let priorities: Vec<(Category, Priority)> = assessment
            .risk_areas
            .iter()
            .map(|r| (r.category, r.priority))
            .collect();
        assert_eq!(
            priorities,
            vec![
                (Category::Safe, Priority::High),
                (Category::SecureResilient, Priority::Medium),
            ]
        );
        assert_eq!(assessment.strengths.len(), 1);
        assert_eq!(assessment.strengths[0].category, Category::FairBiasManaged);
        assert_eq!(assessment.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_sessions_of_same_category_are_merged() {
        let assessment = Assessment::generate(
            &[summary(Category::Safe, 2, 0, 0), summary(Category::Safe, 0, 0, 2)],
            &AssessmentPolicy::default(),
        )
        .unwrap();

        assert_eq!(assessment.categories.len(), 1);
        assert_eq!(assessment.categories[0].sessions, 2);
        assert_eq!(assessment.categories_audited, vec![Category::Safe]);
        assert_eq!(assessment.risk_areas[0].priority, Priority::Medium);
        assert_eq!(assessment.compliance_score, 50.0);
    }

    #[test]
    fn test_policy_validation() {
        assert!(AssessmentPolicy::default().validate().is_ok());
        let bad = AssessmentPolicy {
            partial_weight: 120.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
