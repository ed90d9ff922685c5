//! Conversational intent routing.
//!
//! Outside an interview any mention counts: "I'd like to audit safety"
//! starts a Safe session. During an interview free text is an answer, so
//! only whole-message commands ("help", "continue", "start privacy", ...)
//! are routed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::Category;

lazy_static! {
    static ref ASSESSMENT: Regex = Regex::new(r"(?i)\b(assessment|results|report)\b").unwrap();
    static ref CONTINUE: Regex = Regex::new(r"(?i)\b(continue|next|proceed|move on)\b").unwrap();
    static ref MULTI: Regex =
        Regex::new(r"(?i)\b(multi|multiple|several|batch|all (seven |7 )?categories)\b").unwrap();
    static ref ALL_CATEGORIES: Regex = Regex::new(r"(?i)\ball (seven |7 )?categories\b").unwrap();
    static ref HELP: Regex = Regex::new(r"(?i)^\s*(help|\?|menu)?\s*[.!?]*\s*$").unwrap();

    // Whole-message commands recognised mid-interview.
    static ref CMD_ASSESSMENT: Regex =
        Regex::new(r"(?i)^\s*(generate |show )?(the )?(assessment|results|report)\s*[.!]*\s*$").unwrap();
    static ref CMD_CONTINUE: Regex =
        Regex::new(r"(?i)^\s*(continue|next|next category|proceed|move on)\s*[.!]*\s*$").unwrap();
    static ref CMD_START: Regex = Regex::new(r"(?i)^\s*(start|audit|switch to)\s+(?P<rest>.+)$").unwrap();
}

/// What a chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "value", rename_all = "snake_case")]
pub enum Intent {
    Help,
    Assessment,
    Continue,
    StartPlan(Vec<Category>),
    Start(Category),
    Reply(String),
}

impl Intent {
    /// Classify a message sent outside an interview.
    pub fn classify(message: &str) -> Intent {
        if HELP.is_match(message) {
            return Intent::Help;
        }
        if ASSESSMENT.is_match(message) {
            return Intent::Assessment;
        }
        if CONTINUE.is_match(message) {
            return Intent::Continue;
        }
        Self::classify_start(message).unwrap_or_else(|| Intent::Reply(message.trim().to_string()))
    }

    /// Classify a message sent while an interview is waiting for an answer.
    pub fn classify_during_session(message: &str) -> Intent {
        if HELP.is_match(message) {
            return Intent::Help;
        }
        if CMD_ASSESSMENT.is_match(message) {
            return Intent::Assessment;
        }
        if CMD_CONTINUE.is_match(message) {
            return Intent::Continue;
        }
        CMD_START
            .captures(message)
            .and_then(|caps| caps.name("rest"))
            .and_then(|rest| Self::classify_start(rest.as_str()))
            .unwrap_or_else(|| Intent::Reply(message.trim().to_string()))
    }

    fn classify_start(message: &str) -> Option<Intent> {
        if MULTI.is_match(message) {
            let categories = if ALL_CATEGORIES.is_match(message) {
                Category::ALL.to_vec()
            } else {
                Category::mentioned_in(message)
            };
            if categories.len() >= 2 {
                return Some(Intent::StartPlan(categories));
            }
        }

        Category::mentioned_in(message)
            .first()
            .map(|category| Intent::Start(*category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help() {
        assert_eq!(Intent::classify(""), Intent::Help);
        assert_eq!(Intent::classify("  help? "), Intent::Help);
        assert_eq!(Intent::classify_during_session("help"), Intent::Help);
    }

    #[test]
    fn test_assessment_and_continue() {
        assert_eq!(Intent::classify("please generate assessment"), Intent::Assessment);
        assert_eq!(Intent::classify("show me the results"), Intent::Assessment);
        assert_eq!(Intent::classify("ok, next category"), Intent::Continue);
        assert_eq!(Intent::classify("let's move on"), Intent::Continue);
    }

    #[test]
    fn test_single_category() {
        assert_eq!(
            Intent::classify("I want to audit safety"),
            Intent::Start(Category::Safe)
        );
        assert_eq!(
            Intent::classify("Explainable and Interpretable please"),
            Intent::Start(Category::ExplainableInterpretable)
        );
        assert_eq!(
            Intent::classify("check for bias"),
            Intent::Start(Category::FairBiasManaged)
        );
    }

    #[test]
    fn test_multi_category() {
        assert_eq!(
            Intent::classify("multi-category audit for Privacy-Enhanced and Safe"),
            Intent::StartPlan(vec![Category::PrivacyEnhanced, Category::Safe])
        );
        assert_eq!(
            Intent::classify("audit all categories"),
            Intent::StartPlan(Category::ALL.to_vec())
        );
    }

    #[test]
    fn test_multi_with_one_category_starts_single() {
        assert_eq!(
            Intent::classify("multiple questions about privacy"),
            Intent::Start(Category::PrivacyEnhanced)
        );
    }

    #[test]
    fn test_unrecognised_is_reply() {
        assert_eq!(
            Intent::classify("  we keep quarterly logs "),
            Intent::Reply("we keep quarterly logs".to_string())
        );
    }

    #[test]
    fn test_answers_mid_interview_are_not_commands() {
        let evidence = "the signed safety report is reviewed before we proceed";
        assert_eq!(
            Intent::classify_during_session(evidence),
            Intent::Reply(evidence.to_string())
        );
        assert_eq!(Intent::classify_during_session("Next."), Intent::Continue);
        assert_eq!(
            Intent::classify_during_session("generate assessment"),
            Intent::Assessment
        );
        assert_eq!(
            Intent::classify_during_session("start privacy"),
            Intent::Start(Category::PrivacyEnhanced)
        );
        assert_eq!(
            Intent::classify_during_session("audit logs are kept"),
            Intent::Reply("audit logs are kept".to_string())
        );
    }
}
