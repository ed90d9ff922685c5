//! Scripted audits for `replay` and `assess`.
//!
//! ```yaml
//! sessions:
//!   - category: Safe
//!     answers:
//!       - observation: We keep a safety case.
//!         evidence: Signed safety case review records for every release.
//! ```

use anyhow::{bail, Context};
use rmf_audit_core::{AuditService, SessionSummary};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::commands::Scorer;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditScript {
    pub sessions: Vec<ScriptedSession>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedSession {
    pub category: String,
    #[serde(default)]
    pub answers: Vec<ScriptedAnswer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedAnswer {
    pub observation: String,
    pub evidence: String,
}

impl AuditScript {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;

        let script: AuditScript = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => bail!("{}: expected a .json, .yaml or .yml script", path.display()),
        };
        Ok(script)
    }
}

/// Run every scripted session through the service, in order.
///
/// A session with fewer answers than questions is left in progress.
pub async fn replay(
    service: &AuditService,
    scorer: &Scorer,
    script: &AuditScript,
) -> anyhow::Result<Vec<SessionSummary>> {
    let mut summaries = Vec::with_capacity(script.sessions.len());

    for (index, scripted) in script.sessions.iter().enumerate() {
        let started = service
            .start_session_by_label(&scripted.category)
            .with_context(|| format!("script session {}", index + 1))?;
        let id = started.session_id;

        for answer in &scripted.answers {
            if service.current_question(&id)?.is_none() {
                bail!(
                    "script session {} ({}) has more answers than the category has questions",
                    index + 1,
                    started.category
                );
            }
            service.record_observation(&id, &answer.observation)?;
            scorer.submit(service, &id, &answer.evidence).await?;
        }

        summaries.push(service.summary(&id)?);
    }

    Ok(summaries)
}
