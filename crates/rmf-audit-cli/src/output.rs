use rmf_audit_core::{Assessment, Evaluation, LoadReport, QuestionRecord, Reply, SessionSummary};
use serde::Serialize;

/// Envelope for every `--json` document.
#[derive(Debug, Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

pub fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    render: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        println!("{}", render(&data));
    }
    Ok(())
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

pub fn question_row(q: &QuestionRecord) -> String {
    format!(
        "{}\t{}\t{}",
        q.question_id, q.control_reference, q.sub_question
    )
}

pub fn evaluation(e: &Evaluation) -> String {
    let mut out = format!(
        "{} (coverage {})\n  {}",
        e.verdict,
        percent(e.coverage),
        e.rationale
    );
    if !e.missing_terms.is_empty() {
        out.push_str(&format!("\n  missing: {}", e.missing_terms.join(", ")));
    }
    out
}

pub fn load_report(r: &LoadReport) -> String {
    let mut out = format!("rows read: {}\nkept: {}", r.rows_read, r.kept);
    for (label, count) in [
        ("dropped (blank question)", r.dropped_blank_question),
        ("dropped (unknown category)", r.dropped_unknown_category),
        ("dropped (duplicate id)", r.dropped_duplicate_id),
        ("dropped (malformed)", r.dropped_malformed),
    ] {
        if count > 0 {
            out.push_str(&format!("\n{}: {}", label, count));
        }
    }
    out
}

pub fn summary(s: &SessionSummary) -> String {
    let mut out = format!(
        "{}\t{}\t{}\t{}/{} answered",
        s.category, s.session_id, s.state, s.progress.completed, s.progress.total
    );
    for answer in &s.answers {
        out.push_str(&format!(
            "\n  {}\t{}\t{}\t{}",
            answer.question_id,
            answer.control_reference,
            answer.verdict,
            answer.rationale
        ));
    }
    out.push_str(&format!(
        "\n  full: {}  partial: {}  no: {}  average coverage: {}",
        s.counts.full,
        s.counts.partial,
        s.counts.no,
        percent(s.average_coverage)
    ));
    out
}

pub fn assessment(a: &Assessment) -> String {
    let mut out = format!(
        "Compliance score: {:.1} ({:?} risk)\nQuestions: {}  Evaluations: {}  Full: {}  Partial: {}  No: {}",
        a.compliance_score,
        a.risk_level,
        a.total_questions,
        a.total_evaluations,
        a.distribution.full,
        a.distribution.partial,
        a.distribution.no
    );

    if !a.risk_areas.is_empty() {
        out.push_str("\n\nRisk areas:");
        for area in &a.risk_areas {
            out.push_str(&format!(
                "\n  [{:?}] {}: {}",
                area.priority, area.category, area.reason
            ));
        }
    }
    if !a.strengths.is_empty() {
        out.push_str("\n\nStrengths:");
        for strength in &a.strengths {
            out.push_str(&format!("\n  {}: {}", strength.category, strength.reason));
        }
    }
    out.push_str("\n\nRecommendations:");
    for rec in &a.recommendations {
        out.push_str(&format!("\n  [{:?}] {}", rec.priority, rec.title));
        for action in &rec.actions {
            out.push_str(&format!("\n    - {}", action));
        }
    }
    out
}

pub fn reply(r: &Reply) -> String {
    match r {
        Reply::Help {
            message,
            categories,
        } => {
            let labels: Vec<&str> = categories.iter().map(|c| c.label()).collect();
            format!("{}\nCategories: {}", message, labels.join(", "))
        }
        Reply::SessionStarted { session, plan } => {
            let mut out = format!(
                "Started {} audit ({} questions, session {})",
                session.category, session.total_questions, session.session_id
            );
            if let Some(plan) = plan {
                out.push_str(&format!(
                    "\nCategory {} of {}",
                    plan.current_index + 1,
                    plan.categories.len()
                ));
            }
            if let Some(q) = &session.question {
                out.push_str(&format!("\n{}", q.sub_question));
            }
            out
        }
        Reply::BaselineShown {
            baseline_evidence, ..
        } => format!("Baseline evidence: {}\nWhat evidence do you have?", baseline_evidence),
        Reply::EvidenceEvaluated {
            evaluation: e,
            progress,
            next_question,
            ..
        } => {
            let mut out = format!(
                "{}\n[{}/{}]",
                evaluation(e),
                progress.completed,
                progress.total
            );
            if let Some(q) = next_question {
                out.push_str(&format!(" {}", q.sub_question));
            }
            out
        }
        Reply::SessionCompleted { summary: s, plan } => {
            let mut out = format!("Audit complete.\n{}", summary(s));
            if plan.as_ref().is_some_and(|p| p.current_index + 1 < p.categories.len()) {
                out.push_str("\nSay 'continue' for the next category.");
            }
            out
        }
        Reply::PlanFinished { plan } => format!(
            "All {} categories audited. Say 'generate assessment' for the report.",
            plan.categories.len()
        ),
        Reply::AssessmentGenerated { assessment: a } => assessment(a),
        Reply::Error { kind, message, .. } => format!("error ({}): {}", kind, message),
    }
}
