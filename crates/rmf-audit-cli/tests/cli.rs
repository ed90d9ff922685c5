mod common;

use common::TestEnv;
use predicates::str::contains;
use serde_json::Value;

const SCRIPT: &str = r#"
sessions:
  - category: Safe
    answers:
      - observation: We keep a safety case.
        evidence: Documented safety case review records are signed off each release.
      - observation: Drills run quarterly.
        evidence: We keep incident drill logs.
  - category: privacy
    answers:
      - observation: Not yet.
        evidence: nothing yet
      - observation: Some limits exist.
        evidence: a retention policy exists
"#;

#[test]
fn test_categories_lists_only_categories_with_questions() {
    let env = TestEnv::new();
    let out = env.run_json(&["categories"]);

    assert_eq!(out["ok"], true);
    let rows = out["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["category"], "Privacy-Enhanced");
    assert_eq!(rows[0]["questions"], 2);
    assert_eq!(rows[1]["category"], "Safe");
}

#[test]
fn test_questions_in_source_order() {
    let env = TestEnv::new();
    let out = env.run_json(&["questions", "safety"]);

    let rows = out["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["question_id"], "S1");
    assert_eq!(rows[1]["control_reference"], "MANAGE 4.1");
}

#[test]
fn test_questions_unknown_category_fails() {
    let env = TestEnv::new();
    env.cmd()
        .args(["questions", "Quantum Ready"])
        .assert()
        .failure()
        .stderr(contains("Unknown category"));
}

#[test]
fn test_validate_reports_dropped_rows() {
    let env = TestEnv::new();
    let out = env.run_json(&["validate"]);

    assert_eq!(out["data"]["rows_read"], 5);
    assert_eq!(out["data"]["kept"], 4);
    assert_eq!(out["data"]["dropped_unknown_category"], 1);
}

#[test]
fn test_validate_missing_questionnaire_fails() {
    let env = TestEnv::new();
    std::fs::remove_file(&env.questionnaire).unwrap();
    env.cmd()
        .arg("validate")
        .assert()
        .failure()
        .stderr(contains("loading questionnaire"));
}

#[test]
fn test_score_full_conformity() {
    let env = TestEnv::new();
    let out = env.run_json(&[
        "score",
        "--baseline",
        "documented safety case review records",
        "--evidence",
        "We have documented safety case review records on file.",
    ]);

    assert_eq!(out["data"]["verdict"], "full");
    assert_eq!(out["data"]["coverage"], 1.0);
    assert_eq!(out["data"]["assisted"], false);
}

#[test]
fn test_score_empty_evidence() {
    let env = TestEnv::new();
    let out = env.run_json(&[
        "score",
        "--baseline",
        "documented safety case review records",
        "--evidence",
        "   ",
    ]);

    assert_eq!(out["data"]["verdict"], "no");
    assert_eq!(out["data"]["rationale"], "no evidence provided.");
}

#[test]
fn test_score_threshold_override() {
    let env = TestEnv::new();
    let args = [
        "score",
        "--baseline",
        "documented safety case review records",
        "--evidence",
        "documented safety case",
    ];

    let out = env.run_json(&args);
    assert_eq!(out["data"]["verdict"], "full");

    let mut strict = vec!["--full-threshold", "0.8"];
    strict.extend_from_slice(&args);
    let out = env.run_json(&strict);
    assert_eq!(out["data"]["verdict"], "partial");
}

#[test]
fn test_inverted_thresholds_rejected() {
    let env = TestEnv::new();
    env.cmd()
        .args(["--full-threshold", "0.2", "--partial-threshold", "0.5", "validate"])
        .assert()
        .failure()
        .stderr(contains("Invalid configuration"));
}

#[test]
fn test_bad_config_file_rejected() {
    let env = TestEnv::new();
    let config = env.write("audit.yaml", "scoring:\n  full_threshold: 1.5\n");
    env.cmd()
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .assert()
        .failure()
        .stderr(contains("loading config"));
}

#[test]
fn test_config_file_applies_thresholds() {
    let env = TestEnv::new();
    let config = env.write(
        "audit.json",
        r#"{"scoring": {"full_threshold": 0.9, "partial_threshold": 0.5}}"#,
    );
    let out = env.run_json(&[
        "--config",
        config.to_str().unwrap(),
        "score",
        "--baseline",
        "documented safety case review records",
        "--evidence",
        "documented safety case review",
    ]);
    assert_eq!(out["data"]["verdict"], "partial");
}

#[test]
fn test_interview_from_stdin() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "interview", "Safe"])
        .write_stdin(
            "yes we do\n\
             documented safety case review records\n\
             \n\
             quarterly\n\
             incident drill logs and schedule\n",
        )
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(out["data"]["state"], "completed");
    assert_eq!(out["data"]["counts"]["full"], 2);
    assert_eq!(out["data"]["answers"][0]["observation"], "yes we do");
}

#[test]
fn test_interview_blank_evidence_line_submits_no_evidence() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "interview", "Safe"])
        .write_stdin(
            "we keep one
             
             quarterly
             incident drill logs and schedule
",
        )
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(out["data"]["state"], "completed");
    assert_eq!(out["data"]["counts"]["no"], 1);
    assert_eq!(out["data"]["counts"]["full"], 1);
    let first = &out["data"]["answers"][0];
    assert_eq!(first["observation"], "we keep one");
    assert_eq!(first["evidence"], "");
    assert_eq!(first["rationale"], "no evidence provided.");
    assert_eq!(out["data"]["answers"][1]["observation"], "quarterly");
}

#[test]
fn test_interview_stops_at_end_of_input() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "interview", "Safe"])
        .write_stdin("we keep one\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let out: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(out["data"]["state"], "awaiting_evidence");
    assert_eq!(out["data"]["progress"]["completed"], 0);
}

#[test]
fn test_interview_human_output() {
    let env = TestEnv::new();
    env.cmd()
        .args(["interview", "Safe"])
        .write_stdin("yes\ndocumented safety case review records\n")
        .assert()
        .success()
        .stdout(contains("Is a safety case maintained for the system?"))
        .stdout(contains("Baseline evidence: documented safety case review records"))
        .stdout(contains("Full Conformity"));
}

#[test]
fn test_replay_summaries() {
    let env = TestEnv::new();
    let script = env.write("audit.yaml", SCRIPT);
    let out = env.run_json(&["replay", script.to_str().unwrap()]);

    let sessions = out["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["category"], "Safe");
    assert_eq!(sessions[0]["counts"]["full"], 2);
    assert_eq!(sessions[1]["category"], "Privacy-Enhanced");
    assert_eq!(sessions[1]["counts"]["no"], 1);
    assert_eq!(sessions[1]["counts"]["partial"], 1);
}

#[test]
fn test_replay_too_many_answers_fails() {
    let env = TestEnv::new();
    let script = env.write(
        "long.json",
        r#"{"sessions": [{"category": "Safe", "answers": [
            {"observation": "a", "evidence": "b"},
            {"observation": "c", "evidence": "d"},
            {"observation": "e", "evidence": "f"}
        ]}]}"#,
    );
    env.cmd()
        .args(["replay", script.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("more answers than the category has questions"));
}

#[test]
fn test_assess_scores_completed_sessions() {
    let env = TestEnv::new();
    let script = env.write("audit.yaml", SCRIPT);
    let out = env.run_json(&["assess", script.to_str().unwrap()]);
    let data = &out["data"];

    // (2 * 100 + 1 * 70) / 4
    assert_eq!(data["compliance_score"], 67.5);
    assert_eq!(data["risk_level"], "Medium");
    assert_eq!(data["total_evaluations"], 4);
    assert_eq!(data["risk_areas"][0]["category"], "Privacy-Enhanced");
    assert_eq!(data["strengths"][0]["category"], "Safe");
}

#[test]
fn test_assess_without_completed_sessions_fails() {
    let env = TestEnv::new();
    let script = env.write("empty.yaml", "sessions:\n  - category: Safe\n");
    env.cmd()
        .args(["assess", script.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("No completed audit sessions"));
}

#[test]
fn test_chat_emits_one_reply_per_line() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "chat"])
        .write_stdin(
            "help\n\
             I'd like to audit safety\n\
             we keep one\n\
             documented safety case review records\n",
        )
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(out).unwrap();
    let replies: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let actions: Vec<&str> = replies
        .iter()
        .map(|r| r["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        actions,
        ["help", "session_started", "baseline_shown", "evidence_evaluated"]
    );
    assert_eq!(replies[3]["evaluation"]["verdict"], "full");
    assert_eq!(replies[3]["completed"], false);
}

#[test]
fn test_chat_errors_are_replies() {
    let env = TestEnv::new();
    env.cmd()
        .args(["--json", "chat"])
        .write_stdin("generate assessment\n")
        .assert()
        .success()
        .stdout(contains("\"action\":\"error\""))
        .stdout(contains("no_completed_sessions"));
}

#[cfg(not(feature = "assisted"))]
#[test]
fn test_assisted_requires_feature() {
    let env = TestEnv::new();
    env.cmd()
        .args([
            "score",
            "--baseline",
            "documented safety case review records",
            "--evidence",
            "records",
            "--assisted",
        ])
        .assert()
        .failure()
        .stderr(contains("`assisted` feature"));
}
