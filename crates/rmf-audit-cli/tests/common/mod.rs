#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const QUESTIONNAIRE: &str = r#"
version: "2024-06"
questions:
  - question_id: S1
    category: Safe
    control_reference: MANAGE 2.3
    sub_question: Is a safety case maintained for the system?
    baseline_evidence: documented safety case review records
  - question_id: S2
    category: Safe
    control_reference: MANAGE 4.1
    sub_question: Are incident response drills performed?
    baseline_evidence: incident drill logs and schedule
  - question_id: P1
    category: Privacy-Enhanced
    control_reference: MAP 2.1
    sub_question: Is a privacy impact assessment performed?
    baseline_evidence: signed privacy impact assessment report
  - question_id: P2
    category: Privacy-Enhanced
    control_reference: MEASURE 2.10
    sub_question: Are data retention limits enforced?
    baseline_evidence: retention policy with deletion audit logs
  - question_id: X1
    category: Quantum Ready
    control_reference: GOVERN 9.9
    sub_question: Is this row dropped?
    baseline_evidence: nothing
"#;

pub struct TestEnv {
    tmp: TempDir,
    pub questionnaire: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let questionnaire = tmp.path().join("questionnaire.yaml");
        fs::write(&questionnaire, QUESTIONNAIRE).expect("write questionnaire");
        Self { tmp, questionnaire }
    }

    pub fn dir(&self) -> &Path {
        self.tmp.path()
    }

    /// Write a file into the temp dir and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("rmf-audit");
        cmd.current_dir(self.tmp.path())
            .env_remove("RUST_LOG")
            .env_remove("ANTHROPIC_API_KEY")
            .arg("--questionnaire")
            .arg(&self.questionnaire);
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }
}
