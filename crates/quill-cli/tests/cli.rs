//! Integration tests for the quill binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

const WORKSHEET: &str = r#"{"cells": [
    {"kind": "title", "text": "Demo"},
    {"kind": "input", "text": "a: 1"},
    {"kind": "section", "text": "Folded", "folded": true},
    {"kind": "input", "text": "b: 2"},
    {"kind": "text", "text": "prose"},
    {"kind": "input", "text": "c: 3"}
]}"#;

/// Echoes every command, fails on `fail`, asks on `ask`.
const FAKE_ENGINE: &str = r#"
while IFS= read -r line; do
  case "$line" in
    ask*)
      echo "<<question>> Is n an integer?"
      IFS= read -r answer
      echo "<<done>> $answer"
      ;;
    fail*)
      echo "<<error>> bad input"
      echo "<<done>>"
      ;;
    *)
      echo "<<done>> $line"
      ;;
  esac
done
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn quill() -> Command {
    Command::cargo_bin("quill").unwrap()
}

/// `quill run` against the fake engine, isolated from any user config.
fn run_with_fake_engine(dir: &TempDir, worksheet: &Path) -> Command {
    let engine = write(dir, "engine.sh", FAKE_ENGINE);
    let config = write(dir, "config.toml", "");
    let mut cmd = quill();
    cmd.arg("run")
        .arg(worksheet)
        .args(["--engine", "sh", "--engine-arg"])
        .arg(engine)
        .arg("--config")
        .arg(config);
    cmd
}

// =============================================================================
// plan
// =============================================================================

#[test]
fn test_plan_lists_hidden_cells_in_order() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", WORKSHEET);

    quill()
        .arg("plan")
        .arg(&sheet)
        .assert()
        .success()
        .stdout(predicate::str::contains("Evaluation order (3 cells)"))
        .stdout(predicate::str::is_match(r"(?s)a: 1.*b: 2.*c: 3").unwrap());
}

#[test]
fn test_plan_above() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", WORKSHEET);

    quill()
        .args(["plan", "--above", "3"])
        .arg(&sheet)
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 cells)"))
        .stdout(predicate::str::contains("a: 1"))
        .stdout(predicate::str::contains("b: 2").not());
}

#[test]
fn test_plan_rejects_bad_worksheet() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", r#"{"cells": [{"kind": "chart"}]}"#);

    quill()
        .arg("plan")
        .arg(&sheet)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid worksheet"));
}

#[test]
fn test_plan_missing_file() {
    quill()
        .args(["plan", "/definitely/not/a/worksheet.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read worksheet"));
}

// =============================================================================
// run
// =============================================================================

#[cfg(unix)]
#[test]
fn test_run_evaluates_every_input_cell() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", WORKSHEET);

    run_with_fake_engine(&dir, &sheet)
        .assert()
        .success()
        .stdout(predicate::str::contains("a: 1 (succeeded)"))
        .stdout(predicate::str::contains("c: 3 (succeeded)"))
        .stdout(predicate::str::contains(
            "3 succeeded, 0 failed, 0 interrupted, 0 not evaluated",
        ));
}

#[cfg(unix)]
#[test]
fn test_run_reports_failed_cells() {
    let dir = TempDir::new().unwrap();
    let sheet = write(
        &dir,
        "sheet.json",
        r#"{"cells": [
            {"kind": "input", "text": "fail now"},
            {"kind": "input", "text": "ok"}
        ]}"#,
    );

    run_with_fake_engine(&dir, &sheet)
        .assert()
        .failure()
        .stdout(predicate::str::contains("fail now (failed)"))
        .stdout(predicate::str::contains("    bad input"))
        .stdout(predicate::str::contains("1 succeeded, 1 failed"))
        .stderr(predicate::str::contains("1 cells failed"));
}

#[cfg(unix)]
#[test]
fn test_run_answers_questions_from_stdin() {
    let dir = TempDir::new().unwrap();
    let sheet = write(
        &dir,
        "sheet.json",
        r#"{"cells": [{"kind": "input", "text": "ask"}]}"#,
    );

    run_with_fake_engine(&dir, &sheet)
        .write_stdin("yes\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("asks: Is n an integer?"))
        .stdout(predicate::str::contains("    yes"));
}

#[cfg(unix)]
#[test]
fn test_run_without_answer_interrupts() {
    let dir = TempDir::new().unwrap();
    let sheet = write(
        &dir,
        "sheet.json",
        r#"{"cells": [{"kind": "input", "text": "ask"}, {"kind": "input", "text": "x"}]}"#,
    );

    run_with_fake_engine(&dir, &sheet)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Evaluation interrupted"));
}

#[test]
fn test_run_unknown_engine() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", WORKSHEET);
    let config = write(&dir, "config.toml", "");

    quill()
        .arg("run")
        .arg(&sheet)
        .args(["--engine", "quill-no-such-engine-binary", "--config"])
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Engine program not found"));
}

#[test]
fn test_run_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    let sheet = write(&dir, "sheet.json", WORKSHEET);
    let config = write(&dir, "config.toml", "[controller]\non_disconnect = \"sometimes\"\n");

    quill()
        .arg("run")
        .arg(&sheet)
        .arg("--config")
        .arg(config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}
