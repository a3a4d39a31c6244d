//! End-to-end runs of `blink score` against on-disk fixtures.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

mod util;

fn blink(tmp: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("blink").expect("bin");
    cmd.current_dir(tmp.path())
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_score_json_from_linked_feature()
{
    let tmp = util::make_fixture();

    let out = blink(&tmp)
        .args(["score", "--features", "features.json", "--bugs", "bugs.json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let reports: Value = serde_json::from_slice(&out).expect("valid JSON");
    let reports = reports
        .as_array()
        .expect("array");
    assert_eq!(reports.len(), 2);

    let login = &reports[0];
    assert_eq!(login["feature_key"], "FEAT-1");
    assert_eq!(login["total_bugs"], 4);
    assert_eq!(login["open_bugs"], 1);
    assert_eq!(login["resolved_bugs"], 3);
    assert_eq!(login["resolution_rate"], 75.0);
    assert_eq!(login["recent_bugs"], 0);
    assert_eq!(login["quality_grade"], "A");
    let score = login["quality_score"]
        .as_f64()
        .unwrap();
    assert!((score - 91.0625).abs() < 1e-9, "score {score}");
    assert_eq!(login["severity_distribution"]["Major"], 2);
    assert_eq!(login["priority_distribution"]["Lowest"], 1);

    let export = &reports[1];
    assert_eq!(export["feature_key"], "FEAT-2");
    assert_eq!(export["total_bugs"], 0);
    assert_eq!(export["quality_score"], 100.0);
    assert_eq!(export["quality_grade"], "A+");
}

#[test]
fn test_score_relations_override_linked_feature()
{
    let tmp = util::make_fixture();
    tmp.child("links.csv")
        .write_str("Bug ID,Feature\nBUG-5,FEAT-2\nBUG-2,undetermined\nBUG-404,FEAT-2\n")
        .unwrap();

    let out = blink(&tmp)
        .args([
            "score",
            "--features",
            "features.json",
            "--bugs",
            "bugs.json",
            "--relations",
            "links.csv",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let reports: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(reports[0]["total_bugs"], 0);
    assert_eq!(reports[1]["total_bugs"], 1);
    assert_eq!(reports[1]["open_bugs"], 1);
}

#[test]
fn test_score_csv_to_file()
{
    let tmp = util::make_fixture();

    blink(&tmp)
        .args([
            "score",
            "--features",
            "features.json",
            "--bugs",
            "bugs.json",
            "--format",
            "csv",
            "--output",
            "out/report.csv",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 2 feature reports"));

    tmp.child("out/report.csv")
        .assert(predicate::str::starts_with(
            "feature_key,feature_summary,quality_grade,quality_score",
        ))
        .assert(predicate::str::contains("FEAT-2,Data export,A+,100"));
}

#[test]
fn test_score_table_with_summary()
{
    let tmp = util::make_fixture();

    blink(&tmp)
        .args([
            "--no-color",
            "score",
            "--features",
            "features.json",
            "--bugs",
            "bugs.json",
            "--format",
            "table",
            "--summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("FEAT-1").and(predicate::str::contains("Grade")))
        .stderr(predicate::str::contains("Quality summary").and(predicate::str::contains("Features:             2")));
}

#[test]
fn test_score_honors_config_policy()
{
    let tmp = util::make_fixture();
    tmp.child("buglink.toml")
        .write_str("[scoring]\nopen_deduction_factor = 10.0\n")
        .unwrap();

    let out = blink(&tmp)
        .args(["score", "--features", "features.json", "--bugs", "bugs.json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    // 100 - 3 * 10 = 70, damped by 0.96875
    let reports: Value = serde_json::from_slice(&out).unwrap();
    let score = reports[0]["quality_score"]
        .as_f64()
        .unwrap();
    assert!((score - 67.8125).abs() < 1e-9, "score {score}");
    assert_eq!(reports[0]["quality_grade"], "C+");
}

#[test]
fn test_score_missing_input_fails()
{
    let tmp = assert_fs::TempDir::new().unwrap();

    blink(&tmp)
        .args(["score", "--features", "nope.json", "--bugs", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load features"));
}

#[test]
fn test_classify_without_api_key_fails_fast()
{
    let tmp = util::make_fixture();

    blink(&tmp)
        .env_remove("BUGLINK__ORACLE__API_KEY")
        .args(["classify", "--bugs", "bugs.json", "--features", "features.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no oracle API key configured"));
}

#[test]
fn test_init_then_refuse_overwrite()
{
    let tmp = assert_fs::TempDir::new().unwrap();

    blink(&tmp)
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    tmp.child("buglink.toml")
        .assert(predicate::str::contains("[feedback]"));

    blink(&tmp)
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}
