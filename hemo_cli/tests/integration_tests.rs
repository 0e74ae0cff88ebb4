//! Integration tests for the hemo binary.
//!
//! These tests verify end-to-end behavior including:
//! - Recording a study and reading it back
//! - Quick mode never touching disk
//! - Trends and CSV export across studies
//! - Concurrent recorders writing distinct studies

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hemo"))
}

fn record(data_dir: &Path, patient: &str, study: &str, entries: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cli();
    cmd.arg("record")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--patient")
        .arg(patient)
        .arg("--study")
        .arg(study);
    for entry in entries {
        cmd.arg("--entry").arg(entry);
    }
    cmd.assert()
}

fn show_json(data_dir: &Path, study: &str) -> serde_json::Value {
    let output = cli()
        .arg("show")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--study")
        .arg(study)
        .output()
        .expect("Failed to run show");
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).expect("show should print JSON")
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hemodynamics workshop recorder"));
}

#[test]
fn test_record_then_show() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    record(
        data_dir,
        "p1",
        "s1",
        &["fick:co_lmin=5.2,bsa_m2=1.8", "svr:map_mmhg=85,cvp_mmhg=10,svr_wood=14.3,svr_units=wu"],
    )
    .success()
    .stdout(predicate::str::contains("Saved study s1"))
    .stdout(predicate::str::contains("Missing calculators: pvr, cpo, papi"));

    assert!(data_dir.join("studies/s1.json").exists());

    let row = show_json(data_dir, "s1");
    assert_eq!(row["patient_id"], "p1");
    assert_eq!(row["co_lmin"], 5.2);
    let ci = row["ci_lmin_m2"].as_f64().unwrap();
    assert!((ci - 2.89).abs() < 0.01);
    assert_eq!(row["svr_units"], "WOOD");
    let svr_dyn = row["svr_dyn"].as_f64().unwrap();
    assert!((svr_dyn - 1144.0).abs() < 1e-6);
    assert_eq!(row["workshop_complete"], false);
    assert_eq!(row["vocabulary_version"], 1);
}

#[test]
fn test_rerecord_preserves_created_at() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    record(data_dir, "p1", "s1", &["fick:co_lmin=5.2"]).success();
    let first = show_json(data_dir, "s1");

    record(data_dir, "p1", "s1", &["fick:co_lmin=4.8"]).success();
    let second = show_json(data_dir, "s1");

    assert_eq!(second["created_at_millis"], first["created_at_millis"]);
    assert_eq!(second["id"], first["id"]);
    assert!(second["updated_at_millis"].as_i64() > first["updated_at_millis"].as_i64());
    assert_eq!(second["co_lmin"], 4.8);
}

#[test]
fn test_complete_workshop() {
    let temp_dir = setup_test_dir();

    record(
        temp_dir.path(),
        "p1",
        "s1",
        &[
            "fick:co_lmin=5.0,bsa_m2=2.0",
            "svr:svr_wood=15",
            "pvr:pvr_wood=2.5,mpap_mmhg=30,pawp_mmhg=12",
            "cpo:cpo_w=0.9",
            "papi:papi=1.5,rap_mmhg=8",
        ],
    )
    .success()
    .stdout(predicate::str::contains("Workshop complete"));

    let row = show_json(temp_dir.path(), "s1");
    assert_eq!(row["workshop_complete"], true);
    assert_eq!(row["calc_types"].as_array().unwrap().len(), 5);
}

#[test]
fn test_quick_mode_does_not_save() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .arg("record")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--quick")
        .arg("--entry")
        .arg("fick:co_lmin=5.2,bsa_m2=1.8")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quick mode"))
        .stdout(predicate::str::contains("ci_lmin_m2"));

    assert!(!data_dir.join("studies").exists());
}

#[test]
fn test_unknown_key_rejected() {
    let temp_dir = setup_test_dir();

    record(temp_dir.path(), "p1", "s1", &["fick:cardiac_output=5.2"])
        .failure()
        .stderr(predicate::str::contains("cardiac_output"));

    assert!(!temp_dir.path().join("studies/s1.json").exists());
}

#[test]
fn test_implausible_value_rejected() {
    let temp_dir = setup_test_dir();

    record(temp_dir.path(), "p1", "s1", &["fick:co_lmin=45"])
        .failure()
        .stderr(predicate::str::contains("co_lmin"));
}

#[test]
fn test_show_missing_study_fails() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("show")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--study")
        .arg("nope")
        .assert()
        .failure();
}

#[test]
fn test_trends_across_studies() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    record(data_dir, "p1", "s1", &["pvr:mpap_mmhg=25,pawp_mmhg=12,pvr_wood=3"]).success();
    std::thread::sleep(std::time::Duration::from_millis(20));
    record(data_dir, "p1", "s2", &["pvr:mpap_mmhg=32,pawp_mmhg=12,pvr_wood=4.5"]).success();

    cli()
        .arg("trends")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--patient")
        .arg("p1")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 studies"))
        .stdout(predicate::str::contains("pre-capillary"));

    let output = cli()
        .arg("trends")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--patient")
        .arg("p1")
        .arg("--json")
        .output()
        .expect("Failed to run trends");
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["metrics"]["mpap"]["direction"], "increasing");
    assert_eq!(summary["metrics"]["pcwp"]["direction"], "stable");
    assert_eq!(summary["insights"][0], "pre_capillary_pattern");
}

#[test]
fn test_export_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    record(data_dir, "p1", "s1", &["fick:co_lmin=5.2"]).success();
    record(data_dir, "p1", "s2", &["fick:co_lmin=4.9"]).success();
    record(data_dir, "p2", "s3", &["fick:co_lmin=6.0"]).success();

    let out = data_dir.join("export").join("p1.csv");
    cli()
        .arg("export")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--patient")
        .arg("p1")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 studies"));

    let csv_content = fs::read_to_string(&out).expect("Failed to read CSV");
    assert!(csv_content.starts_with("study_id,patient_id"));
    assert_eq!(csv_content.lines().count(), 3);
    let header = csv_content.lines().next().unwrap();
    for column in ["created_at", "height_cm", "cvp_mmhg", "pasp_mmhg", "padp_mmhg", "svr_units", "pvr_units"] {
        assert!(header.split(',').any(|h| h == column), "missing column {}", column);
    }
    assert!(!csv_content.contains("s3"));
}

#[test]
fn test_concurrent_recorders_distinct_studies() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let data_dir = data_dir.clone();
            std::thread::spawn(move || {
                record(&data_dir, "p1", &format!("s{}", i), &["fick:co_lmin=5.2"]).success();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("recorder thread panicked");
    }

    let files: Vec<_> = fs::read_dir(data_dir.join("studies"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(files.len(), 4, "Expected exactly 4 study files, found {:?}", files);

    cli()
        .arg("trends")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--patient")
        .arg("p1")
        .assert()
        .success()
        .stdout(predicate::str::contains("4 studies"));
}
