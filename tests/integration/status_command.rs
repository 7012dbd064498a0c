use crate::common::*;
use assert_cmd::Command;

#[test]
fn status_json_when_nothing_runs() {
    let port = free_port();
    let project = TestProject::new(&format!("[gateway]\nport = {port}\n"));
    let output = Command::cargo_bin("noderig")
        .unwrap()
        .args(["-f", project.config_arg(), "status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["status"], "stopped");
    assert_eq!(report["mode"], "none");
    assert_eq!(report["defaultPort"], port);
    assert_eq!(report["defaultPortState"], "free");
    assert!(report.get("systemNode").is_none());
}

#[test]
fn status_table_when_nothing_runs() {
    let project = TestProject::new(&format!("[gateway]\nport = {}\n", free_port()));
    Command::cargo_bin("noderig")
        .unwrap()
        .args(["-f", project.config_arg(), "status"])
        .assert()
        .success()
        .stdout(predicates::str::contains("stopped"));
}
