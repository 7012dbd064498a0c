use crate::common::*;
use assert_cmd::Command;
use predicates::prelude::*;

fn noderig(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("noderig").unwrap();
    cmd.args(["-f", project.config_arg()]);
    cmd
}

#[test]
fn seed_rejects_malformed_rid() {
    let project = TestProject::new("");
    let output = noderig(&project)
        .args(["seed", "not-a-rid"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let envelope: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["code"], "INVALID_RID");
    assert!(envelope.get("data").is_none());
}

#[test]
fn connections_without_a_node() {
    let project = TestProject::new("");
    noderig(&project)
        .arg("connections")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"NOT_RUNNING\""))
        .stderr(predicate::str::contains("node is not running"));
}

#[test]
fn disabled_integration_refuses_operations() {
    let project = TestProject::new("[integration]\nenabled = false\n");
    noderig(&project)
        .args(["sync", "rad:z3gqcJUoA1n9HaHKufZs5FCSGazv5"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"DISABLED\""));
}

#[test]
fn stale_endpoint_file_is_not_a_running_node() {
    let project = TestProject::new("");
    let port = free_port();
    std::fs::create_dir_all(project.path().join("state")).unwrap();
    std::fs::write(
        project.endpoint_file(),
        format!(
            r#"{{"apiUrl":"http://127.0.0.1:{port}","gatewayUrl":"http://127.0.0.1:{port}","mode":"bundled","publishedAt":"2024-01-01T00:00:00Z"}}"#
        ),
    )
    .unwrap();

    noderig(&project)
        .args(["seed", "rad:z3gqcJUoA1n9HaHKufZs5FCSGazv5"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("NOT_RUNNING"));
}
