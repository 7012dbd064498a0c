use crate::common::*;
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_config_file_is_an_error() {
    Command::cargo_bin("noderig")
        .unwrap()
        .args(["status", "-f", "/nonexistent/noderig.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn invalid_values_are_all_reported() {
    let project = TestProject::new(
        r#"
[gateway]
port = 0
port_attempts = 0

[timing]
force_kill_ms = 0
"#,
    );
    Command::cargo_bin("noderig")
        .unwrap()
        .args(["-f", project.config_arg(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration errors"))
        .stderr(predicate::str::contains("gateway.port must not be 0"))
        .stderr(predicate::str::contains("gateway.port_attempts must be at least 1"))
        .stderr(predicate::str::contains("timing.force_kill_ms must be greater than 0"));
}

#[test]
fn config_is_discovered_from_working_directory() {
    let project = TestProject::new("[integration]\nenabled = false\n");
    let nested = project.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    Command::cargo_bin("noderig")
        .unwrap()
        .current_dir(&nested)
        .arg("connections")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\": \"DISABLED\""));
}
