use crate::common::*;
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn doctor_reports_missing_binaries() {
    let project = TestProject::new("[binaries]\ndir = \"/nonexistent/radicle/bin\"\n");
    Command::cargo_bin("noderig")
        .unwrap()
        .args(["-f", project.config_arg(), "doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[!!] radicle-node"))
        .stdout(predicate::str::contains("not found (/nonexistent/radicle/bin/radicle-httpd)"))
        .stdout(predicate::str::contains("Some binaries are missing"));
}

#[cfg(unix)]
#[test]
fn doctor_finds_installed_binaries() {
    let project = TestProject::new("");
    let bin = install_fake_binaries(&project);
    let config = format!(
        "{}\n[binaries]\ndir = \"{}\"\n",
        std::fs::read_to_string(&project.config_path).unwrap(),
        bin.display()
    );
    std::fs::write(&project.config_path, config).unwrap();

    Command::cargo_bin("noderig")
        .unwrap()
        .args(["-f", project.config_arg(), "doctor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] rad"))
        .stdout(predicate::str::contains("rad 0.0.0-test"))
        .stdout(predicate::str::contains("identity         not created yet"));
}
