use clap::CommandFactory;
use clap_complete::aot::{generate, Shell};
use std::io::BufWriter;

fn completions_for(shell: Shell) -> String {
    let mut buf = BufWriter::new(Vec::new());
    generate(shell, &mut noderig::cli::Cli::command(), "noderig", &mut buf);
    String::from_utf8(buf.into_inner().unwrap()).unwrap()
}

#[test]
fn completions_bash_generates_output() {
    let output = completions_for(Shell::Bash);
    assert!(!output.is_empty(), "bash completions should not be empty");
    assert!(output.contains("noderig"));
    assert!(output.contains("connections"));
}

#[test]
fn completions_zsh_generates_output() {
    let output = completions_for(Shell::Zsh);
    assert!(output.contains("noderig"));
}

#[test]
fn completions_subcommand_writes_to_stdout() {
    assert_cmd::Command::cargo_bin("noderig")
        .unwrap()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicates::str::contains("noderig"));
}
