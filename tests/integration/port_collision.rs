use crate::common::*;
use std::net::TcpListener;
use std::time::Duration;
use tokio::process::Command;

/// Something that is not a gateway holds the default port; the bundled
/// gateway moves to the next free one.
#[cfg(unix)]
#[tokio::test]
async fn bundled_gateway_shifts_past_foreign_listener() {
    let port = free_port_pair();
    let _blocker = TcpListener::bind(("127.0.0.1", port)).unwrap();

    let project = TestProject::new("");
    let bin = install_fake_binaries(&project);
    std::fs::write(
        &project.config_path,
        format!(
            "{}\n{}",
            std::fs::read_to_string(&project.config_path).unwrap(),
            fake_stack_config(&bin, port)
        ),
    )
    .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_noderig"))
        .args(["start", "-f", project.config_arg()])
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start noderig");

    assert!(
        wait_for_path(&project.endpoint_file(), true, Duration::from_secs(20)).await,
        "endpoint was never published"
    );
    let endpoint = project.read_endpoint().unwrap();
    assert_eq!(endpoint["apiUrl"], format!("http://127.0.0.1:{}", port + 1));

    interrupt(&child);
    let _ = tokio::time::timeout(Duration::from_secs(15), child.wait()).await;
    assert!(wait_for_port_release(port + 1, Duration::from_secs(5)).await);
}
