use crate::{CoreError, OsProcessLauncher, ProcessHandle, ProcessLauncher, ProcessSpec, TileProcess};

use std::time::Duration;

use googletest::assert_that;
use googletest::prelude::{eq, none, some};
use tempfile::TempDir;

#[test]
fn given_missing_working_dir_when_started_then_launch_error() {
    let temp = TempDir::new().unwrap();
    let spec = ProcessSpec::new("sleep", temp.path().join("missing")).arg("5");

    let result = ProcessHandle::start("Disc0oasis1", &spec);

    assert!(matches!(result, Err(CoreError::Launch { .. })));
}

#[test]
fn given_missing_executable_path_when_launched_then_launch_error() {
    let temp = TempDir::new().unwrap();
    let spec = ProcessSpec::new(temp.path().join("LastOasisServer"), temp.path());

    let result = OsProcessLauncher.launch("Disc0oasis1", &spec);

    assert!(matches!(result, Err(CoreError::Launch { .. })));
}

#[test]
fn given_spec_with_args_when_rendered_then_full_command_line() {
    let spec = ProcessSpec::new("MistServer", ".").args(["-log", "-identifier=Disc0oasis1"]);

    assert_that!(spec.command_line(), eq("MistServer -log -identifier=Disc0oasis1"));
}

#[cfg(unix)]
#[tokio::test]
async fn given_process_exits_on_its_own_when_probed_then_exit_code_recorded() {
    // Given
    let temp = TempDir::new().unwrap();
    let spec = ProcessSpec::new("sh", temp.path()).args(["-c", "exit 3"]);
    let mut process = ProcessHandle::start("Disc0oasis1", &spec).unwrap();

    // When
    let outcome = process.wait_exit(Duration::from_secs(5)).await.unwrap();

    // Then
    assert!(!outcome.forced);
    assert_that!(outcome.code, some(eq(3)));
    assert!(!process.is_alive());
    assert_that!(process.exit_code(), some(eq(3)));
}

#[cfg(unix)]
#[tokio::test]
async fn given_running_process_when_stopped_then_exits_within_grace() {
    // Given
    let temp = TempDir::new().unwrap();
    let spec = ProcessSpec::new("sleep", temp.path()).arg("30");
    let mut process = ProcessHandle::start("Disc0oasis1", &spec).unwrap();
    assert!(process.is_alive());
    assert!(process.pid().is_some());

    // When
    let outcome = process.stop(Duration::from_secs(5)).await.unwrap();

    // Then
    assert!(!outcome.forced);
    assert!(!process.is_alive());
}

#[cfg(unix)]
#[tokio::test]
async fn given_process_ignoring_term_when_stopped_then_killed_after_grace() {
    // Given
    let temp = TempDir::new().unwrap();
    let spec = ProcessSpec::new("sh", temp.path()).args(["-c", "trap '' TERM; sleep 30"]);
    let mut process = ProcessHandle::start("Disc0oasis1", &spec).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // When
    let outcome = process.stop(Duration::from_millis(300)).await.unwrap();

    // Then
    assert!(outcome.forced);
    assert_that!(outcome.code, none());
    assert!(!process.is_alive());
}
