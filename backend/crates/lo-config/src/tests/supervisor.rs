use crate::Config;
use crate::tests::{EnvGuard, required_server_env, setup_config_dir};

use googletest::assert_that;
use googletest::prelude::{anything, contains_substring, err, ok};
use serial_test::serial;

// =========================================================================
// Validation Tests - Supervisor
// =========================================================================

#[test]
#[serial]
fn given_zero_auto_restarts_when_validate_then_ok() {
    // Given
    let _temp = setup_config_dir();
    let _server = required_server_env();
    let _restarts = EnvGuard::set("LO_SUPERVISOR_MAX_AUTO_RESTARTS", "0");

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, ok(anything()));
}

#[test]
#[serial]
fn given_auto_restarts_over_max_when_validate_then_error() {
    // Given
    let _temp = setup_config_dir();
    let _server = required_server_env();
    let _restarts = EnvGuard::set("LO_SUPERVISOR_MAX_AUTO_RESTARTS", "101");

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, err(anything()));
}

#[test]
#[serial]
fn given_poll_interval_below_min_when_validate_then_error() {
    // Given
    let _temp = setup_config_dir();
    let _server = required_server_env();
    let _poll = EnvGuard::set("LO_SUPERVISOR_POLL_INTERVAL_MS", "10");

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, err(anything()));
    assert_that!(
        result.unwrap_err().to_string(),
        contains_substring("supervisor.poll_interval_ms")
    );
}

#[test]
#[serial]
fn given_shutdown_grace_zero_when_validate_then_error() {
    // Given
    let _temp = setup_config_dir();
    let _server = required_server_env();
    let _grace = EnvGuard::set("LO_SUPERVISOR_SHUTDOWN_GRACE_SECS", "0");

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, err(anything()));
}

#[test]
#[serial]
fn given_max_backoff_below_initial_when_validate_then_error() {
    // Given
    let (temp, _guard) = setup_config_dir();
    let _server = required_server_env();
    std::fs::write(
        temp.path().join("config.toml"),
        "[supervisor]\ninitial_backoff_ms = 10000\nmax_backoff_ms = 5000\n",
    )
    .unwrap();

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, err(anything()));
}

#[test]
#[serial]
fn given_name_scan_disabled_when_validate_then_ok() {
    // Given
    let (temp, _guard) = setup_config_dir();
    let _server = required_server_env();
    std::fs::write(
        temp.path().join("config.toml"),
        "[supervisor]\nname_scan_secs = 0\n",
    )
    .unwrap();

    // When
    let config = Config::load().unwrap();
    let result = config.validate();

    // Then
    assert_that!(result, ok(anything()));
}
