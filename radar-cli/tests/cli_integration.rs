//! CLI integration tests for radar-cli.
//!
//! These tests run the actual binary and check outputs and exit codes.
//! Lookups use the in-process orchestrator in demo mode, so no network
//! provider is needed.

use assert_cmd::Command;
use predicates::prelude::*;

const PROVIDER_ENV: &[&str] = &[
    "RADAR_GATEWAY_URL",
    "RADAR_GATEWAY_TOKEN",
    "RADAR_DIRECT_URL",
    "RADAR_DIRECT_API_KEY",
    "RADAR_DEMO_MODE",
    "RADAR_SERVER",
    "RADAR_USER_ID",
];

/// Get a Command for the radar binary with no provider configured.
fn radar() -> Command {
    let mut cmd = Command::cargo_bin("radar").unwrap();
    for var in PROVIDER_ENV {
        cmd.env_remove(var);
    }
    cmd
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    radar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Traffic-infraction record lookups"))
        .stdout(predicate::str::contains("lookup"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("webhook-test"));
}

#[test]
fn test_version_displays_version() {
    radar()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("radar"));
}

#[test]
fn test_help_shows_exit_codes() {
    radar()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("69"))
        .stdout(predicate::str::contains("75"));
}

#[test]
fn test_lookup_help_shows_options() {
    radar()
        .args(["lookup", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--birth-date"))
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--demo"));
}

// ============================================================================
// Usage Errors
// ============================================================================

#[test]
fn test_unknown_search_type_is_usage_error() {
    radar()
        .args(["lookup", "passport", "X123"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Unknown search type"));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    radar().assert().code(64);
}

#[test]
fn test_zero_poll_interval_is_usage_error() {
    radar()
        .args(["lookup", "plate", "ABC1234", "--demo", "--poll-interval-ms", "0"])
        .assert()
        .code(64);
}

#[test]
fn test_invalid_plate_is_usage_error() {
    radar()
        .args(["lookup", "plate", "12", "--demo"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Invalid"));
}

#[test]
fn test_cnh_requires_birth_date() {
    radar()
        .args(["lookup", "cnh", "02650306461", "--demo"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("birth date"));
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_demo_lookup_prints_json_result() {
    radar()
        .args([
            "--json",
            "lookup",
            "plate",
            "abc-1d23",
            "--demo",
            "--poll-interval-ms",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"synthetic\": true"))
        .stdout(predicate::str::contains("\"plate\": \"ABC1D23\""));
}

#[test]
fn test_demo_lookup_text_output_warns_about_synthetic_data() {
    radar()
        .args(["lookup", "driver_cpf", "529.982.247-25", "--demo", "--poll-interval-ms", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOOKUP COMPLETE"))
        .stdout(predicate::str::contains("synthetic demo data"));
}

#[test]
fn test_lookup_without_provider_is_unavailable() {
    radar()
        .args(["lookup", "plate", "ABC1234"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("No provider configured"));
}

#[test]
fn test_remote_lookup_requires_user() {
    radar()
        .args(["lookup", "plate", "ABC1234", "--server", "http://127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--user"));
}

#[test]
fn test_unreachable_server_is_unavailable() {
    radar()
        .args([
            "lookup",
            "plate",
            "ABC1234",
            "--server",
            "http://127.0.0.1:9",
            "--user",
            "7d444840-9dc0-11d1-b245-5ffdce74fad2",
        ])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("Server unreachable"));
}

// ============================================================================
// Webhook Test
// ============================================================================

#[test]
fn test_webhook_test_rejects_plain_http_by_default() {
    radar()
        .args(["webhook-test", "http://127.0.0.1:9/hook"])
        .assert()
        .code(69)
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn test_webhook_test_invalid_url_is_usage_error() {
    radar()
        .args(["webhook-test", "not a url"])
        .assert()
        .code(64);
}

#[test]
fn test_webhook_test_bad_header_is_usage_error() {
    radar()
        .args(["webhook-test", "https://hooks.example.com", "--header", "novalue"])
        .assert()
        .code(64);
}
