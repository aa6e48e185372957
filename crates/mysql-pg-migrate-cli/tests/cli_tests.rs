//! CLI integration tests for mysql-pg-migrate.
//!
//! These tests cover argument parsing, help output and exit codes. The
//! connection tests point at closed local ports, so no database is needed.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Get a command for the mysql-pg-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql-pg-migrate").unwrap()
}

const VALID_CONFIG: &str = r#"
source:
  host: 127.0.0.1
  port: 1
  database: shop
  user: reader
  password: secret
target:
  host: 127.0.0.1
  port: 2
  database: shop_pg
  user: writer
  password: secret
migration:
  statement_timeout_secs: 2
"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--target-schema"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-pg-migrate"));
}

#[test]
fn test_global_flags_and_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let file = config_file("source:\n  host: localhost\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_2() {
    let file = config_file(&VALID_CONFIG.replace(
        "  password: secret\ntarget:",
        "  password: secret\n  ssl_mode: sometimes\ntarget:",
    ));

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source.ssl_mode"));
}

#[test]
fn test_zero_workers_override_is_rejected() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run", "--workers", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_invalid_target_schema_override_is_rejected() {
    let file = config_file(VALID_CONFIG);
    let schema = "s".repeat(80);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--target-schema",
            schema.as_str(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("target_schema"));
}

#[test]
fn test_unreachable_source_exits_with_code_3() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .code(3);
}

#[test]
fn test_health_check_reports_unreachable_source() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Source (MySQL): FAILED"))
        .stdout(predicate::str::contains("UNHEALTHY"));
}
