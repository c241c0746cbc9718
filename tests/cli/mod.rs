use std::fs::File;
use std::io::Write;
use std::process::{Command, Output};

use assert_cmd::prelude::*; // Add methods on commands
use qdb_cli::naming::{BACKUP_PREFIX, TEMP_PREFIX};
use serde_json::{json, Value};
use tempfile::{Builder, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{chk_name_starts_with, ddl_ok, mock_chk};

/// An empty HOME, so a developer's own ~/.questdb-rest/config.json never leaks in
fn isolated_home() -> TempDir {
    Builder::new()
        .prefix("qdb-cli-test-home")
        .rand_bytes(5)
        .tempdir()
        .unwrap()
}

fn qdb_cli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qdb-cli").expect("qdb-cli bin exists");
    cmd.env("HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("QDB_CLI__HOST")
        .env_remove("QDB_CLI__PORT");
    cmd
}

fn against(server: &MockServer, home: &TempDir) -> Command {
    let mut cmd = qdb_cli(home);
    cmd.arg("-H")
        .arg(server.address().ip().to_string())
        .arg("--port")
        .arg(server.address().port().to_string());
    cmd
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_chk() {
    let server = MockServer::start().await;
    mock_chk(&server, "trades", true).await;
    let home = isolated_home();

    let output = against(&server, &home)
        .args(["chk", "trades"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!({"table": "trades", "exists": true})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_replace_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chk"))
        .and(chk_name_starts_with(TEMP_PREFIX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Does not exist"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chk"))
        .and(chk_name_starts_with(BACKUP_PREFIX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Does not exist"})))
        .mount(&server)
        .await;
    mock_chk(&server, "trades", true).await;
    Mock::given(method("GET"))
        .and(path("/exec"))
        .respond_with(ddl_ok())
        .expect(3)
        .mount(&server)
        .await;

    let home = isolated_home();
    let config_path = home.path().join("qdb-cli-test.json");
    let mut config_file = File::create(&config_path).unwrap();
    write!(
        config_file,
        r#"{{"host": "{}", "port": {}, "timeout": 10}}"#,
        server.address().ip(),
        server.address().port()
    )
    .unwrap();

    let output = qdb_cli(&home)
        .arg("--config")
        .arg(&config_path)
        .args(["cor", "trades", "select * from raw_trades"])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let result = stdout_json(&output);
    assert_eq!(result["status"], "OK");
    assert!(result["backup_table"]
        .as_str()
        .unwrap()
        .starts_with("qdb_cli_backup_trades_"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_dry_run_sends_no_statements() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chk"))
        .and(chk_name_starts_with(TEMP_PREFIX))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Does not exist"})))
        .mount(&server)
        .await;
    mock_chk(&server, "trades", true).await;
    Mock::given(method("GET"))
        .and(path("/exec"))
        .respond_with(ddl_ok())
        .expect(0)
        .mount(&server)
        .await;
    let home = isolated_home();

    let output = against(&server, &home)
        .args([
            "--dry-run",
            "cor",
            "trades",
            "select 1",
            "--no-backup-original-table",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[DRY-RUN] would execute: DROP TABLE 'trades';"), "{stderr}");
    assert_eq!(stdout_json(&output)["original_dropped_no_backup"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_validation_error_exits_1() {
    let server = MockServer::start().await;
    let home = isolated_home();

    let output = against(&server, &home)
        .args(["cor", "trades", "select 1", "-P", "DAY"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_json(&output)["error"]["kind"], "validation");
    // Rejected before anything was sent
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn test_cli_missing_config_file_exits_2() {
    let home = isolated_home();

    let output = qdb_cli(&home)
        .args(["--config", "/nonexistent/qdb-cli.toml", "chk", "trades"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_bad_arguments() {
    let home = isolated_home();

    qdb_cli(&home)
        .args(["dedupe", "trades", "--enable"])
        .assert()
        .failure();
}
