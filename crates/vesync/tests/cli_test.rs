//! Integration tests for the `vesync` CLI binary.
//!
//! Argument parsing, help output, completions, and error exits run without
//! a network; the end-to-end flow runs against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `vesync` binary with env isolation.
///
/// Clears all `VESYNC_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn vesync_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vesync");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("VESYNC_PROFILE")
        .env_remove("VESYNC_USERNAME")
        .env_remove("VESYNC_PASSWORD")
        .env_remove("VESYNC_REGION")
        .env_remove("VESYNC_COUNTRY_CODE")
        .env_remove("VESYNC_API_URL")
        .env_remove("VESYNC_SESSION_FILE")
        .env_remove("VESYNC_OUTPUT")
        .env_remove("VESYNC_INSECURE")
        .env_remove("VESYNC_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = vesync_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    vesync_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("VeSync")
            .and(predicate::str::contains("login"))
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("session")),
    );
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    vesync_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vesync"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    vesync_cmd(home.path())
        .args(["--output", "yaml", "session", "path"])
        .assert()
        .code(2);
}

// ── Error exits without network ─────────────────────────────────────

#[test]
fn test_devices_without_credentials_is_auth_error() {
    let home = tempfile::tempdir().unwrap();
    let output = vesync_cmd(home.path()).arg("devices").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("No credentials"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let output = vesync_cmd(home.path())
        .args(["--profile", "nope", "devices"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Profile 'nope' not found"));
}

#[test]
fn test_bad_region_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    vesync_cmd(home.path())
        .args(["--region", "AU", "--username", "a@b.c", "devices"])
        .env("VESYNC_PASSWORD", "pw")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("region"));
}

#[test]
fn test_session_show_without_session() {
    let home = tempfile::tempdir().unwrap();
    vesync_cmd(home.path())
        .args(["session", "show"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No cached session"));
}

#[test]
fn test_config_set_then_profiles() {
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join("cfg");

    vesync_cmd(home.path())
        .env("XDG_CONFIG_HOME", &config_dir)
        .args([
            "--username",
            "user@example.com",
            "--country-code",
            "DE",
            "config",
            "set",
            "home",
            "--default",
        ])
        .assert()
        .success();

    vesync_cmd(home.path())
        .env("XDG_CONFIG_HOME", &config_dir)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home (default)"));

    assert!(config_dir.join("vesync/config.toml").exists());
}

// ── End to end ──────────────────────────────────────────────────────

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "traceId": "1",
        "code": 0,
        "msg": "request success",
        "result": result
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_devices_logs_in_once_and_reuses_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/globalPlatform/api/accountAuth/v1/authByPWDOrOTM"))
        .respond_with(ok(json!({ "authorizeCode": "auth-code" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/api/accountManage/v1/loginByAuthorizeCode4Vesync"))
        .respond_with(ok(json!({ "token": "tk-1", "accountID": "1234567", "countryCode": "US" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cloud/v1/deviceManaged/devices"))
        .respond_with(ok(json!({
            "list": [
                { "cid": "cid-1", "deviceName": "Purifier", "deviceType": "Core300S", "type": "wifi-air", "connectionStatus": "online" },
                { "cid": "cid-2", "deviceName": "Plug", "deviceType": "ESW15-USA", "type": "wifi-switch", "connectionStatus": "offline" }
            ],
            "total": 2
        })))
        .expect(2)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let session_file = home.path().join("session.json");
    let uri = server.uri();

    let run = {
        let home = home.path().to_path_buf();
        let session_file = session_file.clone();
        move |extra: &'static [&'static str]| {
            let mut cmd = vesync_cmd(&home);
            cmd.env("VESYNC_USERNAME", "user@example.com")
                .env("VESYNC_PASSWORD", "hunter2")
                .arg("--api-url")
                .arg(&uri)
                .arg("--session-file")
                .arg(&session_file)
                .args(["--output", "plain"])
                .args(extra);
            cmd.output().unwrap()
        }
    };

    let first = tokio::task::spawn_blocking({
        let run = run.clone();
        move || run(&["devices"])
    })
    .await
    .unwrap();
    assert!(first.status.success(), "{}", combined_output(&first));
    assert_eq!(String::from_utf8_lossy(&first.stdout), "cid-1\ncid-2\n");
    assert!(session_file.exists());

    let second = tokio::task::spawn_blocking({
        let run = run.clone();
        move || run(&["devices", "--online"])
    })
    .await
    .unwrap();
    assert!(second.status.success(), "{}", combined_output(&second));
    assert_eq!(String::from_utf8_lossy(&second.stdout), "cid-1\n");

    let shown = tokio::task::spawn_blocking(move || run(&["session", "show"]))
        .await
        .unwrap();
    assert!(shown.status.success(), "{}", combined_output(&shown));
    assert_eq!(String::from_utf8_lossy(&shown.stdout), "1234567\n");
}
