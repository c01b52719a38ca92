//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("greenbench experiment runs"),
        "Should show app description"
    );
    assert!(stdout.contains("attribute"), "Should show attribute command");
    assert!(stdout.contains("summary"), "Should show summary command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("gbench"), "Should show binary name");
}

/// Test attribute subcommand help
#[test]
fn test_attribute_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "attribute", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Attribute help should succeed");
    assert!(stdout.contains("--run-dir"), "Should show run-dir option");
    assert!(
        stdout.contains("--max-skew-seconds"),
        "Should show max-skew option"
    );
    assert!(
        stdout.contains("--cpu-epsilon-cores"),
        "Should show epsilon option"
    );
}

/// Test summary subcommand help
#[test]
fn test_summary_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "summary", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Summary help should succeed");
    assert!(stdout.contains("--run-dir"), "Should show run-dir option");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test api-url option
#[test]
fn test_api_url_option() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("GBENCH_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "invalid-command"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gbench-cli", "--", "attribute"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// End-to-end: attribute a recorded run directory from files
#[test]
fn test_attribute_from_recorded_files() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    std::fs::write(
        dir.path().join("power.jsonl"),
        concat!(
            "{\"ts\":\"2026-01-04T16:11:00+00:00\",\"power_w\":10.0}\n",
            "{\"ts\":\"2026-01-04T16:11:01+00:00\",\"error\":\"timeout\"}\n",
            "{\"ts\":\"2026-01-04T16:11:02+00:00\",\"power_w\":20.0}\n",
        ),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("cpu_by_service.json"),
        r#"{
            "api-gateway": [{"ts":"2026-01-04T16:11:01+00:00","cpu_cores_used":1.0}],
            "booking": [{"ts":"2026-01-04T16:11:01+00:00","cpu_cores_used":1.0}]
        }"#,
    )
    .unwrap();

    let output = Command::new("cargo")
        .args([
            "run",
            "-p",
            "gbench-cli",
            "--",
            "--format",
            "json",
            "attribute",
            "--run-dir",
        ])
        .arg(dir.path())
        .args(["--max-skew-seconds", "2.0"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "attribute should succeed: {stdout}");

    let attribution = dir.path().join("attribution.json");
    assert!(attribution.exists(), "attribution.json should be written");

    let series: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&attribution).unwrap()).unwrap();
    // Both services share the matched reading equally (1.0 core each).
    let a = series["api-gateway"][0]["estimated_power_from_shelly_watt"]
        .as_f64()
        .unwrap();
    let b = series["booking"][0]["estimated_power_from_shelly_watt"]
        .as_f64()
        .unwrap();
    assert_eq!(a, b, "equal CPU must get equal power");
    assert!(a == 5.0 || a == 10.0, "split of the 10W or 20W reading");
}
