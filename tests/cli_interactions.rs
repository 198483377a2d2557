//! CLI options interaction tests
//!
//! These run the `rprobe` binary end to end. Probes that need ICMP use a
//! scripted stand-in for the ping utility; throughput runs against a local
//! echo listener.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const ENV_KEYS: &[&str] = &[
    "RPROBE_TARGETS",
    "RPROBE_RELAYS_FILE",
    "RPROBE_COUNTRY",
    "RPROBE_PROTOCOL",
    "RPROBE_TEST_TYPE",
    "RPROBE_MAX_WORKERS",
    "RPROBE_PING_COUNT",
    "RPROBE_TIMEOUT_SECONDS",
    "RPROBE_PING_COMMAND",
    "RPROBE_SPEED_DURATION",
    "RPROBE_SPEED_CHUNK_SIZE",
    "RPROBE_SPEED_PORTS",
    "ENABLE_COLOR",
];

/// Command isolated from the caller's environment and any `.env` in the repo
fn create_test_cmd(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rprobe").unwrap();
    cmd.current_dir(workdir.path()).env("NO_COLOR", "1");
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[cfg(unix)]
fn fake_ping(dir: &TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-ping");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path.to_str().unwrap().to_string()
}

#[cfg(unix)]
const PING_OK: &str = "echo '3 packets transmitted, 3 received, 0% packet loss, time 2003ms'\n\
                       echo 'rtt min/avg/max/mdev = 11.020/12.500/14.100/1.200 ms'\n\
                       exit 0";

#[test]
fn test_help_and_version() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--relays-file"));

    create_test_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_topics() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--help-topic", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("THROUGHPUT ESTIMATE"));

    create_test_cmd(&dir)
        .args(["--help-topic", "nonsense"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown help topic"));
}

#[test]
fn test_no_target_source_is_config_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No targets given"));
}

#[test]
fn test_conflicting_and_invalid_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["-t", "1.1.1.1", "--color", "--no-color"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--no-color"));

    // clap's own usage errors
    create_test_cmd(&dir)
        .args(["-t", "1.1.1.1", "--protocol", "ipsec"])
        .assert()
        .code(2);
    create_test_cmd(&dir)
        .args(["-t", "1.1.1.1", "--timeout", "0"])
        .assert()
        .code(2);

    create_test_cmd(&dir)
        .args(["-t", "1.1.1.1", "--workers", "1000"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Worker count"));
}

#[test]
fn test_invalid_environment_value() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("RPROBE_TEST_TYPE", "traceroute")
        .args(["-t", "1.1.1.1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("RPROBE_TEST_TYPE"));
}

#[test]
fn test_missing_relay_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--relays-file", "does-not-exist.json"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("does-not-exist.json"));
}

#[test]
fn test_malformed_relay_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("relays.json"), "{ not json").unwrap();
    create_test_cmd(&dir)
        .args(["--relays-file", "relays.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("relay inventory"));
}

#[test]
fn test_missing_ping_utility() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["-t", "lo=127.0.0.1", "--ping-command", "rprobe-test-no-such-ping"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("ping command 'rprobe-test-no-such-ping' not found"));
}

#[cfg(unix)]
#[test]
fn test_failing_ping_reports_every_target() {
    let dir = TempDir::new().unwrap();
    let ping = fake_ping(&dir, "echo '3 packets transmitted, 0 received, 100% packet loss'\nexit 1");

    let output = create_test_cmd(&dir)
        .args(["-t", "a=10.0.0.1", "-t", "b=10.0.0.2", "--ping-command", &ping, "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(6));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["status"] == "failed"));
    assert!(results.iter().all(|r| r["latency_ms"].is_null()));
}

#[cfg(unix)]
#[test]
fn test_json_report_with_scripted_ping() {
    let dir = TempDir::new().unwrap();
    let ping = fake_ping(&dir, PING_OK);

    let output = create_test_cmd(&dir)
        .args([
            "-t", "gw=10.0.0.1", "-t", "10.0.0.2", "-t", "gw=10.0.0.3", "--ping-command", &ping, "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = report["results"].as_array().unwrap();

    // The duplicate name keeps its first address.
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["latency_ms"] == 12.5));
    assert!(results.iter().any(|r| r["target"]["id"] == "gw" && r["target"]["address"] == "10.0.0.1"));
    assert_eq!(report["summary"]["measured"], 2);
    assert_eq!(report["stopped"], false);
}

#[cfg(unix)]
#[test]
fn test_table_output_with_relay_inventory() {
    let dir = TempDir::new().unwrap();
    let ping = fake_ping(&dir, PING_OK);
    fs::write(
        dir.path().join("relays.json"),
        r#"{"countries": [
            {"name": "Sweden", "code": "se", "cities": [
                {"name": "Malmo", "code": "mma", "relays": [
                    {"hostname": "se-mma-wg-001", "ipv4_addr_in": "193.138.218.220", "endpoint_data": {"wireguard": {}}},
                    {"hostname": "se-mma-ovpn-001", "ipv4_addr_in": "193.138.218.130", "endpoint_data": "openvpn"}
                ]}
            ]},
            {"name": "Norway", "code": "no", "cities": [
                {"name": "Oslo", "code": "osl", "relays": [
                    {"hostname": "no-osl-wg-001", "ipv4_addr_in": "176.125.235.71", "endpoint_data": {"wireguard": {}}}
                ]}
            ]}
        ]}"#,
    )
    .unwrap();

    create_test_cmd(&dir)
        .args([
            "--relays-file", "relays.json", "--country", "SE", "--protocol", "wireguard", "--ping-command", &ping,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Relay Probe Results"))
        .stdout(predicate::str::contains("se-mma-wg-001"))
        .stdout(predicate::str::contains("Malmo, Sweden"))
        .stdout(predicate::str::contains("12.5ms"))
        .stdout(predicate::str::contains("se-mma-ovpn-001").not())
        .stdout(predicate::str::contains("no-osl-wg-001").not());
}

#[test]
fn test_speed_run_against_local_echo() {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            std::thread::spawn(move || {
                let mut buf = [0u8; 16 * 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });

    let dir = TempDir::new().unwrap();
    let output = create_test_cmd(&dir)
        .args([
            "-t",
            "lo=127.0.0.1",
            "--test-type",
            "speed",
            "-p",
            &port.to_string(),
            "--speed-duration",
            "1",
            "--chunk-size",
            "4096",
            "--json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let speed = &report["results"][0]["speed"];
    assert!(speed["download_mbps"].as_f64().unwrap() > 0.0);
    assert!(speed["upload_mbps"].as_f64().unwrap() > 0.0);
}
