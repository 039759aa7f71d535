#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/mmalink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("emulator socket did not appear");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_emulator(sock: &Path, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args(["--log-level", "error", "--format", "json", "emulate"])
        .arg(sock)
        .args(["--count", "1"])
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("emulate command should start");
    wait_for_socket(sock, Duration::from_secs(5));
    child
}

fn run_against(sock: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args(["--log-level", "error", "--format", "json", "run"])
        .arg(sock)
        .args(["--seed", "1234", "--ack-timeout", "2s", "--completion-timeout", "2s"])
        .args(extra)
        .output()
        .expect("run should execute")
}

fn finish(mut child: Child) {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("emulator status").is_some() {
            return;
        }
        if start.elapsed() >= Duration::from_secs(5) {
            let _ = child.kill();
            let _ = child.wait();
            return;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn run_against_emulator_verifies() {
    let dir = unique_temp_dir("ok");
    let sock = dir.join("mma.sock");
    let emulator = spawn_emulator(&sock, &[]);

    let output = run_against(&sock, &["--rows", "3", "--inner", "4", "--cols", "2"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).expect("json report");
    assert_eq!(report["verified"], true);
    assert_eq!(report["seed"], 1234);
    assert_eq!(report["transport"], "unix-socket-bridge");
    assert_eq!(report["result"]["rows"], 3);
    assert_eq!(report["result"]["cols"], 2);
    assert!(report["mismatch"].is_null());

    finish(emulator);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupted_device_result_exits_1() {
    let dir = unique_temp_dir("corrupt");
    let sock = dir.join("mma.sock");
    let emulator = spawn_emulator(&sock, &["--corrupt"]);

    let output = run_against(&sock, &[]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"verified\":false"));
    assert!(stdout.contains("\"mismatch\":{\"row\":0,\"col\":0"));

    finish(emulator);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn nack_exits_3_with_observed_byte() {
    let dir = unique_temp_dir("nack");
    let sock = dir.join("mma.sock");
    let emulator = spawn_emulator(&sock, &["--ack-byte", "0x15"]);

    let output = run_against(&sock, &[]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[protocol-nack]"), "stderr: {stderr}");
    assert!(stderr.contains("0x15"), "stderr: {stderr}");

    finish(emulator);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn slow_device_exits_124() {
    let dir = unique_temp_dir("slow");
    let sock = dir.join("mma.sock");
    let emulator = spawn_emulator(&sock, &["--completion-delay", "1500ms"]);

    let output = Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args(["--log-level", "error", "run"])
        .arg(&sock)
        .args(["--completion-timeout", "100ms"])
        .output()
        .expect("run should execute");
    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[timeout]"));

    finish(emulator);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_port_exits_3() {
    let output = Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args(["--log-level", "error", "run", "/nonexistent/mmalink/ttyUSB9"])
        .output()
        .expect("run should execute");
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("open failed"));
}

#[test]
fn encode_prints_wire_frame() {
    let output = Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args([
            "--format", "json", "encode", "--slot", "2", "--rows", "1", "--cols", "3", "--seed",
            "7",
        ])
        .output()
        .expect("encode should execute");
    assert!(output.status.success());

    let out: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).expect("json");
    assert_eq!(out["opcode"], 2);
    assert_eq!(out["bytes"], 1 + 8 + 12);
    let hex = out["hex"].as_str().expect("hex string");
    assert!(hex.starts_with("02 00 00 00 01 00 00 00 03"));
}

#[test]
fn encode_rejects_slot_3() {
    let output = Command::new(env!("CARGO_BIN_EXE_mmalink"))
        .args(["encode", "--slot", "3"])
        .output()
        .expect("encode should execute");
    assert_eq!(output.status.code(), Some(64));
}
