//! Both binaries keep stdout for their payload; logs and errors go to stderr.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pai-tools-cli-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn run(bin: &str, config: &str, scratch: &PathBuf) -> Output {
    let config_path = scratch.join("config.yaml");
    fs::write(&config_path, config).unwrap();
    Command::new(bin)
        .arg("--config")
        .arg(&config_path)
        .env_remove("RUST_LOG")
        .env_remove("GARMIN_EMAIL")
        .env_remove("GARMIN_PASSWORD")
        .output()
        .unwrap()
}

#[test]
fn server_logs_and_startup_errors_go_to_stderr() {
    let scratch = scratch_dir("server");
    let config = format!(
        "speech:\n  port: 0\n  model_dir: {}\n  model_url: http://127.0.0.1:9/model.onnx\n  voices_url: http://127.0.0.1:9/voices.bin\n",
        scratch.join("models").display()
    );

    let out = run(env!("CARGO_BIN_EXE_kokoro-server"), &config, &scratch);
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert!(!out.status.success());
    assert!(out.stdout.is_empty(), "stdout: {}", String::from_utf8_lossy(&out.stdout));
    assert!(stderr.contains("Downloading Kokoro model"), "stderr: {stderr}");

    let _ = fs::remove_dir_all(&scratch);
}

#[test]
fn sync_errors_go_to_stderr() {
    let scratch = scratch_dir("sync");
    let config = format!("garmin:\n  token_dir: {}\n", scratch.join("tokens").display());

    let out = run(env!("CARGO_BIN_EXE_garmin-sync"), &config, &scratch);
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty(), "stdout: {}", String::from_utf8_lossy(&out.stdout));
    assert!(stderr.contains("ERROR: Missing credentials"), "stderr: {stderr}");

    let _ = fs::remove_dir_all(&scratch);
}
