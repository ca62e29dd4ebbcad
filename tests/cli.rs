//! End-to-end tests for the `assist` binary.
//!
//! None of these reach a real provider: embedding stays disabled and the
//! generation endpoint points at a closed local port.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn assist_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_assist"))
}

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("week1.md"),
        "# Week 1\n\nRecursion: a function that calls itself until it reaches a base case.",
    )
    .unwrap();
    fs::write(docs_dir.join("week2.txt"), "Sorting: merge sort, quick sort, heap sort.".repeat(40))
        .unwrap();
    fs::write(docs_dir.join("bad.pdf"), b"not a valid pdf").unwrap();

    fs::write(root.join("syllabus.txt"), "### IS115 v1.2\nYou are a TA for IS115.\n").unwrap();

    let config_content = format!(
        r#"[assistant]
syllabus_path = "{root}/syllabus.txt"

[corpus]
root = "{root}/docs"

[chunking]
size = 500
overlap = 50

[retry]
rate_limit_delay_ms = 1
transport_delay_ms = 1

{extra_config}
"#,
        root = root.display(),
    );

    let config_path = config_dir.join("assist.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_assist(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = assist_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("GEMINI_API_KEY", "test-key")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run assist binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_dry_run_counts() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_assist(&config_path, &["index", "--dry-run"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 2"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped:   1"), "stdout: {}", stdout);
    // week1.md is one chunk; week2.txt is 1720 chars, four windows at step 450
    assert!(stdout.contains("chunks:    5"), "stdout: {}", stdout);
    assert!(stdout.contains("skipped bad.pdf"), "stdout: {}", stdout);
}

#[test]
fn test_index_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_assist(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr: {}", stderr);
}

#[test]
fn test_search_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, stderr, success) = run_assist(&config_path, &["search", "recursion"]);
    assert!(!success);
    assert!(stderr.contains("embedding provider"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("overlap = 50", "overlap = 500");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_assist(&config_path, &["index", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("invalid configuration"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_assist(&tmp.path().join("nope.toml"), &["index", "--dry-run"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_ask_reports_unreachable_generation_service() {
    let (_tmp, config_path) = setup_test_env(
        "[generation]\nurl = \"http://127.0.0.1:9\"\ntimeout_secs = 5\n",
    );

    let (stdout, stderr, success) =
        run_assist(&config_path, &["ask", "What is recursion?", "--no-stream"]);
    assert!(!success, "stdout={}", stdout);
    assert!(stderr.contains("generation service error"), "stderr: {}", stderr);
}

#[test]
fn test_ask_requires_api_key() {
    let (_tmp, config_path) = setup_test_env("[generation]\napi_key_env = \"ASSIST_TEST_MISSING_KEY\"\n");

    let (_, stderr, success) = run_assist(&config_path, &["ask", "hi"]);
    assert!(!success);
    assert!(stderr.contains("ASSIST_TEST_MISSING_KEY"), "stderr: {}", stderr);
}
