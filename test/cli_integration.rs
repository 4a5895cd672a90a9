//! CLI Integration Tests for dynffi
//!
//! Runs the built binary and checks its output and exit status.

use std::path::PathBuf;
use std::process::{Command, Output};

fn dynffi_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dynffi"))
}

fn run(args: &[&str]) -> Output {
    Command::new(dynffi_binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run dynffi")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_call_process_function() {
    let output = run(&["call", "", "labs", "--ret", "j", "--args", "j", "-42"]);
    assert!(
        output.status.success(),
        "call failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(stdout(&output), "42");
}

#[test]
fn test_call_int_result_display() {
    let output = run(&["call", "", "abs", "--ret", "i", "--args", "i", "-5"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "5i");
}

#[test]
fn test_call_wrong_value_count() {
    let output = run(&["call", "", "abs", "--ret", "i", "--args", "i"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("takes 1 argument"), "{}", stderr);
}

#[test]
fn test_call_bad_value() {
    let output = run(&["call", "", "abs", "--ret", "i", "--args", "i", "five"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a valid int32_t"), "{}", stderr);
}

#[test]
fn test_call_missing_symbol() {
    let output = run(&["call", "", "dynffi_no_such_symbol", "--ret", "i"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("symbol not found"), "{}", stderr);
}

#[test]
fn test_call_fixture_add() {
    let Some(lib) = option_env!("DYNFFI_FIXTURE_LIB") else {
        return;
    };
    let output = run(&["call", lib, "add", "--ret", "i", "--args", "ii", "5", "3"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "8i");
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_set_then_get_in_one_process_is_separate() {
    let Some(lib) = option_env!("DYNFFI_FIXTURE_LIB") else {
        return;
    };
    let output = run(&["set", lib, "level_i", "i", "99"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "level_i <- 99i");

    // each run maps a fresh copy of the library
    let output = run(&["get", lib, "level_i", "i"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "7i");
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn test_codes_lists_alphabet() {
    let output = run(&["codes"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for c in ["'b'", "'x'", "'h'", "'i'", "'j'", "'e'", "'f'", "'c'"] {
        assert!(text.contains(c), "missing {} in {}", c, text);
    }
    assert!(text.contains("int64_t"));
}

#[test]
fn test_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        "[loader]\nsystem_paths = false\n\n[logging]\nlevel = \"error\"\n",
    )
    .unwrap();

    let output = run(&[
        "--config",
        config.to_str().unwrap(),
        "call",
        "",
        "labs",
        "--ret",
        "j",
        "--args",
        "j",
        "7",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "7");
}

#[test]
fn test_missing_config_file_fails() {
    let output = run(&["--config", "/nonexistent/dynffi.toml", "codes"]);
    assert!(!output.status.success());
}
