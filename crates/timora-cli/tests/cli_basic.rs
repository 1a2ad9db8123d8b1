//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway data directory.

use std::process::Command;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use timora_core::{Database, TimerSettings, UserRecord};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_timora-cli"))
        .args(args)
        .env("TIMORA_DATA_DIR", dir.path())
        .env_remove("TIMORA_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &TempDir, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout is not JSON")
}

#[test]
fn test_plan_generate() {
    let dir = TempDir::new().unwrap();
    let plan = run_json(
        &dir,
        &["plan", "generate", "--subject", "Math", "--subject", "Physics", "--hours", "3", "--days", "1", "--goal", "exam"],
    );
    let slots = plan["days"][0]["slots"].as_array().unwrap();
    let subjects: Vec<&str> = slots
        .iter()
        .filter_map(|s| s["label"]["subject"].as_str())
        .collect();
    assert_eq!(subjects, ["Math", "Physics", "Math"]);
}

#[test]
fn test_plan_generate_is_cached_and_stable() {
    let dir = TempDir::new().unwrap();
    let args = ["plan", "generate", "--subject", "Art", "--hours", "2", "--days", "2"];
    assert_eq!(run_json(&dir, &args), run_json(&dir, &args));
}

#[test]
fn test_plan_generate_wire() {
    let dir = TempDir::new().unwrap();
    let wire = run_json(
        &dir,
        &["plan", "generate", "--subject", "Math", "--hours", "1", "--days", "1", "--wire"],
    );
    assert!(wire["plan"]["days"].is_array());
}

#[test]
fn test_plan_rejects_bad_request() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(
        &dir,
        &["plan", "generate", "--subject", "Math", "--hours", "3", "--days", "0"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_timer_start_pause_mode() {
    let dir = TempDir::new().unwrap();
    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["type"], "StateSnapshot");

    let started = run_json(&dir, &["timer", "start"]);
    assert_eq!(started["type"], "TimerStarted");
    let paused = run_json(&dir, &["timer", "pause"]);
    assert_eq!(paused["type"], "TimerPaused");

    let changed = run_json(&dir, &["timer", "mode", "long"]);
    assert_eq!(changed["to"], "long_break");
    assert_eq!(changed["remaining_secs"], 15 * 60);
}

#[test]
fn test_running_timer_counts_down_between_commands() {
    let dir = TempDir::new().unwrap();
    run_json(&dir, &["timer", "start"]);
    thread::sleep(Duration::from_millis(2100));

    let status = run_json(&dir, &["timer", "status"]);
    let state = &status["state"];
    assert_eq!(state["runState"], "running");
    let remaining = state["remainingSeconds"].as_u64().unwrap();
    assert!(remaining <= 25 * 60 - 2, "remaining {remaining}");

    let paused = run_json(&dir, &["timer", "pause"]);
    assert!(paused["remaining_secs"].as_u64().unwrap() <= remaining);
}

#[test]
fn test_timer_uses_synced_settings() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(&dir.path().join("timora.db")).unwrap();
    let mut record = UserRecord::new_account();
    record.settings = TimerSettings {
        focus_minutes: 40,
        ..TimerSettings::default()
    };
    db.put_user_record(&record).unwrap();
    drop(db);

    let status = run_json(&dir, &["timer", "status"]);
    assert_eq!(status["state"]["remainingSeconds"], 40 * 60);
    assert_eq!(status["state"]["durations"]["focus"], 40);
}

#[test]
fn test_timer_rejects_unknown_mode() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(&dir, &["timer", "mode", "nap"]);
    assert_ne!(code, 0);
}

#[test]
fn test_new_account_has_welcome_coins() {
    let dir = TempDir::new().unwrap();
    let progress = run_json(&dir, &["progress", "show"]);
    assert_eq!(progress["coins"], 10);
    assert_eq!(progress["currentStreak"], 0);
}

#[test]
fn test_progress_reset_syncs() {
    let dir = TempDir::new().unwrap();
    let progress = run_json(&dir, &["progress", "reset"]);
    assert_eq!(progress["coins"], 0);

    let status = run_json(&dir, &["sync", "status"]);
    assert_eq!(status["state"], "synced");
    assert_eq!(run_json(&dir, &["progress", "show"])["coins"], 0);
}

#[test]
fn test_config_set_get() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&dir, &["config", "set", "timer.focus_minutes", "50"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, _) = run_cli(&dir, &["config", "get", "timer.focus_minutes"]);
    assert_eq!(stdout.trim(), "50");

    let (stdout, _, _) = run_cli(&dir, &["config", "list"]);
    assert!(stdout.contains("planner.day_start = 09:00"));
}

#[test]
fn test_config_unknown_key() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_stats_empty() {
    let dir = TempDir::new().unwrap();
    let stats = run_json(&dir, &["stats", "all"]);
    assert_eq!(stats["total_sessions"], 0);
    assert_eq!(run_json(&dir, &["stats", "recent"]), Value::Array(vec![]));
}
