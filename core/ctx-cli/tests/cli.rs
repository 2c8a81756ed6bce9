use chrono::{Local, TimeZone, Utc};
use ctx_core::{ManualClock, Store, DEFAULT_BUSY_TIMEOUT};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use tempfile::TempDir;

fn run_ctx(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ctx"))
        .args(args)
        .env("CTX_HOME", home)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run ctx")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn seeded_store(home: &Path) -> (Store, i64) {
    let store = Store::open(home.join("sessions.db")).expect("open store");
    store
        .start_session("/home/me/src/widget", Some("main"))
        .expect("first session");
    let id = store
        .start_session("/home/me/src/widget", Some("feature/login"))
        .expect("second session");
    store
        .upsert_file_change(id, "src/login.rs", "fn login() {}\n", 1)
        .expect("file change");
    store
        .append_command(id, "cargo test", 0, Some("/home/me/src/widget"))
        .expect("command");
    (store, id)
}

#[test]
fn empty_home_reports_no_data_without_creating_a_store() {
    let home = TempDir::new().expect("home");

    let output = run_ctx(home.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("No active session."));
    assert!(!home.path().join("sessions.db").exists());

    let output = run_ctx(home.path(), &["list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("No sessions found."));
}

#[test]
fn current_shows_the_open_session() {
    let home = TempDir::new().expect("home");
    seeded_store(home.path());

    let output = run_ctx(home.path(), &["current"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("CONTEXT: feature/login (widget)"));
    assert!(text.contains("src/login.rs (+1 edits)"));
    assert!(text.contains("[ok] cargo test"));
}

#[test]
fn current_as_json() {
    let home = TempDir::new().expect("home");
    let (_, id) = seeded_store(home.path());

    let output = run_ctx(home.path(), &["--json"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(value["session"]["id"], id);
    assert_eq!(value["session"]["branch"], "feature/login");
    assert_eq!(value["files"][0]["filepath"], "src/login.rs");
    assert_eq!(value["commands"][0]["command"], "cargo test");
}

#[test]
fn list_and_branch_search() {
    let home = TempDir::new().expect("home");
    seeded_store(home.path());

    let output = run_ctx(home.path(), &["list", "-n", "5"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("RECENT SESSIONS (last 5)"));
    assert!(text.contains("feature/login"));
    assert!(text.contains("main"));

    let output = run_ctx(home.path(), &["branch", "LOGIN"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Branch: feature/login"));

    let output = run_ctx(home.path(), &["branch", "release"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("No sessions found for branch matching 'release'."));
}

#[test]
fn new_ends_the_current_session() {
    let home = TempDir::new().expect("home");
    let (store, _) = seeded_store(home.path());

    let output = run_ctx(home.path(), &["new"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Previous session ended."));
    assert!(store.current_session().expect("current").is_none());

    let output = run_ctx(home.path(), &["current"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn yesterday_uses_the_previous_local_day() {
    let home = TempDir::new().expect("home");
    let yesterday = Local::now()
        .date_naive()
        .pred_opt()
        .expect("yesterday")
        .and_hms_opt(12, 0, 0)
        .expect("noon");
    let noon = Local
        .from_local_datetime(&yesterday)
        .earliest()
        .expect("local noon")
        .with_timezone(&Utc);
    let clock = ManualClock::new(noon);
    let store = Store::open_with(
        home.path().join("sessions.db"),
        DEFAULT_BUSY_TIMEOUT,
        Arc::new(clock),
    )
    .expect("open store");
    store
        .start_session("/home/me/src/widget", Some("hotfix"))
        .expect("start");

    let output = run_ctx(home.path(), &["yesterday"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("hotfix (widget)"));
}
