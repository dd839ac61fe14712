use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn run_stride(home: &Path, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("stride");
    let mut cmd = Command::new(binary);
    cmd.env("STRIDE_HOME", home);
    cmd.env_remove("STRIDE_REMOTE_URL");
    cmd.env_remove("STRIDE_REMOTE_KEY");
    cmd.arg("--format").arg("json");
    cmd.args(args);
    cmd.output().expect("stride command executes")
}

fn run_stride_ok(home: &Path, args: &[&str]) -> Output {
    let output = run_stride(home, args);
    assert!(
        output.status.success(),
        "stride {:?} failed:\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_stride_json(home: &Path, args: &[&str]) -> Value {
    let output = run_stride_ok(home, args);
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

fn error_code(output: &Output) -> String {
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json error on stderr");
    err["error"].as_str().expect("error code").to_string()
}

fn add_tracker(home: &Path, args: &[&str]) -> Value {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    run_stride_json(home, &full)
}

#[test]
fn add_then_list_and_show_round_trip_through_the_data_dir() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    let created = add_tracker(
        home,
        &[
            "Write report",
            "--estimate",
            "90",
            "--deadline",
            "2030-06-01",
            "--subtasks",
            "outline,draft,edit",
            "--group",
            "work",
        ],
    );
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["timeEstimate"], 90);
    assert_eq!(created["progress"], 0);
    assert_eq!(created["subtasks"].as_array().unwrap().len(), 3);

    let listed = run_stride_json(home, &["list"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let shown = run_stride_json(home, &["show", &id[..8]]);
    assert_eq!(shown["title"], "Write report");
    assert_eq!(shown["group"][0], "work");
}

#[test]
fn checking_subtasks_drives_progress_and_completion() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    let created = add_tracker(home, &["Trip", "--subtasks", "book,pack,go"]);
    let id = created["id"].as_str().unwrap().to_string();

    let after_one = run_stride_json(home, &["check", &id, "1"]);
    assert_eq!(after_one["progress"], 33);
    assert_eq!(after_one["completed"], false);

    let all = run_stride_json(home, &["complete-all", &id]);
    assert_eq!(all["progress"], 100);
    assert_eq!(all["completed"], true);

    let celebrated = run_stride_json(home, &["celebrate", &id]);
    assert_eq!(celebrated["celebrated"], true);

    let reset = run_stride_json(home, &["reset", &id]);
    assert_eq!(reset["progress"], 0);
    assert_eq!(reset["completed"], false);
    assert!(reset.get("celebrated").is_none());
}

#[test]
fn in_progress_flags_follow_subtasks() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    let created = add_tracker(home, &["Move", "--subtasks", "boxes,van"]);
    let id = created["id"].as_str().unwrap().to_string();

    let started = run_stride_json(home, &["sub-start", &id, "2"]);
    assert_eq!(started["inProgress"], true);
    assert_eq!(started["subtasks"][1]["inProgress"], true);

    let done = run_stride_json(home, &["done", &id]);
    assert_eq!(done["completed"], true);
    assert_eq!(done["progress"], 100);
}

#[test]
fn edit_updates_fields_and_keeps_matching_subtasks() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    let created = add_tracker(
        home,
        &["Garden", "--subtasks", "dig,plant", "--deadline", "2030-01-01"],
    );
    let id = created["id"].as_str().unwrap().to_string();
    run_stride_ok(home, &["check", &id, "1"]);

    let edited = run_stride_json(
        home,
        &[
            "edit",
            &id,
            "--title",
            "Vegetable garden",
            "--subtasks",
            "dig,plant,water",
            "--clear-deadline",
        ],
    );
    assert_eq!(edited["title"], "Vegetable garden");
    assert!(edited.get("deadline").is_none());
    assert_eq!(edited["subtasks"][0]["completed"], true);
    assert_eq!(edited["progress"], 33);
}

#[test]
fn edit_without_flags_leaves_tracker_untouched() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    let created = add_tracker(home, &["Steady", "--subtasks", "one,two"]);
    let id = created["id"].as_str().unwrap().to_string();

    let output = run_stride_ok(home, &["edit", &id]);
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown, created);
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing to change"));

    let listed = run_stride_json(home, &["list"]);
    assert_eq!(listed[0], created);
}

#[test]
fn delete_removes_tracker() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    let created = add_tracker(home, &["Temporary"]);
    let id = created["id"].as_str().unwrap().to_string();

    let removed = run_stride_json(home, &["delete", &id]);
    assert_eq!(removed["id"], id.as_str());
    assert!(run_stride_json(home, &["list"]).as_array().unwrap().is_empty());

    let output = run_stride(home, &["show", &id]);
    assert_eq!(error_code(&output), "tracker_not_found");
}

#[test]
fn list_filters_by_group_and_completion() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    add_tracker(home, &["Work item", "--group", "work"]);
    add_tracker(home, &["Home item", "--group", "home", "--done"]);

    let work = run_stride_json(home, &["list", "--group", "work"]);
    assert_eq!(work.as_array().unwrap().len(), 1);
    assert_eq!(work[0]["title"], "Work item");

    let completed = run_stride_json(home, &["list", "--completed"]);
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0]["title"], "Home item");

    let pending = run_stride_json(home, &["list", "--pending"]);
    assert_eq!(pending[0]["title"], "Work item");
}

#[test]
fn board_groups_by_deadline() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    add_tracker(home, &["Overdue", "--deadline", "2000-01-01"]);
    add_tracker(home, &["Someday"]);

    let board = run_stride_json(home, &["board"]);
    let columns = board["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[0]["column"], "today");
    assert_eq!(columns[0]["trackers"][0]["title"], "Overdue");
    assert_eq!(columns[3]["trackers"][0]["title"], "Someday");
    assert_eq!(board["stats"]["overdue"], 1);
}

#[test]
fn validation_errors_are_reported_as_json_codes() {
    let dir = tempdir().unwrap();
    let home = dir.path();

    assert_eq!(error_code(&run_stride(home, &["add", "   "])), "empty_title");
    assert_eq!(
        error_code(&run_stride(home, &["add", "Too many", "--group", "a,b,c,d"])),
        "too_many_groups"
    );
    assert_eq!(
        error_code(&run_stride(home, &["add", "Negative", "--estimate=-5"])),
        "invalid_estimate"
    );
}

#[test]
fn sync_commands_without_remote_stay_local() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    add_tracker(home, &["Local"]);

    let status = run_stride_json(home, &["sync"]);
    assert_eq!(status["status"]["state"], "local_only");
    assert_eq!(status["status"]["trackers"], 1);
    assert!(status["conflict"].is_null());

    let output = run_stride(home, &["resolve", "--strategy", "merge"]);
    assert_eq!(error_code(&output), "not_signed_in");

    let output = run_stride(home, &["login", "--email", "a@b.c", "--password", "pw"]);
    assert_eq!(error_code(&output), "remote_not_configured");
}

#[test]
fn token_login_then_logout_clears_local_trackers() {
    let dir = tempdir().unwrap();
    let home = dir.path();
    add_tracker(home, &["Private"]);

    let status = run_stride_json(home, &["login", "--owner", "user-1", "--token", "t0k3n"]);
    assert_eq!(status["owner_id"], "user-1");
    assert_eq!(status["state"], "local_only");

    let status = run_stride_json(home, &["logout"]);
    assert_eq!(status["trackers"], 0);
    assert!(run_stride_json(home, &["list"]).as_array().unwrap().is_empty());
}
