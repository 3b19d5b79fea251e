//! Integration tests for the CLI replay, config and completion commands.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

fn archive_json(total: i64) -> String {
    let posts: Vec<String> = (1..=total)
        .map(|sequence| {
            format!(
                r#"{{"postId": "p{sequence}", "sequenceId": {sequence}, "archiveType": "chat", "nickname": "bot", "body": "post {sequence}"}}"#
            )
        })
        .collect();
    format!("[{}]", posts.join(","))
}

#[test]
fn test_replay_command_help() {
    let mut cmd = cargo_bin_cmd!("cli");
    cmd.arg("replay").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains(
            "Replay a shard event script through the post sync engine",
        ))
        .stdout(predicates::str::contains("--archive"))
        .stdout(predicates::str::contains("--page-size"))
        .stdout(predicates::str::contains("--viewport"));
}

#[test]
#[serial]
fn test_replay_prints_ordered_timeline() {
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("script.jsonl");
    fs::write(
        &script,
        r#"{"step": "post", "post": {"postId": "late", "sequenceId": 9, "nickname": "ada", "body": "newest"}}
{"step": "history", "posts": [{"postId": "early", "sequenceId": 8, "nickname": "bob", "body": "older"}]}
{"step": "submit", "body": "pending", "nickname": "me", "postId": "mine"}
"#,
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("cli");
    cmd.env_remove("EIGHTBITS_HISTORY_PAGE_SIZE")
        .arg("replay")
        .arg(&script)
        .arg("--page-size")
        .arg("20");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("request start=0 end=0 count=20"))
        .stdout(predicates::str::contains("early  bob: older"))
        .stdout(predicates::str::contains("late  ada: newest"))
        .stdout(predicates::str::contains("mine  me: pending"))
        .stdout(predicates::str::contains("3 posts"));
}

#[test]
#[serial]
fn test_replay_backfills_from_archive_as_json() {
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("script.jsonl");
    let archive = temp_dir.path().join("archive.json");
    fs::write(&script, "{\"step\": \"scroll\", \"offset\": 0}\n").unwrap();
    fs::write(&archive, archive_json(30)).unwrap();

    let mut cmd = cargo_bin_cmd!("cli");
    cmd.arg("replay")
        .arg(&script)
        .arg("--archive")
        .arg(&archive)
        .arg("--page-size")
        .arg("10")
        .arg("--viewport")
        .arg("100")
        .arg("--row-height")
        .arg("20")
        .arg("--json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let posts: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();

    assert_eq!(posts.len(), 19);
    assert_eq!(posts[0]["postId"], "p12");
    assert_eq!(posts[18]["postId"], "p30");
}

#[test]
fn test_replay_rejects_bad_step() {
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("script.jsonl");
    fs::write(&script, "{\"step\": \"reconnect\"}\nnot json\n").unwrap();

    let mut cmd = cargo_bin_cmd!("cli");
    cmd.arg("replay").arg(&script);

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("line 2"));
}

#[test]
fn test_replay_missing_script() {
    let mut cmd = cargo_bin_cmd!("cli");
    cmd.arg("replay").arg("/nonexistent/script.jsonl");

    cmd.assert().failure().stderr(
        predicates::str::contains("failed to read script")
            .or(predicates::str::contains("No such file")),
    );
}

#[test]
fn test_config_command_writes_yaml() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("cli");
    cmd.current_dir(temp_dir.path()).arg("config");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("sync.yaml"));
    let written = fs::read_to_string(temp_dir.path().join("sync.yaml")).unwrap();
    assert!(written.contains("history_page_size: 100"));
}

#[test]
fn test_config_command_rejects_unknown_format() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("cli");
    cmd.current_dir(temp_dir.path())
        .arg("config")
        .arg("--format")
        .arg("toml");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported format"));
}

#[test]
fn test_completion_command() {
    let mut cmd = cargo_bin_cmd!("cli");
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("eightbits"));
}
