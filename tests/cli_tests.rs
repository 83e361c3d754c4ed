use assert_cmd::Command;
use predicates::prelude::*;

fn scribe() -> Command {
    Command::cargo_bin("scribe").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    scribe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resumable long-document generator"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_version_flag() {
    scribe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scribe"));
}

#[test]
fn test_list_on_fresh_project_dir() {
    let dir = tempfile::tempdir().unwrap();
    scribe()
        .args(["--project-dir", dir.path().to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found."));
}

#[test]
fn test_status_of_unknown_task_fails() {
    let dir = tempfile::tempdir().unwrap();
    scribe()
        .args([
            "--project-dir",
            dir.path().to_str().unwrap(),
            "status",
            "deadbeef",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_resume_of_unknown_task_fails() {
    let dir = tempfile::tempdir().unwrap();
    scribe()
        .env("SCRIBE_API_KEY", "test-key")
        .args([
            "--project-dir",
            dir.path().to_str().unwrap(),
            "resume",
            "deadbeef",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_start_without_api_key_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    scribe()
        .env_remove("SCRIBE_API_KEY")
        .env_remove("DEEPSEEK_API_KEY")
        .args([
            "--project-dir",
            dir.path().to_str().unwrap(),
            "start",
            "--request",
            "a short report",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_start_with_missing_chat_history_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    scribe()
        .env("SCRIBE_API_KEY", "test-key")
        .args([
            "--project-dir",
            dir.path().to_str().unwrap(),
            "start",
            "--request",
            "a short report",
            "--chat-history",
            dir.path().join("absent.txt").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chat history"));
}
