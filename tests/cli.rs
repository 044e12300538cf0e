use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("yt-transcripts").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("TRANSCRIPT_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn missing_api_key_is_fatal() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("list.txt"), "dQw4w9WgXcQ\n").unwrap();

    cli(&dir)
        .args(["download", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRANSCRIPT_API_KEY"));

    assert!(!dir.path().join("transcripts").exists());
}

#[test]
fn missing_input_list_is_fatal() {
    let dir = TempDir::new().unwrap();

    cli(&dir)
        .args(["download", "missing.txt", "--quiet"])
        .env("TRANSCRIPT_API_KEY", "test-key")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn resolve_reports_ids_and_skips() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("list.txt"),
        "https://www.youtube.com/watch?v=abc123\n# comment\n\nnot-a-url\nhttps://youtu.be/dQw4w9WgXcQ\n",
    )
    .unwrap();

    cli(&dir)
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("line 1: https://www.youtube.com/watch?v=abc123 -> abc123"))
        .stdout(predicate::str::contains("line 4: not-a-url -> skipped (invalid_reference)"))
        .stdout(predicate::str::contains("-> dQw4w9WgXcQ"))
        .stdout(predicate::str::contains("2 resolved, 1 skipped"));
}

#[test]
fn resolve_reads_csv_lists() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("links.csv"),
        "name,url\nfirst,https://youtu.be/dQw4w9WgXcQ\n",
    )
    .unwrap();

    cli(&dir)
        .args(["resolve", "links.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> dQw4w9WgXcQ"))
        .stdout(predicate::str::contains("1 resolved, 0 skipped"));
}

#[test]
fn config_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("custom.yaml"), "retry:\n  max_attempts: 7\n").unwrap();

    cli(&dir)
        .args(["config", "--show", "--config", "custom.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current Configuration"))
        .stdout(predicate::str::contains("7 attempts"));
}
