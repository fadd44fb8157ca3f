use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn consumer_pool() -> Command {
    Command::cargo_bin("consumer-pool").unwrap()
}

#[test]
fn cli_version() {
    consumer_pool()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_runs_commands_from_stdin() {
    consumer_pool()
        .args(["--workers", "2"])
        .write_stdin(
            r#"
            {"program": "echo", "args": ["first"]}
            {"program": "echo", "args": ["second"]}
            {"program": "echo", "args": ["third"]}
            "#,
        )
        .assert()
        .success()
        .stdout(contains("first"))
        .stdout(contains("second"))
        .stdout(contains("third"))
        .stderr(contains("3 commands run: 3 succeeded, 0 failed"));
}

#[test]
fn cli_runs_commands_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let jobs = temp_dir.path().join("jobs.json");
    fs::write(&jobs, r#"{"program": "echo", "args": ["from-file"]}"#).unwrap();

    consumer_pool()
        .args(["--workers", "1", "--jobs"])
        .arg(&jobs)
        .assert()
        .success()
        .stdout("from-file\n");
}

#[test]
fn cli_reads_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("pool.json");
    fs::write(&config, r#"{"size": 3, "thread_name": "update"}"#).unwrap();

    consumer_pool()
        .arg("--config")
        .arg(&config)
        .write_stdin(r#"{"program": "true"}"#)
        .assert()
        .success()
        .stderr(contains("Workers: 3"));
}

#[test]
fn cli_workers_flag_overrides_env() {
    consumer_pool()
        .env("MAX_THREADS", "5")
        .args(["--workers", "2"])
        .write_stdin("")
        .assert()
        .success()
        .stderr(contains("Workers: 2"));

    consumer_pool()
        .env("MAX_THREADS", "5")
        .write_stdin("")
        .assert()
        .success()
        .stderr(contains("Workers: 5"));
}

#[test]
fn cli_fails_when_a_command_fails() {
    consumer_pool()
        .args(["--workers", "2"])
        .write_stdin(r#"{"program": "true"} {"program": "false", "name": "broken"}"#)
        .assert()
        .failure()
        .stderr(contains("'broken' failed"))
        .stderr(contains("1 succeeded, 1 failed"));
}

#[test]
fn cli_invalid_workers() {
    consumer_pool().args(["--workers", "0"]).assert().failure();
    consumer_pool().args(["--workers", "lots"]).assert().failure();
}

#[test]
fn cli_invalid_env_size() {
    consumer_pool()
        .env("MAX_THREADS", "zero")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("Invalid pool size"));
}

#[test]
fn cli_malformed_input_still_drains_queued_jobs() {
    consumer_pool()
        .args(["--workers", "1"])
        .write_stdin(r#"{"program": "echo", "args": ["kept"]} {"args": "#)
        .assert()
        .failure()
        .stdout("kept\n")
        .stderr(contains("Serde error"));
}
