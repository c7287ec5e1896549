//! Command line behavior: usage on bad input, status codes

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_missing_category_prints_usage() {
    Command::cargo_bin("perflog")
        .unwrap()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_invalid_category_lists_choices() {
    Command::cargo_bin("perflog")
        .unwrap()
        .arg("doublePerformance")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("singlePerformance"));
}

#[test]
fn test_missing_logs_exit_nonzero() {
    let tmp = tempfile::tempdir().unwrap();
    Command::cargo_bin("perflog")
        .unwrap()
        .arg("singlePerformance")
        .arg("--input-root")
        .arg(tmp.path())
        .arg("--output-root")
        .arg(tmp.path().join("out"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to process singlePerformance"));
}

#[test]
fn test_runs_sequential_category() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seq");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("lwe_ram_usage.txt"),
        "Start of repetition 1: RAM Usage: 10 MB\nEnd of repetition 1: RAM Usage: 20 MB\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("lwe_cpu_usage.txt"),
        "Start of repetition 1: %Cpu(s): 1.0 us\nEnd of repetition 1: %Cpu(s): 2.0 us\n",
    )
    .unwrap();
    std::fs::write(dir.join("lwe_execution_time.txt"), "Execution Time: 2.5s\n").unwrap();

    let config = tmp.path().join("perflog.toml");
    std::fs::write(
        &config,
        r#"
[[categories]]
category = "singlePerformance"
folder = "seq"
datasets = [{ name = "lwe", log_prefix = "lwe" }]
"#,
    )
    .unwrap();

    Command::cargo_bin("perflog")
        .unwrap()
        .arg("singlePerformance")
        .arg("--config")
        .arg(&config)
        .arg("--input-root")
        .arg(tmp.path())
        .arg("--output-root")
        .arg(tmp.path().join("out"))
        .assert()
        .success();

    assert!(tmp.path().join("out/seq/lwe_time.csv").exists());
    assert!(tmp.path().join("out/seq/summary.json").exists());
}
