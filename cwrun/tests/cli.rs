//! Black-box tests for the argument-validation and engine-failure exit codes. None of these
//! require a container engine: a fake engine binary stands in for docker where one is needed.

use assert_cmd::Command;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

const RUN_FLAGS: [(&str, &str); 7] = [
    ("--docker-image", "python"),
    ("--bash-command", "echo hi"),
    ("--aws-cloudwatch-group", "g1"),
    ("--aws-cloudwatch-stream", "s1"),
    ("--aws-access-key-id", "AKIAEXAMPLE"),
    ("--aws-secret-access-key", "sekrit"),
    ("--aws-region", "us-west-2"),
];

fn cwrun() -> Command {
    Command::cargo_bin("cwrun").expect("cwrun binary should be built")
}

/// A `cwrun run` invocation with every required flag except `skip`.
fn run_args(skip: Option<&str>) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    for (flag, value) in RUN_FLAGS {
        if Some(flag) == skip {
            continue;
        }
        args.push(flag.to_string());
        args.push(value.to_string());
    }
    args
}

/// Write an executable shell script that plays the part of the container engine.
fn fake_engine(dir: &TempDir, script: &str) -> PathBuf {
    let path = dir.path().join("docker");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn help_succeeds() {
    cwrun().arg("--help").assert().success();
}

#[test]
fn omitting_each_required_flag_exits_one_and_names_the_flag() {
    for (flag, _) in RUN_FLAGS {
        let output = cwrun().args(run_args(Some(flag))).output().unwrap();
        assert_eq!(Some(1), output.status.code(), "{}", flag);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains(flag), "{}: {}", flag, stderr);
    }
}

#[test]
fn an_empty_image_exits_one() {
    let mut args = run_args(Some("--docker-image"));
    args.push("--docker-image".to_string());
    args.push(String::new());
    cwrun().args(args).assert().code(1);
}

/// Argument validation happens before the engine is even looked up: with an unresolvable engine
/// configured, bad arguments still exit 1, proving no engine interaction precedes validation.
#[test]
fn invalid_arguments_win_over_a_missing_engine() {
    cwrun()
        .env("CWRUN_DOCKER", "/nonexistent/docker")
        .args(run_args(Some("--aws-region")))
        .assert()
        .code(1);
}

#[test]
fn an_unresolvable_engine_is_a_launch_failure() {
    cwrun()
        .env("CWRUN_DOCKER", "/nonexistent/docker")
        .args(run_args(None))
        .assert()
        .code(2);
}

#[test]
fn engine_reserved_exit_statuses_are_launch_failures() {
    let temp_dir = TempDir::new().unwrap();
    let engine = fake_engine(&temp_dir, "exit 125");
    cwrun()
        .env("CWRUN_DOCKER", &engine)
        .args(run_args(None))
        .args(["--pull", "never"])
        .assert()
        .code(2);
}

#[test]
fn the_container_exit_code_is_relayed() {
    let temp_dir = TempDir::new().unwrap();
    let engine = fake_engine(&temp_dir, "exit 7");
    cwrun()
        .env("CWRUN_DOCKER", &engine)
        .args(run_args(None))
        .args(["--pull", "never"])
        .assert()
        .code(7);
}

#[test]
fn a_clean_container_exit_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let engine = fake_engine(&temp_dir, "exit 0");
    cwrun()
        .env("CWRUN_DOCKER", &engine)
        .args(run_args(None))
        .args(["--pull", "never"])
        .assert()
        .success();
}

#[test]
fn provision_writes_the_dropin_without_restarting() {
    let temp_dir = TempDir::new().unwrap();
    let dropin_dir = temp_dir.path().join("docker.service.d");
    cwrun()
        .args([
            "provision",
            "--aws-access-key-id",
            "AKIAEXAMPLE",
            "--aws-secret-access-key",
            "sekrit",
            "--aws-region",
            "us-west-2",
            "--no-restart",
            "--dropin-dir",
        ])
        .arg(&dropin_dir)
        .assert()
        .success();

    let written = std::fs::read_to_string(dropin_dir.join("aws-credentials.conf")).unwrap();
    assert!(written.contains("AWS_ACCESS_KEY_ID=AKIAEXAMPLE"));
    assert!(written.contains("AWS_REGION=us-west-2"));
}

#[test]
fn provision_reads_credentials_from_the_environment() {
    let temp_dir = TempDir::new().unwrap();
    let dropin_dir = temp_dir.path().join("docker.service.d");
    cwrun()
        .env("AWS_ACCESS_KEY_ID", "AKIAFROMENV")
        .env("AWS_SECRET_ACCESS_KEY", "sekrit")
        .env("AWS_REGION", "eu-central-1")
        .args(["provision", "--no-restart", "--dropin-dir"])
        .arg(&dropin_dir)
        .assert()
        .success();

    let written = std::fs::read_to_string(dropin_dir.join("aws-credentials.conf")).unwrap();
    assert!(written.contains("AWS_ACCESS_KEY_ID=AKIAFROMENV"));
}

#[test]
fn provision_without_credentials_exits_one() {
    let output = cwrun()
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("AWS_REGION")
        .args(["provision", "--no-restart"])
        .output()
        .unwrap();
    assert_eq!(Some(1), output.status.code());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--aws-access-key-id"), "{}", stderr);
}
