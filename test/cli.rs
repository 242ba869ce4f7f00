// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use anyhow::Result;
use assert_cmd::Command;
use indoc::indoc;
use predicates::prelude::*;
use std::{
    fs::{create_dir_all, read_to_string, write},
    path::Path,
};
use tempfile::TempDir;

const CONFIG: &str = indoc! {r#"
    [[project]]
    name = "web"
    sub_directory = "web"
    junit_output = "junit.xml"

    [project.clean_commands]
    common = ["touch cleaned"]

    [project.test_runners]
    common = ["true"]

    [[project]]
    name = "api"
    sub_directory = "api"

    [project.clean_commands]
    common = ["touch cleaned"]
"#};

/// Monorepo without any git history.
fn monorepo() -> Result<TempDir> {
    let root = tempfile::tempdir()?;
    write(root.path().join(".morto.toml"), CONFIG)?;
    create_dir_all(root.path().join("web"))?;
    create_dir_all(root.path().join("api"))?;

    Ok(root)
}

fn morto(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_morto"));
    cmd.current_dir(root)
        .env_remove("CI_PULL_REQUEST")
        .env_remove("MORTO_BASE")
        .env_remove("CIRCLE_NODE_INDEX")
        .env_remove("CIRCLE_NODE_TOTAL");
    cmd
}

#[test]
fn missing_command_exits_with_failure() -> Result<()> {
    let root = monorepo()?;
    morto(root.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));

    Ok(())
}

#[test]
fn help_exits_with_success() -> Result<()> {
    let root = monorepo()?;
    morto(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("distribute"));

    Ok(())
}

#[test]
fn only_project_wins_over_base() -> Result<()> {
    let root = monorepo()?;
    morto(root.path())
        .args(["clean", "--onlyProject", "api", "--base", "origin/main"])
        .assert()
        .success();

    assert!(root.path().join("api/cleaned").exists());
    assert!(!root.path().join("web/cleaned").exists());

    Ok(())
}

#[test]
fn base_outside_repository_is_fatal() -> Result<()> {
    let root = monorepo()?;
    morto(root.path())
        .args(["clean", "--base", "origin/main"])
        .assert()
        .code(1);

    assert!(!root.path().join("api/cleaned").exists());
    assert!(!root.path().join("web/cleaned").exists());

    Ok(())
}

#[test]
fn pull_request_outside_repository_is_fatal() -> Result<()> {
    let root = monorepo()?;
    morto(root.path())
        .env("CI_PULL_REQUEST", "https://github.com/remix/morto/pull/7")
        .arg("clean")
        .assert()
        .code(1);

    assert!(!root.path().join("web/cleaned").exists());

    Ok(())
}

#[test]
fn no_source_runs_every_project() -> Result<()> {
    let root = monorepo()?;
    morto(root.path()).arg("clean").assert().success();

    assert!(root.path().join("api/cleaned").exists());
    assert!(root.path().join("web/cleaned").exists());

    Ok(())
}

#[test]
fn malformed_junit_report_fails_test_run() -> Result<()> {
    let root = monorepo()?;
    write(
        root.path().join("web/junit.xml"),
        "<testsuite><testcase></testsuite>",
    )?;

    morto(root.path())
        .args(["test", "--onlyProject", "web", "--runTestRunners"])
        .args(["--junitOutput", "merged.xml"])
        .assert()
        .code(1);

    Ok(())
}

#[test]
fn junit_reports_merge_after_passing_test_run() -> Result<()> {
    let root = monorepo()?;
    write(
        root.path().join("web/junit.xml"),
        r#"<testsuite name="unit"><testcase name="ok"/></testsuite>"#,
    )?;

    morto(root.path())
        .args(["test", "--onlyProject", "web", "--runTestRunners"])
        .args(["--junitOutput", "merged.xml"])
        .assert()
        .success();

    let merged = read_to_string(root.path().join("merged.xml"))?;
    assert!(merged.contains(r#"<testsuite name="[web] unit">"#));

    Ok(())
}
