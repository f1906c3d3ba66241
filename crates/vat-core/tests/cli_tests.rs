#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use tempfile::TempDir;

#[allow(deprecated)]
fn run_cli(root: &TempDir, script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.arg(root.path())
        .write_stdin(script.to_string())
        .assert()
}

#[test]
fn cli_computes_cutoff_total() {
    let root = TempDir::new().unwrap();
    run_cli(
        &root,
        "new Demo\nadd Supplies S-1 1400 1200\ntotal\nsave\nquit\n",
    )
    .success()
    .stdout(str_contains("Created project 'Demo'."))
    .stdout(str_contains("Total additional VAT: 16,39"))
    .stdout(str_contains("Project 'Demo' saved."));
    assert!(root.path().join("Demo").join("project.vat").is_file());
}

#[test]
fn cli_reports_task_driven_breakdown() {
    let root = TempDir::new().unwrap();
    run_cli(
        &root,
        "new Bridge\ncontract Deck 120000 2025 2\nrate Deck 2026 22\nbreakdown Deck\ntotal\nquit\n",
    )
    .success()
    .stdout(str_contains("2 000,00"))
    .stdout(str_contains("Total additional VAT: 2 000,00"));
}

#[test]
fn cli_lists_saved_projects_across_sessions() {
    let root = TempDir::new().unwrap();
    run_cli(&root, "new Alpha\nsave\nquit\n").success();
    run_cli(&root, "list\nopen Alpha\nquit\n")
        .success()
        .stdout(str_contains("Alpha"))
        .stdout(str_contains("Opened project 'Alpha'."))
        .stdout(str_contains("TOTAL"));
}

#[test]
fn cli_requires_an_open_project() {
    let root = TempDir::new().unwrap();
    run_cli(&root, "total\nopen Missing\nquit\n")
        .success()
        .stdout(str_contains("No project open."))
        .stdout(str_contains("Error: project 'Missing' not found"));
}
