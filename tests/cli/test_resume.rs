//! Resuming `load` and `export` through `--state`.

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MAX_ITEMS_ENV: &str = "SB_READER__MAX_ITEM_COUNT";

fn prepare_workspace(workspace: &Path) {
    let settings = format!(
        "index_path = \"{}\"\n\n[step]\ncommit_interval = 2\n",
        workspace.join("index").display()
    );
    std::fs::write(workspace.join("settings.toml"), settings).expect("write settings file");
}

fn write_books(workspace: &Path, name: &str, ids: std::ops::Range<usize>) {
    let lines: String = ids
        .map(|i| format!("{{\"id\": \"b{i}\", \"title\": \"book {i}\"}}\n"))
        .collect();
    std::fs::write(workspace.join(name), lines).expect("write input file");
}

fn run_cli(workspace: &Path, args: &[&str], max_items: Option<usize>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_search-batch"));
    cmd.current_dir(workspace)
        .arg("--config")
        .arg(workspace.join("settings.toml"))
        .args(args)
        .env_remove(MAX_ITEMS_ENV);
    if let Some(max) = max_items {
        cmd.env(MAX_ITEMS_ENV, max.to_string());
    }

    let output = cmd.output().expect("run search-batch");
    assert!(
        output.status.success(),
        "search-batch {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn exported_ids(output: &str) -> Vec<String> {
    let mut ids: Vec<String> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let value: Value = serde_json::from_str(line).expect("exported line is JSON");
            value["id"].as_str().expect("id field").to_string()
        })
        .collect();
    ids.sort();
    ids
}

fn book_ids(ids: std::ops::Range<usize>) -> Vec<String> {
    let mut ids: Vec<String> = ids.map(|i| format!("b{i}")).collect();
    ids.sort();
    ids
}

#[test]
fn resumed_export_appends_to_the_output_file() {
    let temp = TempDir::new().expect("create temp dir");
    let workspace = temp.path();
    prepare_workspace(workspace);
    write_books(workspace, "books.jsonl", 0..6);
    run_cli(workspace, &["load", "books.jsonl", "--type", "book", "--id-field", "id"], None);

    let export = [
        "export", "--type", "book", "--output", "out.jsonl", "--state", "export.json",
    ];
    run_cli(workspace, &export, Some(2));
    run_cli(workspace, &export, Some(4));
    run_cli(workspace, &export, None);

    let output = std::fs::read_to_string(workspace.join("out.jsonl")).expect("read export");
    assert_eq!(exported_ids(&output), book_ids(0..6));
}

#[test]
fn export_without_state_overwrites_the_output_file() {
    let temp = TempDir::new().expect("create temp dir");
    let workspace = temp.path();
    prepare_workspace(workspace);
    write_books(workspace, "books.jsonl", 0..3);
    run_cli(workspace, &["load", "books.jsonl", "--type", "book", "--id-field", "id"], None);

    let export = ["export", "--type", "book", "--output", "out.jsonl"];
    run_cli(workspace, &export, None);
    run_cli(workspace, &export, None);

    let output = std::fs::read_to_string(workspace.join("out.jsonl")).expect("read export");
    assert_eq!(exported_ids(&output), book_ids(0..3));
}

#[test]
fn dry_run_load_leaves_the_state_file_alone() {
    let temp = TempDir::new().expect("create temp dir");
    let workspace = temp.path();
    prepare_workspace(workspace);
    write_books(workspace, "books.jsonl", 0..3);

    let load = [
        "load", "books.jsonl", "--type", "book", "--id-field", "id", "--state", "load.json",
    ];
    let mut dry_run = load.to_vec();
    dry_run.push("--dry-run");
    let output = run_cli(workspace, &dry_run, None);
    assert!(String::from_utf8_lossy(&output.stderr).contains("read=3 filtered=0 written=0"));
    assert!(!workspace.join("load.json").exists());

    let output = run_cli(workspace, &load, None);
    assert!(String::from_utf8_lossy(&output.stderr).contains("read=3 filtered=0 written=3"));

    let output = run_cli(workspace, &["export", "--type", "book"], None);
    assert_eq!(exported_ids(&String::from_utf8_lossy(&output.stdout)), book_ids(0..3));
}

#[test]
fn resumed_load_skips_only_committed_lines() {
    let temp = TempDir::new().expect("create temp dir");
    let workspace = temp.path();
    prepare_workspace(workspace);
    write_books(workspace, "first.jsonl", 0..3);
    write_books(workspace, "books.jsonl", 0..5);

    // the first run saves a read count of 3 against the shorter file
    run_cli(
        workspace,
        &["load", "first.jsonl", "--type", "book", "--id-field", "id", "--state", "load.json"],
        None,
    );
    let output = run_cli(
        workspace,
        &["load", "books.jsonl", "--type", "book", "--id-field", "id", "--state", "load.json"],
        None,
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("read=2 filtered=0 written=2"));

    let output = run_cli(workspace, &["export", "--type", "book"], None);
    assert_eq!(exported_ids(&String::from_utf8_lossy(&output.stdout)), book_ids(0..5));
}
