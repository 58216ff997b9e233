use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn run_rollbook<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_rollbook");
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("rollbook command should execute")
}

fn run_shell(db: &Path, script: &str) -> Output {
    let bin = env!("CARGO_BIN_EXE_rollbook");
    let mut child = Command::new(bin)
        .arg("--db")
        .arg(db)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("rollbook shell should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(script.as_bytes())
        .expect("script should be written");
    child
        .wait_with_output()
        .expect("rollbook shell should finish")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be valid JSON: {e}\nstdout:\n{}",
            stdout_text(output)
        )
    })
}

fn db_arg(db: &Path) -> String {
    db.display().to_string()
}

#[test]
fn add_then_get_json_smoke() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");

    let added = run_rollbook([
        "add", "--id", "1", "--name", "Alice", "--score", "88.5", "--json", "--db",
        db_arg(&db).as_str(),
    ]);
    assert_success(&added);
    let payload = parse_json_stdout(&added);
    assert_eq!(payload["action"], "record.add");
    assert_eq!(payload["saveMode"], "renamed");
    assert_eq!(payload["record"]["id"], 1);
    assert_eq!(payload["record"]["name"], "Alice");

    assert_eq!(
        fs::read_to_string(&db).expect("db should exist"),
        "1,Alice,88.50\n"
    );

    let found = run_rollbook(["get", "--id", "1", "--json", "--db", db_arg(&db).as_str()]);
    assert_success(&found);
    let payload = parse_json_stdout(&found);
    assert_eq!(payload["record"]["score"], 88.5);
}

#[test]
fn add_duplicate_id_fails_with_validation_message() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");
    fs::write(&db, "1,Alice,88.50\n").expect("fixture should write");

    let output = run_rollbook([
        "add", "--id", "1", "--name", "Again", "--score", "10", "--db",
        db_arg(&db).as_str(),
    ]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("Validation failed: duplicate record id: 1"));
    assert_eq!(
        fs::read_to_string(&db).expect("db should exist"),
        "1,Alice,88.50\n"
    );
}

#[test]
fn update_keeps_omitted_fields_and_delete_removes() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");
    fs::write(&db, "1,Alice,88.50\n2,Bob,72.00\n").expect("fixture should write");

    let updated = run_rollbook([
        "update", "--id", "2", "--score", "75", "--json", "--db",
        db_arg(&db).as_str(),
    ]);
    assert_success(&updated);
    let payload = parse_json_stdout(&updated);
    assert_eq!(payload["previous"]["score"], 72.0);
    assert_eq!(payload["record"]["name"], "Bob");
    assert_eq!(payload["record"]["score"], 75.0);

    let deleted = run_rollbook(["delete", "--id", "1", "--db", db_arg(&db).as_str()]);
    assert_success(&deleted);
    assert_eq!(
        fs::read_to_string(&db).expect("db should exist"),
        "2,Bob,75.00\n"
    );

    let missing = run_rollbook(["get", "--id", "1", "--db", db_arg(&db).as_str()]);
    assert_failure(&missing);
    assert!(stderr_text(&missing).contains("No record found with ID: 1"));
}

#[test]
fn list_by_score_json_skips_malformed_lines() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");
    fs::write(&db, "2,Bob,72.00\n3,Broken\n1,Alice,88.50\n").expect("fixture should write");

    let output = run_rollbook(["list", "--by-score", "--json", "--db", db_arg(&db).as_str()]);
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["order"], "score-desc");
    assert_eq!(payload["count"], 2);
    assert_eq!(payload["items"][0]["name"], "Alice");
    assert_eq!(payload["items"][1]["name"], "Bob");
}

#[test]
fn shell_session_persists_on_exit() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");

    let output = run_shell(&db, "1\n1\nAlice\n88.5\n1\n2\nBob\n72\n6\n0\n");
    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("No existing data; created"));
    assert!(stdout.contains("Record added: Record{id=1, name='Alice', score=88.50}"));
    assert!(stdout.contains("Saved 2 records"));
    assert!(stdout.contains("Goodbye."));

    let text = fs::read_to_string(&db).expect("db should exist");
    assert_eq!(text, "1,Alice,88.50\n2,Bob,72.00\n");
}

#[test]
fn shell_reloads_saved_records() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");
    fs::write(&db, "1,Alice,88.50\nnot a record\n").expect("fixture should write");

    let output = run_shell(&db, "4\n1\n");
    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("Loaded 1 records."));
    assert!(stdout.contains("Found: Record{id=1, name='Alice', score=88.50}"));

    // End of input saves like `0`; the malformed line is gone.
    assert_eq!(
        fs::read_to_string(&db).expect("db should exist"),
        "1,Alice,88.50\n"
    );
}

#[test]
fn shell_continues_when_initial_load_fails() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("db-is-a-directory");
    fs::create_dir(&db).expect("dir should be created");

    let output = run_shell(&db, "5\n0\n");
    assert_success(&output);
    let stdout = stdout_text(&output);
    assert!(stdout.contains("No records available."));
    assert!(stdout.contains("Goodbye."));
    assert!(stderr_text(&output).contains("initial load"));
}

#[test]
fn add_refuses_name_with_line_break() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("students_db.csv");
    fs::write(&db, "2,Bob,72.00\n").expect("fixture should write");

    let output = run_rollbook([
        "add", "--id", "1", "--name", "Eve\n7,Injected,99.00", "--score", "50", "--db",
        db_arg(&db).as_str(),
    ]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("Validation failed: name cannot contain a line break"));
    assert_eq!(
        fs::read_to_string(&db).expect("db should exist"),
        "2,Bob,72.00\n"
    );
}

#[test]
fn one_shot_command_exits_when_load_fails() {
    let tmp = tempfile::tempdir().expect("temp dir should be created");
    let db = tmp.path().join("db-is-a-directory");
    fs::create_dir(&db).expect("dir should be created");

    let output = run_rollbook([
        "add", "--id", "1", "--name", "Alice", "--score", "88.5", "--db",
        db_arg(&db).as_str(),
    ]);
    assert_failure(&output);
    assert!(stderr_text(&output).contains("error: failed to load"));
    assert!(db.is_dir());
}
