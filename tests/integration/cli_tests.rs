use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn workspace_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn fixture_path(name: &str) -> PathBuf {
    workspace_root()
        .join("tests")
        .join("testdata")
        .join("cli")
        .join(name)
}

fn run_cse(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cse"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to run cse with args {:?}: {e}", args))
}

fn run_fixture(name: &str, flags: &[&str]) -> Output {
    let file = fixture_path(name);
    let mut args = vec!["run", file.to_str().unwrap()];
    args.extend_from_slice(flags);
    run_cse(&args)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn run_prints_each_chunk_value() {
    let output = run_fixture("basics.cse", &[]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(stdout(&output), "12\n15\n\"done\"\n");
}

#[test]
fn run_stops_at_the_first_error() {
    let output = run_fixture("failing.cse", &[]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(
        text.contains("error: Operand of - (expected NUMBER, got CONST_STRING)"),
        "stderr:\n{}",
        text
    );
    assert!(!stdout(&output).contains("unreachable"));
}

#[test]
fn recursion_runs_to_completion_by_default() {
    let output = run_fixture("countdown.cse", &["--gc-threshold", "8"]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(stdout(&output), "0\n");
}

#[test]
fn step_limit_reports_unfinished_chunks() {
    let output = run_fixture("countdown.cse", &["--step-limit", "5"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("chunk still running after 5 steps"),
        "stderr:\n{}",
        stderr(&output)
    );
}

#[test]
fn json_flag_prints_the_final_snapshot() {
    let output = run_fixture("basics.cse", &["--json"]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let text = stdout(&output);
    let start = text.find('{').expect("no JSON in output");
    let snapshot: serde_json::Value = serde_json::from_str(&text[start..]).unwrap();

    assert_eq!(snapshot["control"], serde_json::json!([]));
    let frames = snapshot["frames"].as_array().unwrap();
    let program = frames
        .iter()
        .find(|frame| frame["label"] == "program")
        .expect("no program frame");
    assert_eq!(program["bindings"]["x"], "3");
    assert!(
        program["constants"]
            .as_array()
            .unwrap()
            .iter()
            .any(|name| name == "mul")
    );
}

#[test]
fn digest_is_stable_across_runs() {
    let digest_of = |output: &Output| {
        stdout(output)
            .lines()
            .find_map(|line| line.strip_prefix("digest: ").map(str::to_string))
            .expect("no digest line")
    };
    let first = run_fixture("basics.cse", &["--digest"]);
    let second = run_fixture("basics.cse", &["--digest"]);
    let digest = digest_of(&first);
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(digest, digest_of(&second));
}

#[test]
fn usage_errors_exit_with_two() {
    let output = run_cse(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));

    let output = run_cse(&["run"]);
    assert_eq!(output.status.code(), Some(2));

    let file = fixture_path("basics.cse");
    let output = run_cse(&["run", file.to_str().unwrap(), "--step-limit", "many"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--step-limit expects a non-negative integer"));
}

#[test]
fn missing_file_fails() {
    let output = run_cse(&["run", "/definitely/not/here.cse"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error reading"));
}

#[test]
fn help_lists_the_flags() {
    let output = run_cse(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("--step-limit"));
    assert!(text.contains("--no-gc"));
}
