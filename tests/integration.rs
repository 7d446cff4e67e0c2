/// Integration tests for the `autotest` binary.
///
/// All tests invoke the compiled binary via subprocess. `CARGO_BIN_EXE_autotest` is set by Cargo
/// during `cargo test`. The `run` tests substitute a shell script for the `go` executable so no Go
/// toolchain is needed: the script answers `go test -json` with a canned event stream and
/// `go tool cover -func` with a canned per-function report.
use std::path::{Path, PathBuf};
use std::process::Command;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_autotest"))
}

/// Run an autotest command and assert it exits successfully.
/// Returns stdout as a String.
fn run_success(args: &[&str]) -> String {
    let out = Command::new(binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke autotest binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        out.status.success(),
        "command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
        args,
        out.status,
        stdout,
        stderr
    );
    stdout
}

/// Run an autotest command and assert it exits with a non-zero status.
/// Returns (stdout, stderr) as Strings.
fn run_failure(args: &[&str]) -> (String, String) {
    let out = Command::new(binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke autotest binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {:?} expected to fail but exited successfully\nstdout: {}\nstderr: {}",
        args,
        stdout,
        stderr
    );
    (stdout, stderr)
}

/// Write an executable shell script standing in for `go`.
#[cfg(unix)]
fn fake_go(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-go");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write fake go");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod fake go");
    path
}

const PASSING_GO: &str = r#"
case "$1" in
test)
  for arg in "$@"; do
    case "$arg" in
      -coverprofile=*) echo "mode: set" > "${arg#-coverprofile=}" ;;
    esac
  done
  printf '%s\n' '{"Action":"run","Package":"example.com/demo/add","Test":"TestAdd"}'
  printf '%s\n' '{"Action":"output","Package":"example.com/demo/add","Test":"TestAdd","Output":"=== RUN   TestAdd\n"}'
  printf '%s\n' '{"Action":"pass","Package":"example.com/demo/add","Test":"TestAdd","Elapsed":0.25}'
  printf '%s\n' '{"Action":"pass","Package":"example.com/demo/add","Elapsed":0.3}'
  exit 0
  ;;
tool)
  printf 'example.com/demo/add/add.go:3:\tAdd\t\t75.0%%\n'
  printf 'total:\t\t\t(statements)\t75.0%%\n'
  ;;
esac
"#;

const FAILING_GO: &str = r#"
printf '%s\n' '{"Action":"run","Package":"example.com/demo/add","Test":"TestAdd"}'
printf '%s\n' '{"Action":"output","Package":"example.com/demo/add","Test":"TestAdd","Output":"add_test.go:9: got 3, want 4\n"}'
printf '%s\n' '{"Action":"fail","Package":"example.com/demo/add","Test":"TestAdd","Elapsed":0.01}'
printf '%s\n' '{"Action":"fail","Package":"example.com/demo/add","Elapsed":0.02}'
exit 1
"#;

const BROKEN_GO: &str = r#"
echo '# example.com/demo/add' >&2
echo './add.go:3:1: syntax error: unexpected newline' >&2
echo 'FAIL	example.com/demo/add [build failed]'
exit 2
"#;

// ---------------------------------------------------------------------------
// CLI surface
// ---------------------------------------------------------------------------

#[test]
fn test_help_lists_subcommands() {
    let stdout = run_success(&["--help"]);
    assert!(stdout.contains("watch"), "help should list watch: {stdout}");
    assert!(stdout.contains("run"), "help should list run: {stdout}");
}

#[test]
fn test_watch_missing_root_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    let (_stdout, stderr) = run_failure(&["watch", missing.to_str().unwrap()]);
    assert!(
        stderr.contains("does-not-exist"),
        "error should name the missing root: {stderr}"
    );
}

#[test]
fn test_run_missing_go_binary_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (stdout, _stderr) = run_failure(&[
        "run",
        dir.path().to_str().unwrap(),
        "--no-color",
        "--go",
        "autotest-no-such-go-binary",
    ]);
    assert!(stdout.contains("could not run tests"), "stdout: {stdout}");
}

// ---------------------------------------------------------------------------
// `run` against a scripted toolchain
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn test_run_prints_tests_and_coverage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let go = fake_go(dir.path(), PASSING_GO);

    let stdout = run_success(&[
        "run",
        dir.path().to_str().unwrap(),
        "--no-color",
        "--go",
        go.to_str().unwrap(),
    ]);

    assert!(stdout.contains("Test Results"), "stdout: {stdout}");
    assert!(stdout.contains("TestAdd"), "slow test should be listed: {stdout}");
    assert!(stdout.contains("Code Coverage"), "stdout: {stdout}");
    assert!(stdout.contains("add.go"), "stdout: {stdout}");
    assert!(stdout.contains("75.0%"), "stdout: {stdout}");
    assert!(!stdout.contains('\x1b'), "--no-color output must be plain: {stdout}");
}

#[cfg(unix)]
#[test]
fn test_run_reports_failing_tests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let go = fake_go(dir.path(), FAILING_GO);

    let (stdout, _stderr) = run_failure(&[
        "run",
        dir.path().to_str().unwrap(),
        "--no-color",
        "--go",
        go.to_str().unwrap(),
    ]);

    assert!(stdout.contains("TestAdd"), "stdout: {stdout}");
    assert!(stdout.contains("FAIL"), "stdout: {stdout}");
    assert!(stdout.contains("got 3, want 4"), "test output should be shown: {stdout}");
}

#[cfg(unix)]
#[test]
fn test_run_reports_build_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let go = fake_go(dir.path(), BROKEN_GO);

    let (stdout, _stderr) = run_failure(&[
        "run",
        dir.path().to_str().unwrap(),
        "--no-color",
        "--go",
        go.to_str().unwrap(),
    ]);

    assert!(
        stdout.contains("Error in ./add.go at line 3, column 1"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("syntax error: unexpected newline"), "stdout: {stdout}");
    assert!(!stdout.contains("Test Results"), "build failures have no test table: {stdout}");
}
