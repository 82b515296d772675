use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn shell(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_threaded_shell"));
    command
        .arg("--plain")
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn run_script(dir: &Path, script: &[u8]) -> Output {
    let mut child = shell(dir).spawn().expect("start shell");
    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(script)
        .expect("write script");
    child.wait_with_output().expect("shell output")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn test_exit_keyword_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"exit\necho never\n");

    assert!(output.status.success());
    assert_eq!(text(&output.stdout), "$");
    assert_eq!(text(&output.stderr), "");
}

#[test]
fn test_end_of_input_ends_session() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"");

    assert!(output.status.success());
    assert_eq!(text(&output.stdout), "$");
}

#[test]
fn test_foreground_commands_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"echo one\necho two\nexit\n");

    assert!(output.status.success());
    // Each prompt only appears once the previous command is done.
    assert_eq!(text(&output.stdout), "$one\n$two\n$");
}

#[test]
fn test_blank_lines_only_reprompt() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"\n\nexit\n");

    assert!(output.status.success());
    assert_eq!(text(&output.stdout), "$$$");
    assert_eq!(text(&output.stderr), "");
}

#[test]
fn test_redirections() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "pear\napple\n").unwrap();

    let output = run_script(dir.path(), b"sort < in.txt > out.txt\nexit\n");

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("out.txt")).unwrap(),
        "apple\npear\n"
    );
    assert!(text(&output.stderr).contains("finished with return code: 0"));
}

#[test]
fn test_missing_input_file_only_fails_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"cat < nope.txt\necho still here\nexit\n");

    assert!(output.status.success());
    let stderr = text(&output.stderr);
    assert!(stderr.contains("open input: "), "stderr: {stderr}");
    assert!(stderr.contains("finished with return code: 1"), "stderr: {stderr}");
    assert!(text(&output.stdout).contains("still here"));
}

#[test]
fn test_unknown_program_reports_exec_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"no-such-program-7d3a\nexit\n");

    assert!(output.status.success());
    let stderr = text(&output.stderr);
    assert!(stderr.contains("execvp: "), "stderr: {stderr}");
    assert!(stderr.contains("finished with return code: 1"), "stderr: {stderr}");
}

#[test]
fn test_line_without_program_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), b"> out.txt\necho after\nexit\n");

    assert!(output.status.success());
    assert!(text(&output.stderr).contains("Invalid input"));
    assert!(!dir.path().join("out.txt").exists());
    assert_eq!(text(&output.stdout), "$$after\n$");
}

#[test]
fn test_oversized_line_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut script = b"echo ".to_vec();
    script.extend(vec![b'x'; 700]);
    script.extend_from_slice(b"\necho fits\nexit\n");

    let output = run_script(dir.path(), &script);

    assert!(output.status.success());
    assert!(text(&output.stderr).contains("Input too long"));
    assert_eq!(text(&output.stdout), "$$fits\n$");
}

#[test]
fn test_background_command_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = shell(dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let started = Instant::now();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"sleep 5 &\nexit\n")
        .unwrap();
    let status = child.wait().unwrap();

    assert!(status.success());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_background_child_is_reaped_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("three.sh"), "exit 3\n").unwrap();
    // The foreground sleep keeps the session open long enough for the report.
    let output = run_script(dir.path(), b"sh three.sh &\nsleep 1\nexit\n");

    assert!(output.status.success());
    assert!(
        text(&output.stderr).contains("finished with return code: 3"),
        "stderr: {}",
        text(&output.stderr)
    );
}

#[test]
fn test_interrupt_ends_foreground_child_not_shell() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = shell(dir.path()).spawn().unwrap();
    let shell_pid = Pid::from_raw(child.id() as i32);
    let mut stdin = child.stdin.take().unwrap();

    let started = Instant::now();
    stdin.write_all(b"sleep 5\n").unwrap();
    thread::sleep(Duration::from_millis(500));
    kill(shell_pid, Signal::SIGINT).unwrap();
    thread::sleep(Duration::from_millis(300));
    // Nothing runs in the foreground now; the shell must shrug this one off.
    kill(shell_pid, Signal::SIGINT).unwrap();
    thread::sleep(Duration::from_millis(100));
    stdin.write_all(b"echo alive\nexit\n").unwrap();
    drop(stdin);

    let output = child.wait_with_output().unwrap();
    let stderr = text(&output.stderr);

    assert!(output.status.success(), "stderr: {stderr}");
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(stderr.contains("terminated with signal: 2"), "stderr: {stderr}");
    assert!(text(&output.stdout).contains("alive"));
}
