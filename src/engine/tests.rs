use crate::engine::context::{Environment, ExecutionContext};
use crate::engine::parser::parse;
use crate::engine::process::{EXIT_NOT_FOUND, STATUS_FAILURE, fork_process, terminate, wait_for};
use crate::engine::ParseOutcome;
use nix::unistd::ForkResult;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn run_with(line: &str, env: &Environment) -> i32 {
    match parse(line).unwrap() {
        ParseOutcome::Command(cmd) => cmd.execute(env, ExecutionContext::NeedsNewProcess),
        other => panic!("Expected a command for {:?}, got {:?}", line, other),
    }
}

fn run(line: &str) -> i32 {
    run_with(line, &Environment::from_process())
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_simple_exit_codes() {
    assert_eq!(run("true"), 0);
    assert_eq!(run("false"), 1);
    assert_eq!(run(r#"sh -c "exit 3""#), 3);
}

#[test]
fn test_missing_program_reports_not_found() {
    assert_eq!(run("definitely-not-a-real-program-42 --flag"), EXIT_NOT_FOUND);
    // The shell keeps going after the failure
    assert_eq!(run("definitely-not-a-real-program-42 || true"), 0);
}

#[test]
fn test_signal_death_is_a_failure() {
    assert_eq!(run(r#"sh -c "kill -9 $$""#), STATUS_FAILURE);
}

#[test]
fn test_and_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");

    let status = run(&format!("false && touch {}", marker.display()));
    assert_eq!(status, 1);
    assert!(!marker.exists());

    assert_eq!(run(r#"true && sh -c "exit 4""#), 4);
}

#[test]
fn test_or_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");

    let status = run(&format!("true || touch {}", marker.display()));
    assert_eq!(status, 0);
    assert!(!marker.exists());

    assert_eq!(run(r#"false || sh -c "exit 5""#), 5);
}

#[test]
fn test_sequence_always_runs_right() {
    assert_eq!(run(r#"false; sh -c "exit 6""#), 6);
    assert_eq!(run(r#"sh -c "exit 2"; true"#), 0);
}

#[test]
fn test_redirect_truncate_keeps_last_write() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    assert_eq!(run(&format!("echo first > {}", out.display())), 0);
    assert_eq!(run(&format!("echo second > {}", out.display())), 0);
    assert_eq!(read(&out), "second\n");
}

#[test]
fn test_redirect_append_keeps_both_writes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let line = format!("echo one >> {0}; echo two >> {0}", out.display());
    assert_eq!(run(&line), 0);
    assert_eq!(read(&out), "one\ntwo\n");
}

#[test]
fn test_redirect_creates_files_with_0644() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fresh.txt");

    run(&format!("true > {}", out.display()));
    let mode = fs::metadata(&out).unwrap().permissions().mode() & 0o777;
    // The process umask can only clear bits
    assert_eq!(mode & !0o644, 0);
    assert!(mode & 0o600 == 0o600);
}

#[test]
fn test_redirect_input_feeds_exact_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let out = dir.path().join("out.bin");
    let bytes: Vec<u8> = (0u8..=255).chain(b"tail without newline".iter().copied()).collect();
    fs::write(&input, &bytes).unwrap();

    let status = run(&format!("cat < {} > {}", input.display(), out.display()));
    assert_eq!(status, 0);
    assert_eq!(fs::read(&out).unwrap(), bytes);
}

#[test]
fn test_redirect_open_failure_skips_inner() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let missing = dir.path().join("missing").join("in.txt");

    let status = run(&format!("touch {} < {}", marker.display(), missing.display()));
    assert_eq!(status, STATUS_FAILURE);
    assert!(!marker.exists());
}

#[test]
fn test_pipe_counts_lines() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("count.txt");

    // Well past the pipe buffer, so writer and reader have to overlap
    let status = run(&format!("seq 1 20000 | wc -l > {}", out.display()));
    assert_eq!(status, 0);
    assert_eq!(read(&out).trim(), "20000");
}

#[test]
fn test_pipe_returns_right_status() {
    assert_eq!(run("true | false"), 1);
    assert_eq!(run("false | true"), 0);
}

#[test]
fn test_pipe_chain() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("first.txt");

    let status = run(&format!(r#"printf "b\na\nc\n" | sort | head -n 1 > {}"#, out.display()));
    assert_eq!(status, 0);
    assert_eq!(read(&out), "a\n");
}

#[test]
fn test_redirect_inside_pipe_branch() {
    let dir = tempfile::tempdir().unwrap();
    let side = dir.path().join("side.txt");

    // The left branch writes to the file, so the reader only sees end-of-stream
    let line = format!("echo hidden > {} | wc -c > /dev/null", side.display());
    assert_eq!(run(&line), 0);
    assert_eq!(read(&side), "hidden\n");
}

#[test]
fn test_and_with_pipe_on_the_right() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");

    let status = run(&format!(r#"true && printf "x\ny\n" | wc -l > {}"#, out.display()));
    assert_eq!(status, 0);
    assert_eq!(read(&out).trim(), "2");
}

#[test]
fn test_environment_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("env.txt");

    let mut env = Environment::from_process();
    env.set("TREESH_GREETING", "hello from the tree");
    let status = run_with(&format!("printenv TREESH_GREETING > {}", out.display()), &env);
    assert_eq!(status, 0);
    assert_eq!(read(&out), "hello from the tree\n");
}

#[test]
fn test_path_comes_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let tool = bin.join("greet");
    fs::write(&tool, "#!/bin/sh\necho custom tool\n").unwrap();
    fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    let out = dir.path().join("out.txt");

    let mut env = Environment::from_process();
    let path = format!("{}:{}", bin.display(), env.get("PATH").unwrap_or("/usr/bin:/bin"));
    env.set("PATH", path);

    assert_eq!(run_with(&format!("greet > {}", out.display()), &env), 0);
    assert_eq!(read(&out), "custom tool\n");
}

#[test]
#[cfg(target_os = "linux")]
fn test_pipe_leaves_no_descriptors_behind() {
    fn open_fds() -> usize {
        fs::read_dir("/proc/self/fd").unwrap().count()
    }

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");

    // Counted in a forked child so other test threads cannot disturb the numbers
    match fork_process().unwrap() {
        ForkResult::Child => {
            let before = open_fds();
            let ok = run(r#"printf "1\n2\n" | wc -l > /dev/null"#) == 0
                && open_fds() == before
                && run("definitely-not-a-real-program-42 | wc -l > /dev/null") == 0
                && open_fds() == before
                && run("definitely-not-a-real-program-42") == EXIT_NOT_FOUND
                && open_fds() == before
                && run(&format!("cat < {}", missing.display())) == STATUS_FAILURE
                && open_fds() == before;
            terminate(if ok { 0 } else { 1 })
        }
        ForkResult::Parent { child } => assert_eq!(wait_for(child), 0),
    }
}

#[test]
fn test_programs_start_with_default_sigpipe() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("pipe.sh");
    let out = dir.path().join("out.txt");
    fs::write(&script, "kill -PIPE $$\necho survived\n").unwrap();

    let status = run(&format!("sh {} > {}", script.display(), out.display()));
    assert_eq!(status, STATUS_FAILURE);
    assert_eq!(read(&out), "");
}

#[test]
fn test_writer_stops_when_reader_exits() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("writer.sh");
    let marker = dir.path().join("finished");
    // Far more output than a pipe buffer holds, so the writer is still going when head exits
    fs::write(
        &script,
        format!(
            "i=0\nwhile [ $i -lt 200000 ]; do echo y; i=$((i+1)); done\ntouch {}\n",
            marker.display()
        ),
    )
    .unwrap();

    let status = run(&format!("sh {} | head -n 1 > /dev/null", script.display()));
    assert_eq!(status, 0);
    assert!(!marker.exists());
}
