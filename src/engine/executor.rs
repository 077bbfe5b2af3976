use crate::engine::ast::{Command, RedirectMode};
use crate::engine::context::{Environment, ExecutionContext};
use crate::engine::process::{
    ExecImage, STATUS_FAILURE, fork_process, install_fd, terminate, wait_for,
};
use crate::engine::resolve::resolve;
use log::{debug, error};
use nix::unistd::ForkResult;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::RawFd;

const STDIN_FILENO: RawFd = 0;
const STDOUT_FILENO: RawFd = 1;

impl Command {
    /// Runs the tree and returns its exit status, or -1 when a process could not be
    /// created or did not exit normally.
    ///
    /// With [`ExecutionContext::AlreadyIsolated`] a redirect takes over the current process
    /// and this call does not return.
    pub fn execute(self, env: &Environment, context: ExecutionContext) -> i32 {
        match self {
            Command::Simple { argv } => run_simple(argv, env),
            Command::And { left, right } => handle_sequence(*left, *right, env, SequenceMode::And),
            Command::Or { left, right } => handle_sequence(*left, *right, env, SequenceMode::Or),
            Command::Sequence { left, right } => {
                handle_sequence(*left, *right, env, SequenceMode::Always)
            }
            Command::Pipe { left, right } => run_pipe(*left, *right, env),
            Command::Redirect { inner, target, mode } => {
                run_redirect(*inner, &target, mode, env, context)
            }
        }
    }
}

// Simple commands always fork: the caller's process is never replaced by exec.
fn run_simple(mut argv: Vec<String>, env: &Environment) -> i32 {
    let Some(program) = argv.first_mut() else {
        error!("Refusing to run an empty command");
        return STATUS_FAILURE;
    };
    *program = resolve(program, env.get("PATH"));

    let image = match ExecImage::new(&argv, env) {
        Ok(image) => image,
        Err(e) => {
            error!("Cannot run {}: {}", argv[0], e);
            return STATUS_FAILURE;
        }
    };

    match fork_process() {
        Ok(ForkResult::Child) => image.exec(),
        Ok(ForkResult::Parent { child }) => {
            debug!("spawned {:?} as {}", argv, child);
            wait_for(child)
        }
        Err(e) => {
            error!("Failed to fork for {}: {}", argv[0], e);
            STATUS_FAILURE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SequenceMode {
    And,
    Or,
    Always,
}

fn handle_sequence(left: Command, right: Command, env: &Environment, mode: SequenceMode) -> i32 {
    let left_res = left.execute(env, ExecutionContext::NeedsNewProcess);

    let proceed = match mode {
        SequenceMode::And => left_res == 0,
        SequenceMode::Or => left_res != 0,
        SequenceMode::Always => true,
    };

    if proceed {
        right.execute(env, ExecutionContext::NeedsNewProcess)
    } else {
        debug!("{:?}: left side returned {}, skipping right side", mode, left_res);
        left_res
    }
}

fn run_pipe(left: Command, right: Command, env: &Environment) -> i32 {
    let (reader, writer) = match os_pipe::pipe() {
        Ok(ends) => ends,
        Err(e) => {
            error!("Failed to create pipe: {}", e);
            return STATUS_FAILURE;
        }
    };

    let left_pid = match fork_process() {
        Ok(ForkResult::Child) => {
            drop(reader);
            if let Err(e) = install_fd(writer, STDOUT_FILENO) {
                eprintln!("treesh: cannot attach pipe to stdout: {}", e.desc());
                terminate(STATUS_FAILURE);
            }
            terminate(left.execute(env, ExecutionContext::AlreadyIsolated))
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(e) => {
            error!("Failed to fork pipe writer: {}", e);
            return STATUS_FAILURE;
        }
    };

    let right_pid = match fork_process() {
        Ok(ForkResult::Child) => {
            drop(writer);
            if let Err(e) = install_fd(reader, STDIN_FILENO) {
                eprintln!("treesh: cannot attach pipe to stdin: {}", e.desc());
                terminate(STATUS_FAILURE);
            }
            terminate(right.execute(env, ExecutionContext::AlreadyIsolated))
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(e) => {
            error!("Failed to fork pipe reader: {}", e);
            // Without a reader the writer gets EPIPE once the pipe is gone; reap it.
            drop(reader);
            drop(writer);
            wait_for(left_pid);
            return STATUS_FAILURE;
        }
    };

    // Both ends must be gone from the shell or the reader never sees end-of-stream.
    drop(reader);
    drop(writer);

    debug!("pipe: writer {} -> reader {}", left_pid, right_pid);
    wait_for(left_pid);
    wait_for(right_pid)
}

fn open_target(target: &str, mode: RedirectMode) -> std::io::Result<File> {
    let mut open_opts = OpenOptions::new();
    match mode {
        RedirectMode::Overwrite => {
            open_opts.write(true).create(true).truncate(true);
        }
        RedirectMode::Append => {
            open_opts.write(true).create(true).append(true);
        }
        RedirectMode::Input => {
            open_opts.read(true);
        }
    };
    open_opts.mode(0o644).open(target)
}

fn run_redirect(
    inner: Command,
    target: &str,
    mode: RedirectMode,
    env: &Environment,
    context: ExecutionContext,
) -> i32 {
    let file = match open_target(target, mode) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open file: {}: {}", target, e);
            return STATUS_FAILURE;
        }
    };
    let fd = match mode {
        RedirectMode::Input => STDIN_FILENO,
        RedirectMode::Overwrite | RedirectMode::Append => STDOUT_FILENO,
    };

    match context {
        ExecutionContext::AlreadyIsolated => run_redirected(file, fd, inner, env),
        ExecutionContext::NeedsNewProcess => match fork_process() {
            Ok(ForkResult::Child) => run_redirected(file, fd, inner, env),
            Ok(ForkResult::Parent { child }) => {
                drop(file);
                debug!("redirect {} {} handled by {}", mode.operator(), target, child);
                wait_for(child)
            }
            Err(e) => {
                error!("Failed to fork for redirect to {}: {}", target, e);
                STATUS_FAILURE
            }
        },
    }
}

// Child role of a redirect: rebind the descriptor, run the inner tree, exit with its status.
fn run_redirected(file: File, fd: RawFd, inner: Command, env: &Environment) -> ! {
    if let Err(e) = install_fd(file, fd) {
        eprintln!("treesh: cannot redirect descriptor {}: {}", fd, e.desc());
        terminate(STATUS_FAILURE);
    }
    terminate(inner.execute(env, ExecutionContext::AlreadyIsolated))
}
